//! Lexer tests

use crate::text::lexer::{tokenize, LexError, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .expect("tokenize")
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

#[test]
fn basic_tokens() {
    assert_eq!(
        kinds("(module $m)"),
        vec![
            TokenKind::LParen,
            TokenKind::Keyword("module".to_string()),
            TokenKind::Ident("m".to_string()),
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn numbers_and_strings() {
    assert_eq!(
        kinds(r#"(invoke "add" (i32.const -5))"#),
        vec![
            TokenKind::LParen,
            TokenKind::Keyword("invoke".to_string()),
            TokenKind::Text("add".to_string()),
            TokenKind::LParen,
            TokenKind::Keyword("i32.const".to_string()),
            TokenKind::Number("-5".to_string()),
            TokenKind::RParen,
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn string_escapes() {
    assert_eq!(
        kinds(r#""a\nb\"c""#),
        vec![TokenKind::Text("a\nb\"c".to_string()), TokenKind::Eof]
    );
}

#[test]
fn comments_are_skipped() {
    let source = "
        ;; a line comment
        (module (; inline (; nested ;) comment ;) )
    ";
    assert_eq!(
        kinds(source),
        vec![
            TokenKind::LParen,
            TokenKind::Keyword("module".to_string()),
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn locations_track_lines() {
    let tokens = tokenize("(module\n  $m)").expect("tokenize");
    let ident = tokens
        .iter()
        .find(|token| matches!(token.kind, TokenKind::Ident(_)))
        .expect("ident token");
    assert_eq!(ident.location.line, 2);
    assert_eq!(ident.location.column, 3);
}

#[test]
fn unterminated_string_is_an_error() {
    assert!(matches!(
        tokenize(r#"(module "oops"#),
        Err(LexError::UnterminatedString(_))
    ));
}

#[test]
fn stray_characters_are_errors() {
    assert!(matches!(
        tokenize("(module [)"),
        Err(LexError::UnexpectedChar { ch: '[', .. })
    ));
}
