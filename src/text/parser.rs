//! Script parser
//!
//! Recursive descent over the token stream. Produces `Script` and
//! `TextModule` trees with all symbolic references left unresolved;
//! the resolution pass rewrites them afterwards.
//!
//! Covered grammar: `module` (with `type`, `import`, `func`, `global`,
//! `table`, `memory`, `export` fields), `register`, `invoke`,
//! `assert_return`, and `assert_trap` commands. Function bodies accept
//! plain instruction sequences and folded expressions; folded
//! `block`/`loop`/`if` and named block labels are not part of this subset.

use crate::engine::module::ExternalKind;
use crate::engine::value::{Value, ValueType};
use crate::text::ast::{
    Action, Command, CommandKind, ExportDef, FuncDef, GlobalDef, ImportDef, ImportDesc,
    MemoryDef, Script, TableDef, TextInstr, TextInstrKind, TextModule, TypeDef, Var,
};
use crate::text::lexer::{tokenize, LexError, Token, TokenKind};
use crate::util::Location;

/// Parser error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("{location}: expected {expected}, found {found}")]
    Unexpected {
        location: Location,
        expected: String,
        found: String,
    },

    #[error("{location}: invalid {what} literal: {text}")]
    InvalidLiteral {
        location: Location,
        what: &'static str,
        text: String,
    },

    #[error("{location}: {what} is not supported")]
    Unsupported {
        location: Location,
        what: String,
    },
}

/// Parse a full script
pub fn parse_script(source: &str) -> Result<Script, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let mut commands = Vec::new();
    while !parser.at_eof() {
        commands.push(parser.command()?);
    }
    Ok(Script { commands })
}

/// Parse a single standalone `(module ...)`
pub fn parse_module(source: &str) -> Result<TextModule, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let location = parser.expect_lparen()?;
    parser.expect_keyword("module")?;
    let module = parser.module_body(location)?;
    if !parser.at_eof() {
        let token = parser.peek().clone();
        return Err(parser.unexpected(&token, "end of input"));
    }
    Ok(module)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek2(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn unexpected(
        &self,
        token: &Token,
        expected: impl Into<String>,
    ) -> ParseError {
        ParseError::Unexpected {
            location: token.location,
            expected: expected.into(),
            found: describe(&token.kind),
        }
    }

    fn expect_lparen(&mut self) -> Result<Location, ParseError> {
        let token = self.advance();
        if token.kind == TokenKind::LParen {
            Ok(token.location)
        } else {
            Err(self.unexpected(&token, "'('"))
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        let token = self.advance();
        if token.kind == TokenKind::RParen {
            Ok(())
        } else {
            Err(self.unexpected(&token, "')'"))
        }
    }

    fn expect_keyword(
        &mut self,
        keyword: &str,
    ) -> Result<Location, ParseError> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Keyword(word) if word == keyword => Ok(token.location),
            _ => Err(self.unexpected(&token, format!("'{}'", keyword))),
        }
    }

    fn expect_text(&mut self) -> Result<String, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Text(text) => Ok(text),
            _ => Err(self.unexpected(&token, "string literal")),
        }
    }

    /// `(` followed by the given keyword, without consuming anything
    fn peek_field(
        &self,
        keyword: &str,
    ) -> bool {
        self.peek().kind == TokenKind::LParen
            && matches!(&self.peek2().kind, TokenKind::Keyword(word) if word == keyword)
    }

    fn opt_ident(&mut self) -> Option<String> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        }
    }

    fn opt_var(&mut self) -> Result<Option<Var>, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(Some(Var::Name(name)))
            }
            TokenKind::Number(_) => {
                let index = self.u32_literal()?;
                Ok(Some(Var::Index(index)))
            }
            _ => Ok(None),
        }
    }

    fn var(&mut self) -> Result<Var, ParseError> {
        match self.opt_var()? {
            Some(var) => Ok(var),
            None => {
                let token = self.peek().clone();
                Err(self.unexpected(&token, "index or $name"))
            }
        }
    }

    fn value_type(&mut self) -> Result<ValueType, ParseError> {
        let token = self.advance();
        let ty = match &token.kind {
            TokenKind::Keyword(word) => match word.as_str() {
                "i32" => Some(ValueType::I32),
                "i64" => Some(ValueType::I64),
                "f32" => Some(ValueType::F32),
                "f64" => Some(ValueType::F64),
                _ => None,
            },
            _ => None,
        };
        ty.ok_or_else(|| self.unexpected(&token, "value type"))
    }

    // =====================
    // Commands
    // =====================

    fn command(&mut self) -> Result<Command, ParseError> {
        let location = self.expect_lparen()?;
        let token = self.advance();
        let keyword = match &token.kind {
            TokenKind::Keyword(word) => word.clone(),
            _ => return Err(self.unexpected(&token, "command keyword")),
        };

        let kind = match keyword.as_str() {
            "module" => CommandKind::Module(self.module_body(location)?),
            "register" => {
                let name = self.expect_text()?;
                let module = self.opt_var()?;
                self.expect_rparen()?;
                CommandKind::Register { name, module }
            }
            "invoke" => CommandKind::Invoke(self.action_body(location)?),
            "assert_return" => {
                let action = self.invoke_action()?;
                let mut expected = Vec::new();
                while self.peek().kind == TokenKind::LParen {
                    expected.push(self.const_expr()?);
                }
                self.expect_rparen()?;
                CommandKind::AssertReturn { action, expected }
            }
            "assert_trap" => {
                let action = self.invoke_action()?;
                let message = self.expect_text()?;
                self.expect_rparen()?;
                CommandKind::AssertTrap { action, message }
            }
            other => {
                return Err(ParseError::Unsupported {
                    location,
                    what: format!("command '{}'", other),
                })
            }
        };
        Ok(Command { kind, location })
    }

    /// A parenthesized `(invoke ...)` inside an assertion
    fn invoke_action(&mut self) -> Result<Action, ParseError> {
        let location = self.expect_lparen()?;
        self.expect_keyword("invoke")?;
        self.action_body(location)
    }

    /// The remainder of an invoke: optional module var, field, args, `)`
    fn action_body(
        &mut self,
        location: Location,
    ) -> Result<Action, ParseError> {
        let module = self.opt_var()?;
        let field = self.expect_text()?;
        let mut args = Vec::new();
        while self.peek().kind == TokenKind::LParen {
            args.push(self.const_expr()?);
        }
        self.expect_rparen()?;
        Ok(Action {
            module,
            field,
            args,
            location,
        })
    }

    /// `(t.const literal)`
    fn const_expr(&mut self) -> Result<Value, ParseError> {
        self.expect_lparen()?;
        let token = self.advance();
        let op = match &token.kind {
            TokenKind::Keyword(word) => word.clone(),
            _ => return Err(self.unexpected(&token, "const instruction")),
        };
        let value = self.const_literal(&op, token.location)?;
        self.expect_rparen()?;
        Ok(value)
    }

    fn const_literal(
        &mut self,
        op: &str,
        location: Location,
    ) -> Result<Value, ParseError> {
        match op {
            "i32.const" => Ok(Value::I32(self.i32_literal()?)),
            "i64.const" => Ok(Value::I64(self.i64_literal()?)),
            "f32.const" => Ok(Value::F32(self.f32_literal()?)),
            "f64.const" => Ok(Value::F64(self.f64_literal()?)),
            other => Err(ParseError::Unsupported {
                location,
                what: format!("constant instruction '{}'", other),
            }),
        }
    }

    // =====================
    // Module fields
    // =====================

    fn module_body(
        &mut self,
        location: Location,
    ) -> Result<TextModule, ParseError> {
        let mut module = TextModule {
            name: self.opt_ident(),
            location,
            ..TextModule::default()
        };
        while self.peek().kind == TokenKind::LParen {
            self.module_field(&mut module)?;
        }
        self.expect_rparen()?;
        Ok(module)
    }

    fn module_field(
        &mut self,
        module: &mut TextModule,
    ) -> Result<(), ParseError> {
        let location = self.expect_lparen()?;
        let token = self.advance();
        let keyword = match &token.kind {
            TokenKind::Keyword(word) => word.clone(),
            _ => return Err(self.unexpected(&token, "module field")),
        };

        match keyword.as_str() {
            "type" => {
                let name = self.opt_ident();
                self.expect_lparen()?;
                self.expect_keyword("func")?;
                let (params, results) = self.func_signature()?;
                self.expect_rparen()?;
                self.expect_rparen()?;
                module.types.push(TypeDef {
                    name,
                    params: params.into_iter().map(|(_, ty)| ty).collect(),
                    results,
                    location,
                });
            }
            "import" => {
                let import_module = self.expect_text()?;
                let field = self.expect_text()?;
                let desc_loc = self.expect_lparen()?;
                let desc_token = self.advance();
                match &desc_token.kind {
                    TokenKind::Keyword(word) if word == "func" => {
                        let name = self.opt_ident();
                        let type_use = self.type_use()?;
                        let (params, results) = self.func_signature()?;
                        self.expect_rparen()?;
                        module.imports.push(ImportDef {
                            module: import_module,
                            field,
                            desc: ImportDesc::Func {
                                name,
                                type_use,
                                params: params.into_iter().map(|(_, ty)| ty).collect(),
                                results,
                            },
                            location,
                        });
                    }
                    _ => {
                        return Err(ParseError::Unsupported {
                            location: desc_loc,
                            what: "non-function import".to_string(),
                        })
                    }
                }
                self.expect_rparen()?;
            }
            "func" => module.funcs.push(self.func_body(location)?),
            "global" => {
                let name = self.opt_ident();
                let (ty, mutable) = if self.peek_field("mut") {
                    self.expect_lparen()?;
                    self.expect_keyword("mut")?;
                    let ty = self.value_type()?;
                    self.expect_rparen()?;
                    (ty, true)
                } else {
                    (self.value_type()?, false)
                };
                let init = if self.peek().kind == TokenKind::LParen {
                    Some(self.const_expr()?)
                } else {
                    None
                };
                self.expect_rparen()?;
                module.globals.push(GlobalDef {
                    name,
                    ty,
                    mutable,
                    init,
                    location,
                });
            }
            "table" => {
                let name = self.opt_ident();
                let min = self.u32_literal()?;
                let max = match &self.peek().kind {
                    TokenKind::Number(_) => Some(self.u32_literal()?),
                    _ => None,
                };
                // Element type keyword
                let token = self.advance();
                if !matches!(&token.kind, TokenKind::Keyword(word) if word == "funcref") {
                    return Err(self.unexpected(&token, "'funcref'"));
                }
                self.expect_rparen()?;
                module.tables.push(TableDef {
                    name,
                    min,
                    max,
                    location,
                });
            }
            "memory" => {
                let name = self.opt_ident();
                let min = self.u32_literal()?;
                let max = match &self.peek().kind {
                    TokenKind::Number(_) => Some(self.u32_literal()?),
                    _ => None,
                };
                self.expect_rparen()?;
                module.memories.push(MemoryDef {
                    name,
                    min,
                    max,
                    location,
                });
            }
            "export" => {
                let name = self.expect_text()?;
                self.expect_lparen()?;
                let kind_token = self.advance();
                let kind = match &kind_token.kind {
                    TokenKind::Keyword(word) => match word.as_str() {
                        "func" => ExternalKind::Func,
                        "global" => ExternalKind::Global,
                        "table" => ExternalKind::Table,
                        "memory" => ExternalKind::Memory,
                        _ => return Err(self.unexpected(&kind_token, "export kind")),
                    },
                    _ => return Err(self.unexpected(&kind_token, "export kind")),
                };
                let target = self.var()?;
                self.expect_rparen()?;
                self.expect_rparen()?;
                module.exports.push(ExportDef {
                    name,
                    kind,
                    target,
                    location,
                });
            }
            other => {
                return Err(ParseError::Unsupported {
                    location,
                    what: format!("module field '{}'", other),
                })
            }
        }
        Ok(())
    }

    /// `(type $t)` when present
    fn type_use(&mut self) -> Result<Option<Var>, ParseError> {
        if !self.peek_field("type") {
            return Ok(None);
        }
        self.expect_lparen()?;
        self.expect_keyword("type")?;
        let var = self.var()?;
        self.expect_rparen()?;
        Ok(Some(var))
    }

    /// `(param ...)* (result ...)*`
    fn func_signature(
        &mut self,
    ) -> Result<(Vec<(Option<String>, ValueType)>, Vec<ValueType>), ParseError> {
        let mut params = Vec::new();
        while self.peek_field("param") {
            self.expect_lparen()?;
            self.expect_keyword("param")?;
            if let Some(name) = self.opt_ident() {
                // A named param binds exactly one type
                params.push((Some(name), self.value_type()?));
            } else {
                while self.peek().kind != TokenKind::RParen {
                    params.push((None, self.value_type()?));
                }
            }
            self.expect_rparen()?;
        }
        let mut results = Vec::new();
        while self.peek_field("result") {
            self.expect_lparen()?;
            self.expect_keyword("result")?;
            while self.peek().kind != TokenKind::RParen {
                results.push(self.value_type()?);
            }
            self.expect_rparen()?;
        }
        Ok((params, results))
    }

    fn func_body(
        &mut self,
        location: Location,
    ) -> Result<FuncDef, ParseError> {
        let name = self.opt_ident();
        let mut inline_exports = Vec::new();
        while self.peek_field("export") {
            self.expect_lparen()?;
            self.expect_keyword("export")?;
            inline_exports.push(self.expect_text()?);
            self.expect_rparen()?;
        }
        let type_use = self.type_use()?;
        let (params, results) = self.func_signature()?;
        let mut locals = Vec::new();
        while self.peek_field("local") {
            self.expect_lparen()?;
            self.expect_keyword("local")?;
            if let Some(local_name) = self.opt_ident() {
                locals.push((Some(local_name), self.value_type()?));
            } else {
                while self.peek().kind != TokenKind::RParen {
                    locals.push((None, self.value_type()?));
                }
            }
            self.expect_rparen()?;
        }

        let mut body = Vec::new();
        while self.peek().kind != TokenKind::RParen {
            self.instr(&mut body)?;
        }
        self.expect_rparen()?;

        Ok(FuncDef {
            name,
            location,
            type_use,
            params,
            results,
            locals,
            body,
            inline_exports,
        })
    }

    // =====================
    // Instructions
    // =====================

    /// Parse one instruction (plain or folded) into `out`
    fn instr(
        &mut self,
        out: &mut Vec<TextInstr>,
    ) -> Result<(), ParseError> {
        if self.peek().kind == TokenKind::LParen {
            return self.folded_instr(out);
        }
        let token = self.advance();
        let op = match &token.kind {
            TokenKind::Keyword(word) => word.clone(),
            _ => return Err(self.unexpected(&token, "instruction")),
        };
        let instr = self.plain_instr(op, token.location)?;
        out.push(instr);
        Ok(())
    }

    /// `(op immediates operand-exprs...)`; operands are emitted first
    fn folded_instr(
        &mut self,
        out: &mut Vec<TextInstr>,
    ) -> Result<(), ParseError> {
        self.expect_lparen()?;
        let token = self.advance();
        let op = match &token.kind {
            TokenKind::Keyword(word) => word.clone(),
            _ => return Err(self.unexpected(&token, "instruction")),
        };
        if matches!(op.as_str(), "block" | "loop" | "if") {
            return Err(ParseError::Unsupported {
                location: token.location,
                what: format!("folded '{}'", op),
            });
        }
        let instr = self.plain_instr(op, token.location)?;
        while self.peek().kind == TokenKind::LParen {
            self.folded_instr(out)?;
        }
        self.expect_rparen()?;
        out.push(instr);
        Ok(())
    }

    fn plain_instr(
        &mut self,
        op: String,
        location: Location,
    ) -> Result<TextInstr, ParseError> {
        let kind = match op.as_str() {
            "i32.const" | "i64.const" | "f32.const" | "f64.const" => TextInstrKind::Const {
                value: self.const_literal(&op, location)?,
            },
            "call" | "local.get" | "local.set" | "local.tee" | "global.get" | "global.set" => {
                TextInstrKind::VarOp {
                    op,
                    var: self.var()?,
                }
            }
            "br" | "br_if" => {
                // Labels resolve by relative depth only in this subset
                if matches!(self.peek().kind, TokenKind::Ident(_)) {
                    return Err(ParseError::Unsupported {
                        location,
                        what: "named block label".to_string(),
                    });
                }
                TextInstrKind::VarOp {
                    op,
                    var: Var::Index(self.u32_literal()?),
                }
            }
            "block" | "loop" | "if" => {
                if matches!(self.peek().kind, TokenKind::Ident(_)) {
                    return Err(ParseError::Unsupported {
                        location,
                        what: "named block label".to_string(),
                    });
                }
                let result = if self.peek_field("result") {
                    self.expect_lparen()?;
                    self.expect_keyword("result")?;
                    let ty = self.value_type()?;
                    self.expect_rparen()?;
                    Some(ty)
                } else {
                    None
                };
                TextInstrKind::BlockStart { op, result }
            }
            _ => TextInstrKind::Plain { op },
        };
        Ok(TextInstr { kind, location })
    }

    // =====================
    // Literals
    // =====================

    fn number_text(
        &mut self,
        what: &'static str,
    ) -> Result<(String, Location), ParseError> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Number(text) => Ok((text.clone(), token.location)),
            // `nan`/`inf` lex as keywords but are float literals
            TokenKind::Keyword(word) if word.starts_with("nan") || word == "inf" => {
                Ok((word.clone(), token.location))
            }
            _ => Err(self.unexpected(&token, what)),
        }
    }

    fn u32_literal(&mut self) -> Result<u32, ParseError> {
        let (text, location) = self.number_text("index")?;
        parse_int(&text)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(ParseError::InvalidLiteral {
                location,
                what: "index",
                text,
            })
    }

    fn i32_literal(&mut self) -> Result<u32, ParseError> {
        let (text, location) = self.number_text("i32 literal")?;
        parse_int(&text)
            .filter(|v| *v >= i32::MIN as i128 && *v <= u32::MAX as i128)
            .map(|v| v as u32)
            .ok_or(ParseError::InvalidLiteral {
                location,
                what: "i32",
                text,
            })
    }

    fn i64_literal(&mut self) -> Result<u64, ParseError> {
        let (text, location) = self.number_text("i64 literal")?;
        parse_int(&text)
            .filter(|v| *v >= i64::MIN as i128 && *v <= u64::MAX as i128)
            .map(|v| v as u64)
            .ok_or(ParseError::InvalidLiteral {
                location,
                what: "i64",
                text,
            })
    }

    fn f32_literal(&mut self) -> Result<u32, ParseError> {
        let (text, location) = self.number_text("f32 literal")?;
        parse_float32(&text).ok_or(ParseError::InvalidLiteral {
            location,
            what: "f32",
            text,
        })
    }

    fn f64_literal(&mut self) -> Result<u64, ParseError> {
        let (text, location) = self.number_text("f64 literal")?;
        parse_float64(&text).ok_or(ParseError::InvalidLiteral {
            location,
            what: "f64",
            text,
        })
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Keyword(word) => format!("'{}'", word),
        TokenKind::Ident(name) => format!("'${}'", name),
        TokenKind::Text(text) => format!("{:?}", text),
        TokenKind::Number(text) => format!("'{}'", text),
        TokenKind::Eof => "end of input".to_string(),
    }
}

/// Decimal or `0x` hexadecimal integer with optional sign and `_` separators
fn parse_int(text: &str) -> Option<i128> {
    let text: String = text.chars().filter(|c| *c != '_').collect();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(&text)),
    };
    let magnitude = match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => rest.parse::<i128>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    }
}

fn parse_float32(text: &str) -> Option<u32> {
    let text: String = text.chars().filter(|c| *c != '_').collect();
    let (negative, rest) = split_sign(&text);
    let bits = if rest == "inf" {
        f32::INFINITY.to_bits()
    } else if rest == "nan" {
        f32::NAN.to_bits()
    } else if let Some(payload) = rest.strip_prefix("nan:0x") {
        let payload = u32::from_str_radix(payload, 16).ok()?;
        if payload == 0 || payload >= 1 << 23 {
            return None;
        }
        0x7F80_0000 | payload
    } else if rest.starts_with("0x") {
        // Hexadecimal float syntax is not covered by this frontend
        return None;
    } else {
        rest.parse::<f32>().ok()?.to_bits()
    };
    Some(if negative { bits | 0x8000_0000 } else { bits })
}

fn parse_float64(text: &str) -> Option<u64> {
    let text: String = text.chars().filter(|c| *c != '_').collect();
    let (negative, rest) = split_sign(&text);
    let bits = if rest == "inf" {
        f64::INFINITY.to_bits()
    } else if rest == "nan" {
        f64::NAN.to_bits()
    } else if let Some(payload) = rest.strip_prefix("nan:0x") {
        let payload = u64::from_str_radix(payload, 16).ok()?;
        if payload == 0 || payload >= 1 << 52 {
            return None;
        }
        0x7FF0_0000_0000_0000 | payload
    } else if rest.starts_with("0x") {
        return None;
    } else {
        rest.parse::<f64>().ok()?.to_bits()
    };
    Some(if negative {
        bits | 0x8000_0000_0000_0000
    } else {
        bits
    })
}
