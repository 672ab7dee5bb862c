//! Script and module syntax trees
//!
//! Symbolic references (`$name`) are carried as `Var::Name` until the
//! resolution pass rewrites them to `Var::Index` in place.

use crate::engine::module::ExternalKind;
use crate::engine::value::{Value, ValueType};
use crate::util::Location;

/// A reference that is symbolic until resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Var {
    Index(u32),
    Name(String),
}

/// A parsed script: an ordered list of commands
#[derive(Debug, Default)]
pub struct Script {
    pub commands: Vec<Command>,
}

#[derive(Debug)]
pub struct Command {
    pub kind: CommandKind,
    pub location: Location,
}

#[derive(Debug)]
pub enum CommandKind {
    Module(TextModule),
    /// Make a module available to import linking under `name`;
    /// targets the most recent module when `module` is absent
    Register {
        name: String,
        module: Option<Var>,
    },
    Invoke(Action),
    AssertReturn {
        action: Action,
        expected: Vec<Value>,
    },
    AssertTrap {
        action: Action,
        message: String,
    },
}

/// An export invocation inside a script command
#[derive(Debug)]
pub struct Action {
    /// Target module; the most recent one when absent
    pub module: Option<Var>,
    pub field: String,
    pub args: Vec<Value>,
    pub location: Location,
}

/// A module in text form
#[derive(Debug, Default)]
pub struct TextModule {
    pub name: Option<String>,
    pub location: Location,
    pub types: Vec<TypeDef>,
    pub imports: Vec<ImportDef>,
    pub funcs: Vec<FuncDef>,
    pub globals: Vec<GlobalDef>,
    pub tables: Vec<TableDef>,
    pub memories: Vec<MemoryDef>,
    pub exports: Vec<ExportDef>,
}

#[derive(Debug)]
pub struct TypeDef {
    pub name: Option<String>,
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
    pub location: Location,
}

#[derive(Debug)]
pub struct ImportDef {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
    pub location: Location,
}

#[derive(Debug)]
pub enum ImportDesc {
    Func {
        name: Option<String>,
        type_use: Option<Var>,
        params: Vec<ValueType>,
        results: Vec<ValueType>,
    },
}

#[derive(Debug)]
pub struct FuncDef {
    pub name: Option<String>,
    pub location: Location,
    /// `(type $t)` reference, resolved against the type namespace
    pub type_use: Option<Var>,
    pub params: Vec<(Option<String>, ValueType)>,
    pub results: Vec<ValueType>,
    pub locals: Vec<(Option<String>, ValueType)>,
    pub body: Vec<TextInstr>,
    /// Inline `(export "name")` fields
    pub inline_exports: Vec<String>,
}

#[derive(Debug)]
pub struct GlobalDef {
    pub name: Option<String>,
    pub ty: ValueType,
    pub mutable: bool,
    pub init: Option<Value>,
    pub location: Location,
}

#[derive(Debug)]
pub struct TableDef {
    pub name: Option<String>,
    pub min: u32,
    pub max: Option<u32>,
    pub location: Location,
}

#[derive(Debug)]
pub struct MemoryDef {
    pub name: Option<String>,
    pub min: u32,
    pub max: Option<u32>,
    pub location: Location,
}

#[derive(Debug)]
pub struct ExportDef {
    pub name: String,
    pub kind: ExternalKind,
    pub target: Var,
    pub location: Location,
}

#[derive(Debug)]
pub struct TextInstr {
    pub kind: TextInstrKind,
    pub location: Location,
}

#[derive(Debug)]
pub enum TextInstrKind {
    /// Instruction with no immediate, e.g. `i32.add`, `drop`, `else`, `end`
    Plain { op: String },
    /// `block`/`loop`/`if` with an optional result annotation
    BlockStart {
        op: String,
        result: Option<ValueType>,
    },
    /// `t.const` with its literal
    Const { value: Value },
    /// Instruction with one index-or-name immediate:
    /// `call`, `local.*`, `global.*`, `br`, `br_if`
    VarOp { op: String, var: Var },
}
