//! Loaded module representation
//!
//! A `DefinedModule` is produced by the binary reader and owned by the
//! `Environment` that loaded it. It is immutable after load except for the
//! import links fixed up during loading.

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::engine::instr::Instr;
use crate::engine::value::ValueType;

/// Index of a module inside its owning environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u32);

/// A function signature
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FuncType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

/// What an export refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalKind {
    Func,
    Table,
    Memory,
    Global,
}

impl ExternalKind {
    pub fn from_byte(byte: u8) -> Option<ExternalKind> {
        match byte {
            0x00 => Some(ExternalKind::Func),
            0x01 => Some(ExternalKind::Table),
            0x02 => Some(ExternalKind::Memory),
            0x03 => Some(ExternalKind::Global),
            _ => None,
        }
    }
}

/// A single export table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub kind: ExternalKind,
    pub index: u32,
}

/// A function referenced across module boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncRef {
    pub module: ModuleId,
    pub index: u32,
}

/// A function in a module's index space
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// Linked to another module's function at load time
    Imported { type_idx: u32, target: FuncRef },
    /// Defined in this module's code section
    Defined {
        type_idx: u32,
        locals: Vec<ValueType>,
        code: Vec<Instr>,
    },
}

impl Function {
    pub fn type_idx(&self) -> u32 {
        match self {
            Function::Imported { type_idx, .. } => *type_idx,
            Function::Defined { type_idx, .. } => *type_idx,
        }
    }
}

/// A decoded, linked module
#[derive(Debug, Default)]
pub struct DefinedModule {
    /// Position in the owning environment, assigned at load time
    pub id: ModuleId,
    pub types: Vec<FuncType>,
    pub functions: Vec<Function>,
    /// Export table, insertion-ordered; lookup is byte-exact on the name
    pub exports: IndexMap<String, Export>,
    /// Function names from the `name` custom section, when retained
    pub func_names: HashMap<u32, String>,
}

impl DefinedModule {
    /// The signature of a function in this module's index space
    pub fn func_type(
        &self,
        func_idx: u32,
    ) -> Option<&FuncType> {
        let func = self.functions.get(func_idx as usize)?;
        self.types.get(func.type_idx() as usize)
    }

    /// Debug name for a function, falling back to its index
    pub fn func_display_name(
        &self,
        func_idx: u32,
    ) -> String {
        match self.func_names.get(&func_idx) {
            Some(name) => format!("${}", name),
            None => format!("func[{}]", func_idx),
        }
    }
}
