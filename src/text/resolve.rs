//! Name resolution pass
//!
//! Rewrites symbolic references to indices, in place. Script-level
//! resolution sees module names declared by earlier commands only, so a
//! forward reference is an error, matching declaration order semantics.
//! Module-level resolution covers the type, function, global, table, and
//! memory namespaces plus per-function locals.

use hashbrown::HashMap;
use tracing::debug;

use crate::engine::module::ExternalKind;
use crate::text::ast::{
    CommandKind, FuncDef, ImportDesc, Script, TextInstrKind, TextModule, Var,
};
use crate::util::{Errors, Location};

/// Marker error: diagnostics carry the detail
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("name resolution failed")]
pub struct ResolveFailed;

/// Resolve every module and command of a script, in command order
pub fn resolve_script(
    script: &mut Script,
    errors: &mut Errors,
) -> Result<(), ResolveFailed> {
    let before = errors.len();
    let mut modules_seen: u32 = 0;
    let mut module_names: HashMap<String, u32> = HashMap::new();

    for command in &mut script.commands {
        let location = command.location;
        match &mut command.kind {
            CommandKind::Module(module) => {
                resolve_module_names(module, errors);
                if let Some(name) = &module.name {
                    if module_names
                        .insert(name.clone(), modules_seen)
                        .is_some()
                    {
                        errors.error_at(
                            module.location,
                            format!("redefinition of module ${}", name),
                        );
                    }
                }
                modules_seen += 1;
            }
            CommandKind::Register { module, .. } => match module {
                Some(var) => {
                    resolve_module_ref(var, &module_names, modules_seen, location, errors);
                }
                None if modules_seen == 0 => {
                    errors.error_at(location, "no module declared before register");
                }
                None => {}
            },
            CommandKind::Invoke(action)
            | CommandKind::AssertReturn { action, .. }
            | CommandKind::AssertTrap { action, .. } => match &mut action.module {
                Some(var) => {
                    resolve_module_ref(var, &module_names, modules_seen, action.location, errors);
                }
                None if modules_seen == 0 => {
                    errors.error_at(action.location, "no module declared before action");
                }
                None => {}
            },
        }
    }

    finish(before, errors)
}

/// Resolve a single module outside any script
pub fn resolve_module(
    module: &mut TextModule,
    errors: &mut Errors,
) -> Result<(), ResolveFailed> {
    let before = errors.len();
    resolve_module_names(module, errors);
    finish(before, errors)
}

fn finish(
    before: usize,
    errors: &mut Errors,
) -> Result<(), ResolveFailed> {
    if errors.len() > before {
        debug!("resolution failed with {} diagnostic(s)", errors.len() - before);
        Err(ResolveFailed)
    } else {
        Ok(())
    }
}

/// A script module name must be declared by an earlier command
fn resolve_module_ref(
    var: &mut Var,
    names: &HashMap<String, u32>,
    modules_seen: u32,
    location: Location,
    errors: &mut Errors,
) {
    match var {
        Var::Name(name) => match names.get(name.as_str()) {
            Some(index) => *var = Var::Index(*index),
            None => {
                errors.error_at(location, format!("undefined module ${}", name));
            }
        },
        Var::Index(index) => {
            if *index >= modules_seen {
                errors.error_at(location, format!("module index {} out of range", index));
            }
        }
    }
}

/// One index space: declared names plus its total size
struct Namespace {
    kind: &'static str,
    map: HashMap<String, u32>,
    size: u32,
}

impl Namespace {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            map: HashMap::new(),
            size: 0,
        }
    }

    fn declare(
        &mut self,
        name: Option<&String>,
        location: Location,
        errors: &mut Errors,
    ) {
        if let Some(name) = name {
            if self.map.insert(name.clone(), self.size).is_some() {
                errors.error_at(
                    location,
                    format!("redefinition of {} ${}", self.kind, name),
                );
            }
        }
        self.size += 1;
    }

    fn resolve(
        &self,
        var: &mut Var,
        location: Location,
        errors: &mut Errors,
    ) {
        match var {
            Var::Name(name) => match self.map.get(name.as_str()) {
                Some(index) => *var = Var::Index(*index),
                None => {
                    errors.error_at(location, format!("undefined {} ${}", self.kind, name));
                }
            },
            Var::Index(index) => {
                if *index >= self.size {
                    errors.error_at(
                        location,
                        format!("{} index {} out of range", self.kind, index),
                    );
                }
            }
        }
    }
}

fn resolve_module_names(
    module: &mut TextModule,
    errors: &mut Errors,
) {
    let mut types = Namespace::new("type");
    for def in &module.types {
        types.declare(def.name.as_ref(), def.location, errors);
    }

    // Imported functions occupy the front of the function index space
    let mut funcs = Namespace::new("function");
    for import in &module.imports {
        let ImportDesc::Func { name, .. } = &import.desc;
        funcs.declare(name.as_ref(), import.location, errors);
    }
    for func in &module.funcs {
        funcs.declare(func.name.as_ref(), func.location, errors);
    }

    let mut globals = Namespace::new("global");
    for def in &module.globals {
        globals.declare(def.name.as_ref(), def.location, errors);
    }
    let mut tables = Namespace::new("table");
    for def in &module.tables {
        tables.declare(def.name.as_ref(), def.location, errors);
    }
    let mut memories = Namespace::new("memory");
    for def in &module.memories {
        memories.declare(def.name.as_ref(), def.location, errors);
    }

    for import in &mut module.imports {
        let location = import.location;
        let ImportDesc::Func { type_use, .. } = &mut import.desc;
        if let Some(var) = type_use {
            types.resolve(var, location, errors);
        }
    }

    for func in &mut module.funcs {
        resolve_func(func, &types, &funcs, &globals, errors);
    }

    for export in &mut module.exports {
        let namespace = match export.kind {
            ExternalKind::Func => &funcs,
            ExternalKind::Global => &globals,
            ExternalKind::Table => &tables,
            ExternalKind::Memory => &memories,
        };
        namespace.resolve(&mut export.target, export.location, errors);
    }
}

fn resolve_func(
    func: &mut FuncDef,
    types: &Namespace,
    funcs: &Namespace,
    globals: &Namespace,
    errors: &mut Errors,
) {
    if let Some(var) = &mut func.type_use {
        types.resolve(var, func.location, errors);
    }

    // Params then locals form the local index space
    let mut locals = Namespace::new("local");
    for (name, _) in func.params.iter().chain(&func.locals) {
        locals.declare(name.as_ref(), func.location, errors);
    }

    for instr in &mut func.body {
        let location = instr.location;
        if let TextInstrKind::VarOp { op, var } = &mut instr.kind {
            match op.as_str() {
                "call" => funcs.resolve(var, location, errors),
                "local.get" | "local.set" | "local.tee" => {
                    locals.resolve(var, location, errors);
                }
                "global.get" | "global.set" => globals.resolve(var, location, errors),
                // Branch depths are relative, not part of any namespace
                "br" | "br_if" => {}
                other => {
                    errors.error_at(location, format!("unresolvable operand on '{}'", other));
                }
            }
        }
    }
}
