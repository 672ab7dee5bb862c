//! Execution environment
//!
//! The namespace every module is loaded into and every executor resolves
//! against. Owns its modules outright; destroying the environment releases
//! them all. Distinct environments share nothing.

use indexmap::IndexMap;
use tracing::debug;

use crate::engine::module::{DefinedModule, ModuleId};

/// Container for loaded modules and the name registry used by import linking
#[derive(Debug, Default)]
pub struct Environment {
    // Boxed so module addresses stay stable while the vector grows;
    // boundary handles point straight at the boxed modules
    modules: Vec<Box<DefinedModule>>,
    registry: IndexMap<String, ModuleId>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment::default()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module(
        &self,
        id: ModuleId,
    ) -> Option<&DefinedModule> {
        self.modules.get(id.0 as usize).map(|module| &**module)
    }

    /// Add a freshly decoded module; the environment takes ownership
    pub fn add_module(
        &mut self,
        mut module: DefinedModule,
    ) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        module.id = id;
        self.modules.push(Box::new(module));
        id
    }

    /// Stable address of a loaded module, for handing across the boundary
    pub fn module_ptr(
        &mut self,
        id: ModuleId,
    ) -> Option<*mut DefinedModule> {
        self.modules
            .get_mut(id.0 as usize)
            .map(|module| &mut **module as *mut DefinedModule)
    }

    /// Register a module under a name for import linking
    ///
    /// Later registrations shadow earlier ones, matching script `register`
    /// semantics.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        id: ModuleId,
    ) {
        let name = name.into();
        debug!("registering module {:?} as {:?}", id, name);
        self.registry.insert(name, id);
    }

    /// Look up a registered module by name
    pub fn registered(
        &self,
        name: &str,
    ) -> Option<ModuleId> {
        self.registry.get(name).copied()
    }
}
