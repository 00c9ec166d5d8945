//! Module-loading interface: the symbol set a loaded module contributes to
//! a [`crate::program::ProgramContext`], and the registry embedders query
//! before loading a module a program declares it needs via `%requires`.
//!
//! This runtime does not implement dynamic library loading itself (that is
//! squarely an embedder/host concern — reading a `.so`/`.dylib`, finding
//! its entry point, handling platform differences); it owns the symbol-set
//! contract a loaded module must satisfy and the version-requirement check
//! against [`crate::featurever`].

use crate::eval::FunctionDef;
use crate::featurever::{FeatureRequirement, Version};
use rune_core::sink::ErrorRecord;
use std::collections::HashMap;
use std::sync::Arc;

/// The symbols one loaded module contributes: named functions and the
/// module's own declared version.
pub struct ModuleSymbols {
    pub name: String,
    pub version: Version,
    pub functions: HashMap<String, Arc<FunctionDef>>,
}

impl ModuleSymbols {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            functions: HashMap::new(),
        }
    }

    pub fn add_function(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.clone(), Arc::new(def));
    }
}

/// A process-wide table of modules an embedder has already loaded and
/// handed to this runtime, keyed by module name. Loading the underlying
/// shared library is the embedder's job; this registry just lets
/// `%requires`-style checks resolve against what is already present.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleSymbols>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, symbols: ModuleSymbols) {
        self.modules.insert(symbols.name.clone(), symbols);
    }

    pub fn get(&self, name: &str) -> Option<&ModuleSymbols> {
        self.modules.get(name)
    }

    /// Check a `%requires`-style requirement string against the currently
    /// registered modules. Raises `LOAD-MODULE-ERROR` if the named module
    /// isn't registered at all, or if it is but its version doesn't satisfy
    /// the requirement.
    pub fn check_requirement(&self, requirement: &str) -> Result<(), ErrorRecord> {
        let req = FeatureRequirement::parse(requirement).ok_or_else(|| {
            ErrorRecord::new("LOAD-MODULE-ERROR", format!("malformed module requirement '{}'", requirement))
        })?;
        match self.modules.get(&req.name) {
            None => Err(ErrorRecord::new(
                "LOAD-MODULE-ERROR",
                format!("module '{}' is not loaded", req.name),
            )),
            Some(module) if !req.is_satisfied_by(&module.version) => Err(ErrorRecord::new(
                "LOAD-MODULE-ERROR",
                format!(
                    "module '{}' version {} does not satisfy requirement '{}'",
                    req.name, module.version, requirement
                ),
            )),
            Some(_) => Ok(()),
        }
    }
}
