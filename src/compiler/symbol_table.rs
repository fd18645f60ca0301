use std::collections::HashMap;

use crate::object::builtins::BUILTINS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// Name → slot mapping shared by every statement compiled in one session.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    num_globals: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// A table with every builtin pre-registered at its registry index.
    pub fn with_builtins() -> Self {
        let mut table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        table
    }

    /// Bind `name` as a global. Rebinding an existing global keeps its slot;
    /// binding a builtin's name shadows the builtin with a fresh slot.
    pub fn define(&mut self, name: &str) -> Symbol {
        if let Some(existing) = self.store.get(name)
            && existing.scope == SymbolScope::Global
        {
            return existing.clone();
        }
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Global,
            index: self.num_globals,
        };
        self.num_globals += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.store.get(name)
    }

    pub fn num_globals(&self) -> usize {
        self.num_globals
    }
}
