use crate::ast::Type;
use std::collections::HashMap;

/// Index of a symbol in the [`crate::ast::Ast`] symbol arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn new(index: usize) -> Self {
        SymbolId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A declared name. An offset of 0 marks a global; locals and parameters
/// get a nonzero `offset(%rbp)` slot during allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub offset: i32,
}

impl Symbol {
    pub fn new(name: String, ty: Type) -> Self {
        Symbol {
            name,
            ty,
            offset: 0,
        }
    }

    pub fn is_global(&self) -> bool {
        self.offset == 0
    }
}

/// Lexical scope stack mapping names to arena symbols.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, SymbolId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Declare `name` in the innermost scope. Returns false if the name is
    /// already declared there.
    pub fn declare(&mut self, name: &str, id: SymbolId) -> bool {
        let scope = self.scopes.last_mut().unwrap();
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), id);
        true
    }

    /// Look `name` up from the innermost scope outward.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.get(name) {
                return Some(id);
            }
        }
        None
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
