//! Function directory and variable tables.
//!
//! The active scope is never stored here. `declare_function` hands back a
//! [`Scope`] value and every scoped operation takes one, so which table a name
//! lands in is decided by the caller's value rather than by hidden state.

use crate::error::SemanticError;
use crate::memory::VirtualMemory;
use patito_syntax::ast::Type;
use patito_syntax::segment::{Address, ScopeClass};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Function(String),
}

impl Scope {
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Function(name) => Some(name),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global scope"),
            Scope::Function(name) => write!(f, "function '{}'", name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarInfo {
    pub name: String,
    pub ty: Type,
    pub address: Address,
}

#[derive(Clone, Debug)]
pub struct FunctionEntry {
    pub name: String,
    /// `None` for void functions.
    pub return_ty: Option<Type>,
    pub params: Vec<VarInfo>,
    /// Parameters and declared locals.
    pub locals: HashMap<String, VarInfo>,
    /// Index of the first quadruple of the body.
    pub entry_index: Option<usize>,
    /// Global address the callee copies its result into; `None` iff void.
    pub return_slot: Option<Address>,
    pub has_returned: bool,
}

#[derive(Debug, Default)]
pub struct FunctionDirectory {
    functions: HashMap<String, FunctionEntry>,
    globals: HashMap<String, VarInfo>,
}

impl FunctionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a function and returns the scope to declare its parameters and
    /// locals in. A non-void function gets its return slot right away.
    pub fn declare_function(
        &mut self,
        memory: &mut VirtualMemory,
        name: &str,
        return_ty: Option<Type>,
    ) -> Result<Scope, SemanticError> {
        if self.functions.contains_key(name) || self.globals.contains_key(name) {
            return Err(SemanticError::DuplicateFunction {
                name: name.to_string(),
            });
        }
        let return_slot = match return_ty {
            Some(ty) => Some(memory.allocate(ScopeClass::Global, ty)?),
            None => None,
        };
        self.functions.insert(
            name.to_string(),
            FunctionEntry {
                name: name.to_string(),
                return_ty,
                params: Vec::new(),
                locals: HashMap::new(),
                entry_index: None,
                return_slot,
                has_returned: false,
            },
        );
        Ok(Scope::Function(name.to_string()))
    }

    pub fn declare_param(
        &mut self,
        memory: &mut VirtualMemory,
        scope: &Scope,
        name: &str,
        ty: Type,
    ) -> Result<VarInfo, SemanticError> {
        let func = self.scope_function_mut(scope)?;
        if func.params.iter().any(|p| p.name == name) {
            return Err(SemanticError::DuplicateParameter {
                name: name.to_string(),
                function: func.name.clone(),
            });
        }
        let info = VarInfo {
            name: name.to_string(),
            ty,
            address: memory.allocate(ScopeClass::Local, ty)?,
        };
        func.params.push(info.clone());
        func.locals.insert(name.to_string(), info.clone());
        Ok(info)
    }

    /// Declares a variable in `scope`: a global in [`Scope::Global`], a local otherwise.
    pub fn declare_variable(
        &mut self,
        memory: &mut VirtualMemory,
        scope: &Scope,
        name: &str,
        ty: Type,
    ) -> Result<VarInfo, SemanticError> {
        let duplicate = || SemanticError::DuplicateVariable {
            name: name.to_string(),
            scope: scope.to_string(),
        };
        match scope {
            Scope::Global => {
                if self.globals.contains_key(name) {
                    return Err(duplicate());
                }
                let info = VarInfo {
                    name: name.to_string(),
                    ty,
                    address: memory.allocate(ScopeClass::Global, ty)?,
                };
                self.globals.insert(name.to_string(), info.clone());
                Ok(info)
            }
            Scope::Function(_) => {
                let func = self.scope_function_mut(scope)?;
                // The function's own name is reserved for the return-by-assignment form.
                if func.locals.contains_key(name) || func.name == name {
                    return Err(duplicate());
                }
                let info = VarInfo {
                    name: name.to_string(),
                    ty,
                    address: memory.allocate(ScopeClass::Local, ty)?,
                };
                func.locals.insert(name.to_string(), info.clone());
                Ok(info)
            }
        }
    }

    /// Resolves a variable: the scope's locals first, then globals.
    pub fn lookup(&self, scope: &Scope, name: &str) -> Result<&VarInfo, SemanticError> {
        let local = match scope {
            Scope::Global => None,
            Scope::Function(f) => self.functions.get(f).and_then(|e| e.locals.get(name)),
        };
        local
            .or_else(|| self.globals.get(name))
            .ok_or_else(|| SemanticError::UndeclaredVariable {
                name: name.to_string(),
            })
    }

    pub fn lookup_function(&self, name: &str) -> Result<&FunctionEntry, SemanticError> {
        self.functions
            .get(name)
            .ok_or_else(|| SemanticError::UndeclaredFunction {
                name: name.to_string(),
            })
    }

    pub fn set_entry_index(&mut self, scope: &Scope, index: usize) -> Result<(), SemanticError> {
        self.scope_function_mut(scope)?.entry_index = Some(index);
        Ok(())
    }

    pub fn mark_returned(&mut self, scope: &Scope) -> Result<(), SemanticError> {
        self.scope_function_mut(scope)?.has_returned = true;
        Ok(())
    }

    /// Closes a function scope; the entry is read-only metadata from here on.
    pub fn close_function(&self, scope: Scope) -> Result<&FunctionEntry, SemanticError> {
        match scope {
            Scope::Global => Err(SemanticError::ReturnOutsideFunction),
            Scope::Function(name) => self.lookup_function(&name),
        }
    }

    pub fn globals(&self) -> impl Iterator<Item = &VarInfo> {
        self.globals.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.functions.values()
    }

    fn scope_function_mut(&mut self, scope: &Scope) -> Result<&mut FunctionEntry, SemanticError> {
        let name = scope
            .function_name()
            .ok_or(SemanticError::ReturnOutsideFunction)?;
        self.functions
            .get_mut(name)
            .ok_or_else(|| SemanticError::UndeclaredFunction {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patito_syntax::segment::MemoryLayout;

    fn setup() -> (FunctionDirectory, VirtualMemory) {
        (
            FunctionDirectory::new(),
            VirtualMemory::new(MemoryLayout::default()),
        )
    }

    #[test]
    fn non_void_function_reserves_global_return_slot() {
        let (mut dir, mut mem) = setup();
        dir.declare_function(&mut mem, "f", Some(Type::Float)).unwrap();
        dir.declare_function(&mut mem, "g", None).unwrap();
        assert_eq!(dir.lookup_function("f").unwrap().return_slot, Some(2000));
        assert_eq!(dir.lookup_function("g").unwrap().return_slot, None);
    }

    #[test]
    fn function_name_clashes_with_function_or_global() {
        let (mut dir, mut mem) = setup();
        dir.declare_variable(&mut mem, &Scope::Global, "x", Type::Int)
            .unwrap();
        dir.declare_function(&mut mem, "f", None).unwrap();
        assert!(matches!(
            dir.declare_function(&mut mem, "f", None),
            Err(SemanticError::DuplicateFunction { .. })
        ));
        assert!(matches!(
            dir.declare_function(&mut mem, "x", Some(Type::Int)),
            Err(SemanticError::DuplicateFunction { .. })
        ));
    }

    #[test]
    fn lookup_prefers_locals_then_globals() {
        let (mut dir, mut mem) = setup();
        let global = Scope::Global;
        dir.declare_variable(&mut mem, &global, "x", Type::Int).unwrap();
        dir.declare_variable(&mut mem, &global, "y", Type::Bool).unwrap();
        let f = dir.declare_function(&mut mem, "f", None).unwrap();
        dir.declare_param(&mut mem, &f, "x", Type::Float).unwrap();

        assert_eq!(dir.lookup(&f, "x").unwrap().ty, Type::Float);
        assert_eq!(dir.lookup(&f, "x").unwrap().address, 5000);
        assert_eq!(dir.lookup(&f, "y").unwrap().address, 3000);
        assert_eq!(dir.lookup(&global, "x").unwrap().ty, Type::Int);
        assert!(matches!(
            dir.lookup(&global, "z"),
            Err(SemanticError::UndeclaredVariable { .. })
        ));
    }

    #[test]
    fn locals_are_invisible_from_global_scope() {
        let (mut dir, mut mem) = setup();
        let f = dir.declare_function(&mut mem, "f", None).unwrap();
        dir.declare_variable(&mut mem, &f, "tmp", Type::Int).unwrap();
        assert!(dir.lookup(&Scope::Global, "tmp").is_err());
    }

    #[test]
    fn duplicate_params_and_locals() {
        let (mut dir, mut mem) = setup();
        let f = dir.declare_function(&mut mem, "f", Some(Type::Int)).unwrap();
        dir.declare_param(&mut mem, &f, "a", Type::Int).unwrap();
        assert!(matches!(
            dir.declare_param(&mut mem, &f, "a", Type::Int),
            Err(SemanticError::DuplicateParameter { .. })
        ));
        assert!(matches!(
            dir.declare_variable(&mut mem, &f, "a", Type::Int),
            Err(SemanticError::DuplicateVariable { .. })
        ));
        assert!(matches!(
            dir.declare_variable(&mut mem, &f, "f", Type::Int),
            Err(SemanticError::DuplicateVariable { .. })
        ));
    }

    #[test]
    fn entry_index_and_return_flag() {
        let (mut dir, mut mem) = setup();
        let f = dir.declare_function(&mut mem, "f", Some(Type::Int)).unwrap();
        dir.set_entry_index(&f, 7).unwrap();
        dir.mark_returned(&f).unwrap();
        let entry = dir.close_function(f).unwrap();
        assert_eq!(entry.entry_index, Some(7));
        assert!(entry.has_returned);
    }
}
