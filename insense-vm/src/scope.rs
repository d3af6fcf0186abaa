//! Nested lexical environments.

use crate::collections::NameMap;
use crate::error::{Fault, OpResult};
use crate::value::Value;

/// A non-empty stack of scope levels, each an ordered map from identifier
/// to value slot. A slot exists from `declare` on and holds `None` until
/// the first `store`.
///
/// A declaration in an inner level hides any same-named binding in an outer
/// level while the inner level lives.
#[derive(Debug, Default)]
pub struct ScopeStack {
    levels: Vec<NameMap<Option<Value>>>,
}

impl ScopeStack {
    /// Creates a scope stack with one base level.
    pub fn new() -> Self {
        Self {
            levels: vec![NameMap::new()],
        }
    }

    /// Pushes a fresh innermost level.
    pub fn enter(&mut self) {
        self.levels.push(NameMap::new());
    }

    /// Pops the innermost level, releasing its bindings.
    pub fn exit(&mut self) -> OpResult<()> {
        if self.levels.len() <= 1 {
            return Err(Fault::Protocol("EXITSCOPE on the base scope".into()));
        }
        self.levels.pop();
        Ok(())
    }

    /// Number of live levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Registers `name` in the innermost level with an undefined value.
    /// Re-declaration in the same level is a no-op.
    pub fn declare(&mut self, name: &str) {
        self.levels
            .last_mut()
            .expect("scope stack is never empty")
            .declare(name);
    }

    /// Assigns into the innermost level containing `name`.
    pub fn store(&mut self, name: &str, value: Value) -> OpResult<()> {
        for level in self.levels.iter_mut().rev() {
            if level.put(name, Some(value.clone())) {
                return Ok(());
            }
        }
        Err(Fault::UndeclaredIdentifier(name.into()))
    }

    /// Reads the binding of `name`, innermost level first.
    pub fn load(&self, name: &str) -> OpResult<Value> {
        match self.find(name) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(Fault::Protocol(format!(
                "identifier `{name}` read before assignment"
            ))),
            None => Err(Fault::UndeclaredIdentifier(name.into())),
        }
    }

    /// Reads the binding of `name` if it is both declared and assigned.
    pub fn try_load(&self, name: &str) -> Option<Value> {
        self.find(name).and_then(|slot| slot.clone())
    }

    /// Reads the binding of `name` from the innermost level only.
    pub fn try_load_local(&self, name: &str) -> Option<Value> {
        self.levels
            .last()
            .and_then(|level| level.get(name))
            .and_then(|slot| slot.clone())
    }

    /// Whether any live level declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.levels.iter().any(|level| level.contains(name))
    }

    /// Pops levels until one containing `name` becomes the innermost.
    pub fn exit_to(&mut self, name: &str) -> OpResult<()> {
        while let Some(level) = self.levels.last() {
            if level.contains(name) {
                return Ok(());
            }
            self.exit()?;
        }
        Err(Fault::UndeclaredIdentifier(name.into()))
    }

    fn find(&self, name: &str) -> Option<&Option<Value>> {
        self.levels.iter().rev().find_map(|level| level.get(name))
    }
}
