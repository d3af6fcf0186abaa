//! Procedure records and the three resolution tables.
//!
//! `PROCCALL` resolves a name against the calling component's own table,
//! then the entry component's global table, then the native table. The
//! order is load-bearing: programs shadow built-ins with local procedures
//! of the same name.

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use crate::collections::NameMap;
use crate::stack::OperandStack;
use crate::value::Value;

/// A bytecode procedure: parameter names in declaration order and the
/// stream offset immediately after its header.
#[derive(Debug, Clone)]
pub struct Procedure {
    /// Declared name.
    pub name: String,
    /// Parameter names in declaration order.
    pub params: Vec<String>,
    /// Entry offset into the owning program image.
    pub entry: u64,
}

/// Per-component table of bytecode procedures.
#[derive(Debug, Default)]
pub struct ProcedureTable {
    procs: NameMap<Procedure>,
}

impl ProcedureTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a procedure; a re-read declaration overwrites in place.
    pub fn register(&mut self, proc: Procedure) {
        self.procs.insert(proc.name.clone(), proc);
    }

    /// Looks up a procedure by name.
    pub fn get(&self, name: &str) -> Option<&Procedure> {
        self.procs.get(name)
    }
}

/// The entry component's procedure table, shared with every child, plus
/// the entry program image global procedures execute from.
///
/// Writes happen only on the entry component's thread as it reads `PROC`
/// declarations; children take read locks during resolution.
#[derive(Debug, Default)]
pub struct GlobalProcedures {
    table: RwLock<NameMap<Procedure>>,
    image: OnceLock<Arc<[u8]>>,
}

impl GlobalProcedures {
    /// Creates an empty global table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the entry program image. Later calls are no-ops.
    pub fn set_image(&self, image: Arc<[u8]>) {
        let _ = self.image.set(image);
    }

    /// The entry program image, once published.
    pub fn image(&self) -> Option<Arc<[u8]>> {
        self.image.get().cloned()
    }

    /// Registers a procedure of the entry component.
    pub fn register(&self, proc: Procedure) {
        self.table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(proc.name.clone(), proc);
    }

    /// Looks up a procedure by name.
    pub fn get(&self, name: &str) -> Option<Procedure> {
        self.table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }
}

/// Body of a native procedure. Arguments arrive in declaration order; a
/// returning native pushes its result onto the caller's operand stack.
pub type NativeCallable = Arc<dyn Fn(&[Value], &mut OperandStack) + Send + Sync>;

/// A named native callable with its parameter list.
#[derive(Clone)]
pub struct NativeProcedure {
    /// Resolvable name.
    pub name: String,
    /// Parameter names in declaration order; the arity popped at call time.
    pub params: Vec<String>,
    /// The callable itself.
    pub callable: NativeCallable,
}

impl fmt::Debug for NativeProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProcedure")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Table of native procedures, populated once at VM start.
#[derive(Debug, Default)]
pub struct NativeTable {
    procs: NameMap<NativeProcedure>,
}

impl NativeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a native procedure.
    pub fn register<F>(&mut self, name: &str, params: &[&str], callable: F)
    where
        F: Fn(&[Value], &mut OperandStack) + Send + Sync + 'static,
    {
        self.procs.insert(
            name.to_string(),
            NativeProcedure {
                name: name.to_string(),
                params: params.iter().map(|p| p.to_string()).collect(),
                callable: Arc::new(callable),
            },
        );
    }

    /// Looks up a native procedure by name.
    pub fn get(&self, name: &str) -> Option<&NativeProcedure> {
        self.procs.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_registration_and_lookup() {
        let mut table = ProcedureTable::new();
        table.register(Procedure {
            name: "double".into(),
            params: vec!["x".into()],
            entry: 17,
        });
        let p = table.get("double").unwrap();
        assert_eq!(p.entry, 17);
        assert_eq!(p.params, vec!["x".to_string()]);
        assert!(table.get("missing").is_none());
    }

    #[test]
    fn global_table_is_shared() {
        let globals = Arc::new(GlobalProcedures::new());
        globals.register(Procedure {
            name: "helper".into(),
            params: vec![],
            entry: 3,
        });
        let clone = Arc::clone(&globals);
        assert_eq!(clone.get("helper").unwrap().entry, 3);
    }

    #[test]
    fn native_invocation_can_push_a_result() {
        let mut natives = NativeTable::new();
        natives.register("fortyTwo", &[], |_args, stack| {
            stack.push(Value::Integer(42));
        });
        let mut stack = OperandStack::new();
        let proc = natives.get("fortyTwo").unwrap();
        (proc.callable)(&[], &mut stack);
        assert_eq!(stack.pop().unwrap(), Value::Integer(42));
    }
}
