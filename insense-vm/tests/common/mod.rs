//! Shared scaffolding: run an in-memory program and capture its output.

use std::sync::Arc;

use insense_vm::builtins;
use insense_vm::loader::MemorySource;
use insense_vm::vm::Vm;

/// Runs the `Main` component of `source` with a capturing native table and
/// returns everything the program printed.
pub fn run_capturing(source: MemorySource) -> String {
    let (natives, sink) = builtins::capturing();
    let vm = Vm::with_natives(Arc::new(source), natives);
    vm.run().expect("program should start and finish");
    let octets = sink.lock().expect("sink lock").clone();
    String::from_utf8(octets).expect("these programs print UTF-8")
}
