//! End-to-end programs: printing, procedures, structs, ANY projection.

use insense_asm::TypeTag;
use insense_vm::loader::MemorySource;
use insense_vm::util::ProgramBuilder;

mod common;
use common::run_capturing;

#[test]
fn hello() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_str("hi")
        .proccall("printString")
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "hi\n");
}

#[test]
fn local_procedure_call_and_return() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .proc("printTwice", &[(TypeTag::Integer, "x")])
        .load("x")
        .proccall("printInt")
        .load("x")
        .proccall("printInt")
        .blockend()
        .push_int(5)
        .proccall("printTwice")
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "55");
}

#[test]
fn child_resolves_procedures_from_the_entry_component() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .proc("announce", &[(TypeTag::Integer, "i")])
        .load("i")
        .proccall("printInt")
        .blockend()
        .call("Worker", 0)
        .stop("")
        .finish();

    let worker = ProgramBuilder::new()
        .component("Worker", &[])
        .constructor(&[])
        .push_int(8)
        .proccall("announce")
        .stop("")
        .finish();

    let source = MemorySource::new().with("Main", main).with("Worker", worker);
    assert_eq!(run_capturing(source), "8");
}

#[test]
fn local_procedures_shadow_builtins() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .proc("printInt", &[(TypeTag::Integer, "i")])
        .push_str("shadowed")
        .proccall("printString")
        .blockend()
        .push_int(9)
        .proccall("printInt")
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "shadowed\n");
}

#[test]
fn project_selects_the_matching_arm() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_int(7)
        .any()
        .project_entry("v")
        .project_arm(TypeTag::Integer)
        .load("v")
        .proccall("printInt")
        .blockend()
        .project_arm(TypeTag::Real)
        .load("v")
        .proccall("printReal")
        .blockend()
        .project_arm(TypeTag::Any)
        .push_str("other")
        .proccall("printString")
        .blockend()
        .project_exit()
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "7");
}

#[test]
fn project_falls_back_to_the_any_arm() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_str("text")
        .any()
        .project_entry("v")
        .project_arm(TypeTag::Integer)
        .load("v")
        .proccall("printInt")
        .blockend()
        .project_arm(TypeTag::Any)
        .push_str("other")
        .proccall("printString")
        .blockend()
        .project_exit()
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "other\n");
}

#[test]
fn project_without_a_matching_arm_continues_past_the_block() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_real(1.5)
        .any()
        .project_entry("v")
        .project_arm(TypeTag::Integer)
        .load("v")
        .proccall("printInt")
        .blockend()
        .project_exit()
        .push_str("after")
        .proccall("printString")
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "after\n");
}

#[test]
fn struct_fields_bind_in_definition_order() {
    // Fields pop from the stack top: the first declared field takes the
    // last pushed value.
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_int(1)
        .push_int(2)
        .struct_constructor(&[(TypeTag::Integer, "x"), (TypeTag::Integer, "y")])
        .struct_load("y")
        .proccall("printInt")
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "1");
}

#[test]
fn missing_struct_field_stops_the_component() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_int(3)
        .struct_constructor(&[(TypeTag::Integer, "x")])
        .struct_load("ghost")
        .push_str("unreachable")
        .proccall("printString")
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "");
}

#[test]
fn unknown_opcode_bytes_are_skipped() {
    // 0x18 is the unassigned byte left by the never-emitted TYPE opcode;
    // the interpreter logs it and resyncs on the next octet.
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .byte(0x18)
        .push_str("resynced")
        .proccall("printString")
        .stop("")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "resynced\n");
}

#[test]
fn directory_source_runs_a_program_from_disk() {
    use insense_vm::builtins;
    use insense_vm::loader::{component_file_name, DirectorySource};
    use insense_vm::vm::Vm;
    use std::sync::Arc;

    let dir = std::env::temp_dir().join(format!("insense-vm-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create program directory");
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_str("from disk")
        .proccall("printString")
        .stop("")
        .finish();
    std::fs::write(dir.join(component_file_name("Main")), main).expect("write program");

    let (natives, sink) = builtins::capturing();
    let vm = Vm::with_natives(Arc::new(DirectorySource::new(&dir)), natives);
    vm.run().expect("program runs");
    assert_eq!(sink.lock().unwrap().as_slice(), b"from disk\n");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn stream_exhaustion_ends_the_component() {
    // No STOP: the behaviour simply runs off the end of the stream.
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_int(1)
        .proccall("printInt")
        .finish();

    let output = run_capturing(MemorySource::new().with("Main", main));
    assert_eq!(output, "1");
}
