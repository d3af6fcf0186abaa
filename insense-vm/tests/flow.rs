//! Control flow: conditionals, the behaviour loop, constructor overloads,
//! and cooperative stop.

use insense_asm::{Opcode, TypeTag};
use insense_vm::loader::MemorySource;
use insense_vm::util::ProgramBuilder;

mod common;
use common::run_capturing;

fn print_str_fragment(text: &str) -> Vec<u8> {
    ProgramBuilder::new()
        .push_str(text)
        .proccall("printString")
        .finish()
}

#[test]
fn if_true_runs_the_then_branch_and_skips_the_else() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_bool(true)
        .if_else_block(print_str_fragment("T"), print_str_fragment("F"))
        .stop("")
        .finish();

    assert_eq!(run_capturing(MemorySource::new().with("Main", main)), "T\n");
}

#[test]
fn if_false_lands_on_the_else_and_takes_it() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_bool(false)
        .if_else_block(print_str_fragment("T"), print_str_fragment("F"))
        .stop("")
        .finish();

    assert_eq!(run_capturing(MemorySource::new().with("Main", main)), "F\n");
}

#[test]
fn if_false_without_else_rewinds_and_resumes() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_bool(false)
        .if_block(print_str_fragment("skipped"))
        .push_str("after")
        .proccall("printString")
        .stop("")
        .finish();

    assert_eq!(
        run_capturing(MemorySource::new().with("Main", main)),
        "after\n"
    );
}

#[test]
fn behaviour_loop_counts_down() {
    // PUSH 3; STORE n; loop: n > 0 ? { print n; n = n - 1; jump back } : stop
    let build = |skip: i32, loop_start: usize| -> (Vec<u8>, usize, i32) {
        let b = ProgramBuilder::new()
            .component("Main", &[])
            .constructor(&[])
            .push_int(3)
            .declare("n", TypeTag::Integer)
            .store("n");
        let start = b.len();
        let b = b
            .load("n")
            .push_int(0)
            .op(Opcode::MORE)
            .op(Opcode::IF)
            .int_literal(skip);
        let then_start = b.len();
        let b = b
            .load("n")
            .proccall("printInt")
            .load("n")
            .push_int(1)
            .op(Opcode::SUB)
            .store("n")
            .behaviour_jump_to(loop_start);
        let then_len = (b.len() - then_start) as i32;
        let b = b.stop("");
        (b.finish(), start, then_len)
    };

    // First pass measures offsets, second pass assembles with them.
    let (_, loop_start, skip) = build(0, 0);
    let (program, start2, skip2) = build(skip, loop_start);
    assert_eq!((loop_start, skip), (start2, skip2));

    assert_eq!(
        run_capturing(MemorySource::new().with("Main", program)),
        "321"
    );
}

fn overloaded_component() -> Vec<u8> {
    ProgramBuilder::new()
        .component("C", &[])
        .constructor(&[(TypeTag::Integer, "i")])
        .load("i")
        .proccall("printInt")
        .blockend()
        .constructor(&[(TypeTag::Real, "r")])
        .load("r")
        .proccall("printReal")
        .blockend()
        .stop("")
        .finish()
}

#[test]
fn constructor_overload_selects_by_argument_type() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_real(2.5)
        .call("C", 1)
        .stop("")
        .finish();

    let source = MemorySource::new()
        .with("Main", main)
        .with("C", overloaded_component());
    assert_eq!(run_capturing(source), "2.5");
}

#[test]
fn constructor_overload_first_match_wins() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_int(7)
        .call("C", 1)
        .stop("")
        .finish();

    let source = MemorySource::new()
        .with("Main", main)
        .with("C", overloaded_component());
    assert_eq!(run_capturing(source), "7");
}

#[test]
fn wrong_arity_exhausts_the_constructor_search() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_int(1)
        .push_int(2)
        .call("C", 2)
        .stop("")
        .finish();

    let source = MemorySource::new()
        .with("Main", main)
        .with("C", overloaded_component());
    // The child faults with NoMatchingConstructor and prints nothing; the
    // parent still joins it and finishes.
    assert_eq!(run_capturing(source), "");
}

#[test]
fn external_stop_terminates_a_spinning_child() {
    let spinner = {
        let b = ProgramBuilder::new().component("Spin", &[]).constructor(&[]);
        let loop_start = b.len();
        b.op(Opcode::ENTERSCOPE)
            .op(Opcode::EXITSCOPE)
            .behaviour_jump_to(loop_start)
            .finish()
    };

    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .declare("s", TypeTag::Component)
        .call("Spin", 0)
        .store("s")
        .stop("s")
        .stop("")
        .finish();

    let source = MemorySource::new().with("Main", main).with("Spin", spinner);
    // Termination is the assertion: join would hang if STOP were lost.
    assert_eq!(run_capturing(source), "");
}

#[test]
fn zero_arity_constructor_always_matches() {
    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .push_str("ran")
        .proccall("printString")
        .stop("")
        .finish();

    assert_eq!(
        run_capturing(MemorySource::new().with("Main", main)),
        "ran\n"
    );
}
