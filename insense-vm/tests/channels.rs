//! Channel rendezvous: program-level echo, round-robin fairness, and
//! payload integrity under concurrency.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use insense_asm::{Direction, TypeTag};
use insense_vm::channel::{self, Endpoint};
use insense_vm::loader::MemorySource;
use insense_vm::util::ProgramBuilder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

mod common;
use common::run_capturing;

#[test]
fn echo_pair() {
    let a = ProgramBuilder::new()
        .component("A", &[&[(Direction::Out, TypeTag::Integer, "x")]])
        .constructor(&[])
        .push_int(42)
        .send("x")
        .stop("")
        .finish();

    let b = ProgramBuilder::new()
        .component("B", &[&[(Direction::In, TypeTag::Integer, "y")]])
        .constructor(&[])
        .receive("y")
        .proccall("printInt")
        .stop("")
        .finish();

    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .declare("a", TypeTag::Component)
        .call("A", 0)
        .store("a")
        .declare("b", TypeTag::Component)
        .call("B", 0)
        .store("b")
        .connect("a", "x", "b", "y")
        .stop("")
        .finish();

    let source = MemorySource::new()
        .with("Main", main)
        .with("A", a)
        .with("B", b);
    assert_eq!(run_capturing(source), "42");
}

#[test]
fn one_sender_feeds_two_receivers() {
    let sender = ProgramBuilder::new()
        .component("A", &[&[(Direction::Out, TypeTag::Integer, "x")]])
        .constructor(&[])
        .push_int(1)
        .send("x")
        .push_int(2)
        .send("x")
        .stop("")
        .finish();

    let receiver = |name: &str| {
        ProgramBuilder::new()
            .component(name, &[&[(Direction::In, TypeTag::Integer, "y")]])
            .constructor(&[])
            .receive("y")
            .proccall("printInt")
            .stop("")
            .finish()
    };

    let main = ProgramBuilder::new()
        .component("Main", &[])
        .constructor(&[])
        .declare("a", TypeTag::Component)
        .call("A", 0)
        .store("a")
        .declare("r1", TypeTag::Component)
        .call("R1", 0)
        .store("r1")
        .declare("r2", TypeTag::Component)
        .call("R2", 0)
        .store("r2")
        .connect("a", "x", "r1", "y")
        .connect("a", "x", "r2", "y")
        .stop("")
        .finish();

    let source = MemorySource::new()
        .with("Main", main)
        .with("A", sender)
        .with("R1", receiver("R1"))
        .with("R2", receiver("R2"));

    // Each receiver takes exactly one of the two sends; print order is
    // scheduling-dependent.
    let mut output: Vec<char> = run_capturing(source).chars().collect();
    output.sort_unstable();
    assert_eq!(output, vec!['1', '2']);
}

#[test]
fn round_robin_cursor_alternates_across_ready_peers() {
    let out = Endpoint::new(Direction::Out, TypeTag::Integer);
    let first = Endpoint::new(Direction::In, TypeTag::Integer);
    let second = Endpoint::new(Direction::In, TypeTag::Integer);
    channel::bind(&out, &first).unwrap();
    channel::bind(&out, &second).unwrap();

    let receivers: Vec<_> = [&first, &second]
        .into_iter()
        .map(|endpoint| {
            let endpoint = Arc::clone(endpoint);
            thread::spawn(move || endpoint.receive())
        })
        .collect();

    // Let both receivers park so the cursor, not readiness timing, decides.
    thread::sleep(Duration::from_millis(50));
    out.send(1i32.to_be_bytes().to_vec());
    out.send(2i32.to_be_bytes().to_vec());

    let got: Vec<Vec<u8>> = receivers
        .into_iter()
        .map(|r| r.join().expect("receiver thread"))
        .collect();
    assert_eq!(got[0], 1i32.to_be_bytes().to_vec());
    assert_eq!(got[1], 2i32.to_be_bytes().to_vec());
}

#[test]
fn rendezvous_copies_payloads_exactly() {
    let rng = &mut StdRng::seed_from_u64(2322u64);
    let values: Vec<u32> = (0..64).map(|_| rng.gen()).collect();

    let out = Endpoint::new(Direction::Out, TypeTag::UnsignedInteger);
    let inp = Endpoint::new(Direction::In, TypeTag::UnsignedInteger);
    channel::bind(&out, &inp).unwrap();

    let receiver = {
        let inp = Arc::clone(&inp);
        let expected = values.clone();
        thread::spawn(move || {
            for value in expected {
                let octets = inp.receive();
                assert_eq!(octets, value.to_be_bytes().to_vec());
            }
        })
    };

    for value in &values {
        out.send(value.to_be_bytes().to_vec());
    }
    receiver.join().expect("receiver thread");
}

#[test]
fn concurrent_senders_serialize_through_the_gate() {
    let inp = Endpoint::new(Direction::In, TypeTag::Integer);
    let senders: Vec<_> = (0..4i32)
        .map(|value| {
            let out = Endpoint::new(Direction::Out, TypeTag::Integer);
            channel::bind(&out, &inp).unwrap();
            thread::spawn(move || out.send(value.to_be_bytes().to_vec()))
        })
        .collect();

    let mut got: Vec<i32> = (0..4)
        .map(|_| i32::from_be_bytes(inp.receive().try_into().expect("4 octets")))
        .collect();
    for sender in senders {
        sender.join().expect("sender thread");
    }
    got.sort_unstable();
    assert_eq!(got, vec![0, 1, 2, 3]);
}

#[test]
fn unbound_endpoints_block_until_connected() {
    let out = Endpoint::new(Direction::Out, TypeTag::Integer);
    let inp = Endpoint::new(Direction::In, TypeTag::Integer);

    let sender = {
        let out = Arc::clone(&out);
        thread::spawn(move || out.send(5i32.to_be_bytes().to_vec()))
    };

    // The sender cannot pass the connections gate yet.
    thread::sleep(Duration::from_millis(50));
    assert!(!sender.is_finished());

    channel::bind(&out, &inp).unwrap();
    assert_eq!(inp.receive(), 5i32.to_be_bytes().to_vec());
    sender.join().expect("sender thread");
}
