//! The standard native procedures.
//!
//! The VM ships `printString`, `printInt`, and `printReal`. `printString`
//! emits the string's octets followed by a newline, `printInt` prints bare
//! decimal, and `printReal` prints in C `%G` style: six significant
//! digits, trailing zeros stripped, scientific notation once the decimal
//! exponent leaves the `[-4, 6)` range. Program output goes to stdout as
//! raw octets (strings carry no text encoding); diagnostics go through
//! `tracing` (stderr), so piped program output stays clean.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::error;

use crate::procedure::NativeTable;
use crate::value::Value;

/// Shared sink capturing program output octets, for tests and embedders.
pub type OutputSink = Arc<Mutex<Vec<u8>>>;

/// The standard table writing to stdout.
pub fn standard() -> NativeTable {
    table_with(Arc::new(|octets: &[u8]| {
        let mut out = std::io::stdout();
        let _ = out.write_all(octets);
        let _ = out.flush();
    }))
}

/// The standard table writing into a shared buffer, plus the sink.
pub fn capturing() -> (NativeTable, OutputSink) {
    let sink: OutputSink = Arc::new(Mutex::new(Vec::new()));
    let writer = {
        let sink = Arc::clone(&sink);
        Arc::new(move |octets: &[u8]| {
            sink.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend_from_slice(octets);
        })
    };
    (table_with(writer), sink)
}

fn table_with(emit: Arc<dyn Fn(&[u8]) + Send + Sync>) -> NativeTable {
    let mut table = NativeTable::new();

    {
        let emit = Arc::clone(&emit);
        table.register("printString", &["s"], move |args, _stack| {
            match args.first() {
                Some(Value::String(s)) => {
                    let mut line = s.as_octets().to_vec();
                    line.push(b'\n');
                    emit(&line);
                }
                other => error!(?other, "printString expects one STRING argument"),
            }
        });
    }
    {
        let emit = Arc::clone(&emit);
        table.register("printInt", &["i"], move |args, _stack| match args.first() {
            Some(Value::Integer(i)) => emit(i.to_string().as_bytes()),
            other => error!(?other, "printInt expects one INTEGER argument"),
        });
    }
    table.register("printReal", &["r"], move |args, _stack| match args.first() {
        Some(Value::Real(r)) => emit(format_real(*r).as_bytes()),
        other => error!(?other, "printReal expects one REAL argument"),
    });

    table
}

/// Significant digits of `%G`'s default precision.
const REAL_DIGITS: usize = 6;

/// Renders a double the way C's `printf("%G", r)` does: six significant
/// digits, `%F`-style within decimal exponents `[-4, 6)` and `%E`-style
/// outside, trailing zeros (and a bare decimal point) removed, and a
/// signed two-digit exponent field.
fn format_real(r: f64) -> String {
    if r.is_nan() {
        return String::from("NAN");
    }
    if r.is_infinite() {
        return String::from(if r.is_sign_negative() { "-INF" } else { "INF" });
    }
    if r == 0.0 {
        return String::from(if r.is_sign_negative() { "-0" } else { "0" });
    }

    // The exponent after rounding to six significant digits decides the
    // notation; formatting first and parsing it back handles values that
    // round across a power of ten (999999.5 prints as 1E+06).
    let scientific = format!("{:.*E}", REAL_DIGITS - 1, r);
    let (mantissa, exponent) = scientific
        .split_once('E')
        .expect("scientific notation carries an exponent");
    let exponent: i32 = exponent.parse().expect("exponent is decimal");

    if exponent < -4 || exponent >= REAL_DIGITS as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}E{sign}{:02}",
            strip_trailing_zeros(mantissa),
            exponent.abs()
        )
    } else {
        let decimals = (REAL_DIGITS as i32 - 1 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", decimals, r);
        strip_trailing_zeros(&fixed).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
