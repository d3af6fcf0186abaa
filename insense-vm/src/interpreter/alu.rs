//! Arithmetic, comparison, and logic over typed values.

use insense_asm::{Opcode, TypeTag};

use super::Interpreter;
use crate::error::{Fault, OpResult};
use crate::value::Value;

impl Interpreter {
    pub(super) fn op_expression(&mut self, op: Opcode) -> OpResult<()> {
        let second = self.operands.pop()?;
        let first = self.operands.pop()?;
        let result = eval_binary(op, &first, &second)?;
        self.operands.push(result);
        Ok(())
    }

    pub(super) fn op_not(&mut self) -> OpResult<()> {
        match self.operands.pop()? {
            Value::Bool(b) => {
                self.operands.push(Value::Bool(!b));
                Ok(())
            }
            other => Err(Fault::TypeMismatch(format!(
                "NOT expects a BOOL operand, got {}",
                other.tag()
            ))),
        }
    }
}

/// Result tag of a binary numeric operation: the wider operand wins.
/// REAL dominates UNSIGNED_INTEGER, which dominates INTEGER, which
/// dominates BYTE.
fn widen(a: TypeTag, b: TypeTag) -> TypeTag {
    fn rank(tag: TypeTag) -> u8 {
        match tag {
            TypeTag::Real => 3,
            TypeTag::UnsignedInteger => 2,
            TypeTag::Integer => 1,
            _ => 0,
        }
    }
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

/// Evaluates one binary expression opcode over two popped operands,
/// `first` being the one pushed earlier.
///
/// Numeric operands widen to a common double for evaluation; arithmetic
/// results narrow back to the widest operand tag, comparisons produce
/// BOOL. `MOD` is undefined over REAL, and integer division by zero is a
/// type-contract violation rather than a host trap.
pub fn eval_binary(op: Opcode, first: &Value, second: &Value) -> OpResult<Value> {
    use Opcode::*;

    if matches!(op, AND | OR) {
        return match (first, second) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
                AND => *a && *b,
                _ => *a || *b,
            })),
            _ => Err(Fault::TypeMismatch(format!(
                "{op} expects BOOL operands, got {} and {}",
                first.tag(),
                second.tag()
            ))),
        };
    }

    if !first.is_numeric() || !second.is_numeric() {
        return Err(Fault::TypeMismatch(format!(
            "{op} expects numeric operands, got {} and {}",
            first.tag(),
            second.tag()
        )));
    }

    let a = first.as_f64()?;
    let b = second.as_f64()?;

    let comparison = match op {
        LESS => Some(a < b),
        LESSEQUAL => Some(a <= b),
        MORE => Some(a > b),
        MOREEQUAL => Some(a >= b),
        EQUAL => Some(a == b),
        UNEQUAL => Some(a != b),
        _ => None,
    };
    if let Some(outcome) = comparison {
        return Ok(Value::Bool(outcome));
    }

    let result_tag = widen(first.tag(), second.tag());
    if op == MOD && result_tag == TypeTag::Real {
        return Err(Fault::TypeMismatch("MOD is undefined over REAL".into()));
    }
    if matches!(op, DIV | MOD) && result_tag != TypeTag::Real && b == 0.0 {
        return Err(Fault::TypeMismatch(format!("integer {op} by zero")));
    }

    let value = match op {
        ADD => a + b,
        SUB => a - b,
        MUL => a * b,
        DIV => a / b,
        MOD => a % b,
        other => {
            return Err(Fault::Protocol(format!(
                "{other} is not a binary expression opcode"
            )))
        }
    };
    Value::from_f64(result_tag, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widest_operand_selects_the_result_tag() {
        let r = eval_binary(Opcode::ADD, &Value::Integer(1), &Value::Real(0.5)).unwrap();
        assert_eq!(r, Value::Real(1.5));

        let r = eval_binary(Opcode::ADD, &Value::Byte(2), &Value::Integer(3)).unwrap();
        assert_eq!(r, Value::Integer(5));

        let r = eval_binary(Opcode::MUL, &Value::Unsigned(4), &Value::Integer(3)).unwrap();
        assert_eq!(r, Value::Unsigned(12));

        let r = eval_binary(Opcode::SUB, &Value::Byte(9), &Value::Byte(4)).unwrap();
        assert_eq!(r, Value::Byte(5));
    }

    #[test]
    fn comparisons_widen_to_real_and_produce_bool() {
        let r = eval_binary(Opcode::LESS, &Value::Integer(1), &Value::Real(1.5)).unwrap();
        assert_eq!(r, Value::Bool(true));

        let r = eval_binary(Opcode::EQUAL, &Value::Byte(3), &Value::Integer(3)).unwrap();
        assert_eq!(r, Value::Bool(true));

        let r = eval_binary(Opcode::MOREEQUAL, &Value::Integer(2), &Value::Integer(5)).unwrap();
        assert_eq!(r, Value::Bool(false));
    }

    #[test]
    fn mod_rejects_real_operands() {
        let r = eval_binary(Opcode::MOD, &Value::Real(5.0), &Value::Integer(2));
        assert!(matches!(r, Err(Fault::TypeMismatch(_))));

        let r = eval_binary(Opcode::MOD, &Value::Integer(5), &Value::Integer(2)).unwrap();
        assert_eq!(r, Value::Integer(1));
    }

    #[test]
    fn integer_division_by_zero_faults() {
        let r = eval_binary(Opcode::DIV, &Value::Integer(5), &Value::Integer(0));
        assert!(matches!(r, Err(Fault::TypeMismatch(_))));
    }

    #[test]
    fn real_division_by_zero_follows_ieee() {
        let r = eval_binary(Opcode::DIV, &Value::Real(1.0), &Value::Real(0.0)).unwrap();
        assert_eq!(r, Value::Real(f64::INFINITY));
    }

    #[test]
    fn logic_requires_bools() {
        let r = eval_binary(Opcode::AND, &Value::Bool(true), &Value::Bool(false)).unwrap();
        assert_eq!(r, Value::Bool(false));

        let r = eval_binary(Opcode::OR, &Value::Bool(false), &Value::Bool(true)).unwrap();
        assert_eq!(r, Value::Bool(true));

        let r = eval_binary(Opcode::AND, &Value::Integer(1), &Value::Bool(true));
        assert!(matches!(r, Err(Fault::TypeMismatch(_))));
    }

    #[test]
    fn arithmetic_rejects_non_numeric_operands() {
        let r = eval_binary(Opcode::ADD, &Value::String("a".into()), &Value::Integer(1));
        assert!(matches!(r, Err(Fault::TypeMismatch(_))));
    }
}
