//! Binary operators over host values. Arithmetic is performed at the exact
//! width of the operand's host type; the result takes the left operand's
//! static type.

use crate::language::ast::BinaryOp;
use crate::language::types::Type;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::{values_equal, Object, RtValue};
use crate::runtime::registry::{Registry, RtType};

/// Arithmetic, bitwise, and string-concatenation operators.
pub fn binary_arith(
    op: BinaryOp,
    lo: Object,
    ro: Object,
    registry: &Registry,
) -> RuntimeResult<Object> {
    let lo = lo.defaulted(registry)?;
    let ro = ro.defaulted(registry)?;
    let (rt, _) = registry
        .resolve(&lo.typ)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", lo.typ)))?;
    let lv = lo.rt_value(registry)?;
    let rv = ro.rt_value(registry)?;

    let result = match (&lv, &rv) {
        (RtValue::Int(a), RtValue::Int(b)) => RtValue::Int(int_arith(op, *a, *b, &rt)?),
        (RtValue::Uint(a), RtValue::Uint(b)) => RtValue::Uint(uint_arith(op, *a, *b, &rt)?),
        (RtValue::Float(a), RtValue::Float(b)) => {
            let narrow = matches!(rt.repr(), RtType::Float32);
            RtValue::Float(float_arith(op, *a, *b, narrow)?)
        }
        (RtValue::Complex(ar, ai), RtValue::Complex(br, bi)) => {
            let narrow = matches!(rt.repr(), RtType::Complex64);
            complex_arith(op, (*ar, *ai), (*br, *bi), narrow)?
        }
        (RtValue::Str(a), RtValue::Str(b)) => {
            if op != BinaryOp::Add {
                return Err(invalid_operands(op, &lo.typ, &ro.typ));
            }
            RtValue::Str(format!("{}{}", a, b))
        }
        _ => return Err(invalid_operands(op, &lo.typ, &ro.typ)),
    };
    Ok(Object::temp(result, lo.typ, false))
}

/// Shift operators. The amount is read as an unsigned value regardless of
/// the static type of the right operand.
pub fn binary_shift(
    op: BinaryOp,
    lo: Object,
    ro: Object,
    registry: &Registry,
) -> RuntimeResult<Object> {
    let lo = lo.defaulted(registry)?;
    let amount = match ro.defaulted(registry)?.rt_value(registry)? {
        RtValue::Int(v) => v as u64,
        RtValue::Uint(v) => v,
        other => {
            return Err(RuntimeError::panic(format!(
                "invalid shift count {:?}",
                other
            )));
        }
    };
    let (rt, _) = registry
        .resolve(&lo.typ)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", lo.typ)))?;
    let value = match lo.rt_value(registry)? {
        RtValue::Int(a) => RtValue::Int(int_shift(op, a, amount, &rt)),
        RtValue::Uint(a) => RtValue::Uint(uint_shift(op, a, amount, &rt)),
        other => {
            return Err(RuntimeError::panic(format!(
                "invalid shift operand {:?}",
                other
            )));
        }
    };
    Ok(Object::temp(value, lo.typ, false))
}

/// Comparison operators. The result is a boolean of the expression's
/// static type, which may be a named boolean type.
pub fn binary_compare(
    op: BinaryOp,
    lo: Object,
    ro: Object,
    result_typ: &Type,
    registry: &Registry,
) -> RuntimeResult<Object> {
    // One side may be the untyped nil sentinel.
    if lo.is_untyped_nil() || ro.is_untyped_nil() {
        let eq = if lo.is_untyped_nil() && ro.is_untyped_nil() {
            true
        } else {
            let other = if lo.is_untyped_nil() { &ro } else { &lo };
            other.rt_value(registry)?.is_nil()
        };
        let result = match op {
            BinaryOp::Eq => eq,
            BinaryOp::NotEq => !eq,
            _ => return Err(RuntimeError::panic("nil is not ordered")),
        };
        return Ok(Object::temp(
            RtValue::Bool(result),
            result_typ.clone(),
            false,
        ));
    }

    let lo = lo.defaulted(registry)?;
    let ro = ro.defaulted(registry)?;
    let lv = lo.rt_value(registry)?;
    let rv = ro.rt_value(registry)?;

    let result = match op {
        BinaryOp::Eq => values_equal(&lv, &rv)?,
        BinaryOp::NotEq => !values_equal(&lv, &rv)?,
        _ => {
            let ord = match (&lv, &rv) {
                (RtValue::Int(a), RtValue::Int(b)) => a.cmp(b),
                (RtValue::Uint(a), RtValue::Uint(b)) => a.cmp(b),
                (RtValue::Float(a), RtValue::Float(b)) => a
                    .partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Greater),
                (RtValue::Str(a), RtValue::Str(b)) => a.cmp(b),
                _ => {
                    return Err(invalid_operands(op, &lo.typ, &ro.typ));
                }
            };
            match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::LtEq => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                BinaryOp::GtEq => ord.is_ge(),
                _ => unreachable!("comparison operator"),
            }
        }
    };
    Ok(Object::temp(
        RtValue::Bool(result),
        result_typ.clone(),
        false,
    ))
}

/// The ++ and -- statements, mutating the operand's cell in place.
pub fn inc_dec(obj: &Object, dec: bool) -> RuntimeResult<()> {
    let cell = obj.expect_cell()?;
    let delta: i64 = if dec { -1 } else { 1 };
    let value = match cell.get() {
        RtValue::Int(v) => RtValue::Int(truncate_int(v.wrapping_add(delta), &cell.typ)),
        RtValue::Uint(v) => RtValue::Uint(truncate_uint(v.wrapping_add(delta as u64), &cell.typ)),
        RtValue::Float(v) => RtValue::Float(v + delta as f64),
        RtValue::Complex(re, im) => RtValue::Complex(re + delta as f64, im),
        other => {
            return Err(RuntimeError::panic(format!(
                "invalid operand {:?} to {}",
                other,
                if dec { "--" } else { "++" }
            )));
        }
    };
    cell.set(value);
    Ok(())
}

fn invalid_operands(op: BinaryOp, left: &Type, right: &Type) -> RuntimeError {
    RuntimeError::panic(format!(
        "invalid operands to {}: {}, {}",
        op.symbol(),
        left,
        right
    ))
}

fn int_arith(op: BinaryOp, a: i64, b: i64, rt: &RtType) -> RuntimeResult<i64> {
    let wide = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.wrapping_div(b)
        }
        BinaryOp::Rem => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.wrapping_rem(b)
        }
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::AndNot => a & !b,
        _ => return Err(RuntimeError::panic("unexpected integer operator")),
    };
    Ok(truncate_int(wide, rt))
}

fn uint_arith(op: BinaryOp, a: u64, b: u64, rt: &RtType) -> RuntimeResult<u64> {
    let wide = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a / b
        }
        BinaryOp::Rem => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a % b
        }
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::AndNot => a & !b,
        _ => return Err(RuntimeError::panic("unexpected integer operator")),
    };
    Ok(truncate_uint(wide, rt))
}

fn float_arith(op: BinaryOp, a: f64, b: f64, narrow: bool) -> RuntimeResult<f64> {
    let (a, b) = if narrow {
        (a as f32 as f64, b as f32 as f64)
    } else {
        (a, b)
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a / b
        }
        _ => {
            return Err(RuntimeError::panic(format!(
                "operator {} not defined on floats",
                op.symbol()
            )));
        }
    };
    Ok(if narrow { result as f32 as f64 } else { result })
}

fn complex_arith(
    op: BinaryOp,
    (ar, ai): (f64, f64),
    (br, bi): (f64, f64),
    narrow: bool,
) -> RuntimeResult<RtValue> {
    let (re, im) = match op {
        BinaryOp::Add => (ar + br, ai + bi),
        BinaryOp::Sub => (ar - br, ai - bi),
        BinaryOp::Mul => (ar * br - ai * bi, ar * bi + ai * br),
        BinaryOp::Div => {
            let denom = br * br + bi * bi;
            if denom == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            ((ar * br + ai * bi) / denom, (ai * br - ar * bi) / denom)
        }
        _ => {
            return Err(RuntimeError::panic(format!(
                "operator {} not defined on complex numbers",
                op.symbol()
            )));
        }
    };
    if narrow {
        Ok(RtValue::Complex(re as f32 as f64, im as f32 as f64))
    } else {
        Ok(RtValue::Complex(re, im))
    }
}

fn int_width(rt: &RtType) -> u32 {
    match rt.repr() {
        RtType::Int8 | RtType::Uint8 => 8,
        RtType::Int16 | RtType::Uint16 => 16,
        RtType::Int32 | RtType::Uint32 => 32,
        _ => 64,
    }
}

fn int_shift(op: BinaryOp, a: i64, amount: u64, rt: &RtType) -> i64 {
    let width = int_width(rt);
    if amount >= width as u64 {
        return match op {
            BinaryOp::Shr if a < 0 => -1,
            _ => 0,
        };
    }
    let shifted = match op {
        BinaryOp::Shl => a.wrapping_shl(amount as u32),
        _ => a >> amount,
    };
    truncate_int(shifted, rt)
}

fn uint_shift(op: BinaryOp, a: u64, amount: u64, rt: &RtType) -> u64 {
    let width = int_width(rt);
    if amount >= width as u64 {
        return 0;
    }
    let shifted = match op {
        BinaryOp::Shl => a.wrapping_shl(amount as u32),
        _ => a >> amount,
    };
    truncate_uint(shifted, rt)
}

fn truncate_int(v: i64, rt: &RtType) -> i64 {
    match rt.repr() {
        RtType::Int8 => v as i8 as i64,
        RtType::Int16 => v as i16 as i64,
        RtType::Int32 => v as i32 as i64,
        _ => v,
    }
}

fn truncate_uint(v: u64, rt: &RtType) -> u64 {
    match rt.repr() {
        RtType::Uint8 => v as u8 as u64,
        RtType::Uint16 => v as u16 as u64,
        RtType::Uint32 => v as u32 as u64,
        _ => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::constant::Constant;
    use crate::language::types::BasicKind;

    fn int_obj(v: i64) -> Object {
        Object::temp(RtValue::Int(v), Type::Basic(BasicKind::Int), false)
    }

    fn int8_obj(v: i64) -> Object {
        Object::temp(RtValue::Int(v), Type::Basic(BasicKind::Int8), false)
    }

    #[test]
    fn arithmetic_takes_left_operand_type() {
        let registry = Registry::new();
        let result = binary_arith(BinaryOp::Add, int_obj(2), int_obj(3), &registry).unwrap();
        assert_eq!(result.typ, Type::Basic(BasicKind::Int));
        assert!(matches!(
            result.rt_value(&registry).unwrap(),
            RtValue::Int(5)
        ));
    }

    #[test]
    fn narrow_integers_wrap_at_their_width() {
        let registry = Registry::new();
        let result =
            binary_arith(BinaryOp::Add, int8_obj(127), int8_obj(1), &registry).unwrap();
        assert!(matches!(
            result.rt_value(&registry).unwrap(),
            RtValue::Int(-128)
        ));
    }

    #[test]
    fn integer_division_by_zero_is_a_runtime_error() {
        let registry = Registry::new();
        assert!(matches!(
            binary_arith(BinaryOp::Div, int_obj(1), int_obj(0), &registry),
            Err(RuntimeError::DivisionByZero)
        ));
        assert!(matches!(
            binary_arith(BinaryOp::Rem, int_obj(1), int_obj(0), &registry),
            Err(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn untyped_constant_operand_materializes_first() {
        let registry = Registry::new();
        let exact = Object::exact(Constant::Int(3), Type::Basic(BasicKind::UntypedInt));
        let result = binary_arith(BinaryOp::Mul, int_obj(4), exact, &registry).unwrap();
        assert!(matches!(
            result.rt_value(&registry).unwrap(),
            RtValue::Int(12)
        ));
    }

    #[test]
    fn shift_amount_reads_as_unsigned_and_saturates() {
        let registry = Registry::new();
        let result =
            binary_shift(BinaryOp::Shl, int_obj(1), int_obj(3), &registry).unwrap();
        assert!(matches!(
            result.rt_value(&registry).unwrap(),
            RtValue::Int(8)
        ));
        // Shifting past the width produces zero, not a wrapped amount.
        let result =
            binary_shift(BinaryOp::Shl, int8_obj(1), int_obj(9), &registry).unwrap();
        assert!(matches!(
            result.rt_value(&registry).unwrap(),
            RtValue::Int(0)
        ));
    }

    #[test]
    fn comparisons_cover_strings_and_numbers() {
        let registry = Registry::new();
        let untyped_bool = Type::Basic(BasicKind::UntypedBool);
        let result = binary_compare(
            BinaryOp::Lt,
            int_obj(2),
            int_obj(3),
            &untyped_bool,
            &registry,
        )
        .unwrap();
        assert!(matches!(
            result.rt_value(&registry).unwrap(),
            RtValue::Bool(true)
        ));

        let a = Object::temp(
            RtValue::Str("a".into()),
            Type::Basic(BasicKind::String),
            false,
        );
        let b = Object::temp(
            RtValue::Str("b".into()),
            Type::Basic(BasicKind::String),
            false,
        );
        let result = binary_compare(BinaryOp::GtEq, a, b, &untyped_bool, &registry).unwrap();
        assert!(matches!(
            result.rt_value(&registry).unwrap(),
            RtValue::Bool(false)
        ));
    }

    #[test]
    fn nil_comparison_checks_value_nilness() {
        let registry = Registry::new();
        let untyped_bool = Type::Basic(BasicKind::UntypedBool);
        let p = Object::temp(
            RtValue::Ptr(None),
            Type::pointer(Type::Basic(BasicKind::Int)),
            false,
        );
        let result = binary_compare(
            BinaryOp::Eq,
            p,
            Object::untyped_nil(),
            &untyped_bool,
            &registry,
        )
        .unwrap();
        assert!(matches!(
            result.rt_value(&registry).unwrap(),
            RtValue::Bool(true)
        ));
    }
}
