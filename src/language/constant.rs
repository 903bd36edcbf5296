//! Exact constant values and the folding arithmetic the checker performs on
//! them before anything is materialized as a runtime value.

use crate::language::types::BasicKind;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Bool(bool),
    Int(i128),
    Float(f64),
    Complex(f64, f64),
    Str(String),
}

impl Constant {
    pub fn as_bool(&self) -> bool {
        match self {
            Constant::Bool(b) => *b,
            _ => false,
        }
    }

    pub fn as_i128(&self) -> i128 {
        match self {
            Constant::Int(v) => *v,
            Constant::Float(v) => *v as i128,
            _ => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Constant::Int(v) => *v as f64,
            Constant::Float(v) => *v,
            Constant::Complex(re, _) => *re,
            _ => 0.0,
        }
    }

    pub fn as_complex(&self) -> (f64, f64) {
        match self {
            Constant::Int(v) => (*v as f64, 0.0),
            Constant::Float(v) => (*v, 0.0),
            Constant::Complex(re, im) => (*re, *im),
            _ => (0.0, 0.0),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Constant::Str(s) => s,
            _ => "",
        }
    }

    /// Rank in the numeric promotion order int < float < complex.
    fn rank(&self) -> u8 {
        match self {
            Constant::Int(_) => 0,
            Constant::Float(_) => 1,
            Constant::Complex(_, _) => 2,
            _ => 3,
        }
    }

    /// Whether the constant fits the given typed kind without loss. Used
    /// when an untyped constant meets a typed context.
    pub fn representable(&self, kind: BasicKind) -> bool {
        match kind.default_kind() {
            BasicKind::Bool => matches!(self, Constant::Bool(_)),
            BasicKind::String => matches!(self, Constant::Str(_)),
            k if k.is_integer() => {
                let v = match self {
                    Constant::Int(v) => *v,
                    Constant::Float(f) if f.fract() == 0.0 => *f as i128,
                    _ => return false,
                };
                let (min, max): (i128, i128) = match k {
                    BasicKind::Int | BasicKind::Int64 => (i64::MIN as i128, i64::MAX as i128),
                    BasicKind::Int8 => (i8::MIN as i128, i8::MAX as i128),
                    BasicKind::Int16 => (i16::MIN as i128, i16::MAX as i128),
                    BasicKind::Int32 => (i32::MIN as i128, i32::MAX as i128),
                    BasicKind::Uint | BasicKind::Uint64 | BasicKind::Uintptr => {
                        (0, u64::MAX as i128)
                    }
                    BasicKind::Uint8 => (0, u8::MAX as i128),
                    BasicKind::Uint16 => (0, u16::MAX as i128),
                    BasicKind::Uint32 => (0, u32::MAX as i128),
                    _ => return false,
                };
                v >= min && v <= max
            }
            BasicKind::Float32 => match self {
                Constant::Int(_) | Constant::Float(_) => (self.as_f64() as f32).is_finite(),
                _ => false,
            },
            BasicKind::Float64 => matches!(self, Constant::Int(_) | Constant::Float(_)),
            BasicKind::Complex64 | BasicKind::Complex128 => matches!(
                self,
                Constant::Int(_) | Constant::Float(_) | Constant::Complex(_, _)
            ),
            _ => false,
        }
    }

    fn promote(a: Constant, b: Constant) -> (Constant, Constant) {
        // Only numeric constants promote; mixed shapes fall through to the
        // per-operator matches, which reject them.
        if a.rank() > 2 || b.rank() > 2 {
            return (a, b);
        }
        match a.rank().max(b.rank()) {
            0 => (a, b),
            1 => (Constant::Float(a.as_f64()), Constant::Float(b.as_f64())),
            _ => {
                let (ar, ai) = a.as_complex();
                let (br, bi) = b.as_complex();
                (Constant::Complex(ar, ai), Constant::Complex(br, bi))
            }
        }
    }

    pub fn add(self, other: Constant) -> Result<Constant, String> {
        if let (Constant::Str(a), Constant::Str(b)) = (&self, &other) {
            return Ok(Constant::Str(format!("{}{}", a, b)));
        }
        match Constant::promote(self, other) {
            (Constant::Int(a), Constant::Int(b)) => Ok(Constant::Int(a.wrapping_add(b))),
            (Constant::Float(a), Constant::Float(b)) => Ok(Constant::Float(a + b)),
            (Constant::Complex(ar, ai), Constant::Complex(br, bi)) => {
                Ok(Constant::Complex(ar + br, ai + bi))
            }
            _ => Err("invalid operands to +".into()),
        }
    }

    pub fn sub(self, other: Constant) -> Result<Constant, String> {
        match Constant::promote(self, other) {
            (Constant::Int(a), Constant::Int(b)) => Ok(Constant::Int(a.wrapping_sub(b))),
            (Constant::Float(a), Constant::Float(b)) => Ok(Constant::Float(a - b)),
            (Constant::Complex(ar, ai), Constant::Complex(br, bi)) => {
                Ok(Constant::Complex(ar - br, ai - bi))
            }
            _ => Err("invalid operands to -".into()),
        }
    }

    pub fn mul(self, other: Constant) -> Result<Constant, String> {
        match Constant::promote(self, other) {
            (Constant::Int(a), Constant::Int(b)) => Ok(Constant::Int(a.wrapping_mul(b))),
            (Constant::Float(a), Constant::Float(b)) => Ok(Constant::Float(a * b)),
            (Constant::Complex(ar, ai), Constant::Complex(br, bi)) => {
                Ok(Constant::Complex(ar * br - ai * bi, ar * bi + ai * br))
            }
            _ => Err("invalid operands to *".into()),
        }
    }

    pub fn div(self, other: Constant) -> Result<Constant, String> {
        match Constant::promote(self, other) {
            (Constant::Int(a), Constant::Int(b)) => {
                if b == 0 {
                    return Err("division by zero".into());
                }
                Ok(Constant::Int(a / b))
            }
            (Constant::Float(a), Constant::Float(b)) => {
                if b == 0.0 {
                    return Err("division by zero".into());
                }
                Ok(Constant::Float(a / b))
            }
            (Constant::Complex(ar, ai), Constant::Complex(br, bi)) => {
                let denom = br * br + bi * bi;
                if denom == 0.0 {
                    return Err("division by zero".into());
                }
                Ok(Constant::Complex(
                    (ar * br + ai * bi) / denom,
                    (ai * br - ar * bi) / denom,
                ))
            }
            _ => Err("invalid operands to /".into()),
        }
    }

    pub fn rem(self, other: Constant) -> Result<Constant, String> {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => {
                if b == 0 {
                    return Err("division by zero".into());
                }
                Ok(Constant::Int(a % b))
            }
            _ => Err("invalid operands to %".into()),
        }
    }

    pub fn bit_and(self, other: Constant) -> Result<Constant, String> {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => Ok(Constant::Int(a & b)),
            _ => Err("invalid operands to &".into()),
        }
    }

    pub fn bit_or(self, other: Constant) -> Result<Constant, String> {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => Ok(Constant::Int(a | b)),
            _ => Err("invalid operands to |".into()),
        }
    }

    pub fn bit_xor(self, other: Constant) -> Result<Constant, String> {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => Ok(Constant::Int(a ^ b)),
            _ => Err("invalid operands to ^".into()),
        }
    }

    pub fn bit_and_not(self, other: Constant) -> Result<Constant, String> {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => Ok(Constant::Int(a & !b)),
            _ => Err("invalid operands to &^".into()),
        }
    }

    pub fn shift_left(self, amount: &Constant) -> Result<Constant, String> {
        match (self, amount) {
            (Constant::Int(a), Constant::Int(s)) => {
                if *s < 0 || *s > 127 {
                    return Err("invalid shift count".into());
                }
                Ok(Constant::Int(a.wrapping_shl(*s as u32)))
            }
            _ => Err("invalid operands to <<".into()),
        }
    }

    pub fn shift_right(self, amount: &Constant) -> Result<Constant, String> {
        match (self, amount) {
            (Constant::Int(a), Constant::Int(s)) => {
                if *s < 0 || *s > 127 {
                    return Err("invalid shift count".into());
                }
                Ok(Constant::Int(a.wrapping_shr(*s as u32)))
            }
            _ => Err("invalid operands to >>".into()),
        }
    }

    pub fn neg(self) -> Result<Constant, String> {
        match self {
            Constant::Int(v) => Ok(Constant::Int(v.wrapping_neg())),
            Constant::Float(v) => Ok(Constant::Float(-v)),
            Constant::Complex(re, im) => Ok(Constant::Complex(-re, -im)),
            _ => Err("invalid operand to unary -".into()),
        }
    }

    pub fn bit_not(self) -> Result<Constant, String> {
        match self {
            Constant::Int(v) => Ok(Constant::Int(!v)),
            _ => Err("invalid operand to unary ^".into()),
        }
    }

    pub fn not(self) -> Result<Constant, String> {
        match self {
            Constant::Bool(b) => Ok(Constant::Bool(!b)),
            _ => Err("invalid operand to unary !".into()),
        }
    }

    pub fn equal(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Str(a), Constant::Str(b)) => a == b,
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            _ => {
                let (ar, ai) = self.as_complex();
                let (br, bi) = other.as_complex();
                ar == br && ai == bi
            }
        }
    }

    /// Ordered comparison; only defined on integers, floats, and strings.
    pub fn compare(&self, other: &Constant) -> Result<std::cmp::Ordering, String> {
        match (self, other) {
            (Constant::Str(a), Constant::Str(b)) => Ok(a.cmp(b)),
            (Constant::Int(a), Constant::Int(b)) => Ok(a.cmp(b)),
            (Constant::Str(_), _) | (_, Constant::Str(_)) => {
                Err("mismatched operands to comparison".into())
            }
            (Constant::Complex(_, _), _) | (_, Constant::Complex(_, _)) => {
                Err("complex values are not ordered".into())
            }
            (Constant::Bool(_), _) | (_, Constant::Bool(_)) => {
                Err("booleans are not ordered".into())
            }
            _ => self
                .as_f64()
                .partial_cmp(&other.as_f64())
                .ok_or_else(|| "values are not ordered".into()),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Float(v) => {
                if v.fract() == 0.0 && v.abs() < 1e21 {
                    write!(f, "{}", *v as i128)
                } else {
                    write!(f, "{}", v)
                }
            }
            Constant::Complex(re, im) => {
                if *im < 0.0 {
                    write!(f, "({}{}i)", re, im)
                } else {
                    write!(f, "({}+{}i)", re, im)
                }
            }
            Constant::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_folds_exactly() {
        let v = Constant::Int(2)
            .add(Constant::Int(3).mul(Constant::Int(4)).unwrap())
            .unwrap();
        assert_eq!(v, Constant::Int(14));
    }

    #[test]
    fn integer_division_truncates_and_rejects_zero() {
        assert_eq!(
            Constant::Int(7).div(Constant::Int(2)).unwrap(),
            Constant::Int(3)
        );
        assert!(Constant::Int(1).div(Constant::Int(0)).is_err());
    }

    #[test]
    fn mixed_operands_promote_to_float() {
        let v = Constant::Int(1).add(Constant::Float(0.5)).unwrap();
        assert_eq!(v, Constant::Float(1.5));
    }

    #[test]
    fn representability_respects_widths() {
        assert!(Constant::Int(127).representable(BasicKind::Int8));
        assert!(!Constant::Int(128).representable(BasicKind::Int8));
        assert!(!Constant::Int(-1).representable(BasicKind::Uint));
        assert!(Constant::Float(2.0).representable(BasicKind::Int));
        assert!(!Constant::Float(2.5).representable(BasicKind::Int));
    }

    #[test]
    fn complex_constants_multiply() {
        let v = Constant::Complex(1.0, 2.0)
            .mul(Constant::Complex(3.0, 4.0))
            .unwrap();
        assert_eq!(v, Constant::Complex(-5.0, 10.0));
    }
}
