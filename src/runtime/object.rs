//! The value domain: the evaluator's universal `Object` carrier and the
//! host runtime values it wraps.

use crate::language::constant::Constant;
use crate::language::types::{BasicKind, Type};
use crate::runtime::channel::ChannelValue;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::registry::{HostSig, Registry, RtType};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A settable host cell: the representation of every assignable location.
/// Cloning an `Object` holding a cell aliases the same storage.
pub struct TypedCell {
    pub typ: RtType,
    value: Mutex<RtValue>,
}

pub type Cell = Arc<TypedCell>;

impl TypedCell {
    pub fn new(typ: RtType, value: RtValue) -> Cell {
        Arc::new(TypedCell {
            typ,
            value: Mutex::new(value),
        })
    }

    pub fn zeroed(typ: RtType) -> Cell {
        let zero = zero_value(&typ);
        TypedCell::new(typ, zero)
    }

    pub fn get(&self) -> RtValue {
        self.value.lock().expect("cell lock").clone()
    }

    pub fn set(&self, value: RtValue) {
        *self.value.lock().expect("cell lock") = value;
    }
}

impl fmt::Debug for TypedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell<{}>", self.typ)
    }
}

/// An interface cell: a dynamic host type paired with the value it holds.
#[derive(Clone, Debug)]
pub struct IfaceValue {
    pub typ: RtType,
    pub value: RtValue,
}

/// Struct values hold one cell per field so that field selections are
/// assignable locations. Assignment copies the cells (value semantics).
#[derive(Clone, Debug)]
pub struct StructValue {
    pub fields: Arc<Vec<Cell>>,
}

#[derive(Clone, Debug)]
pub struct SliceValue {
    pub elems: Arc<Vec<Cell>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    /// Float keys hash by bit pattern.
    Float(u64),
    Str(String),
}

#[derive(Clone, Debug)]
pub struct MapValue {
    pub entries: Arc<Mutex<HashMap<MapKey, RtValue>>>,
}

impl MapValue {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MapValue {
    fn default() -> Self {
        Self::new()
    }
}

/// A host function: a concrete signature plus native code.
#[derive(Clone)]
pub struct HostFn {
    pub sig: Arc<HostSig>,
    pub func: Arc<dyn Fn(Vec<RtValue>) -> RuntimeResult<Vec<RtValue>> + Send + Sync>,
}

impl fmt::Debug for HostFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFn({:p})", Arc::as_ptr(&self.func))
    }
}

/// A simulated callable: `Vec<Object> -> Vec<Object>`, used whenever the
/// signature has no concrete host representation.
#[derive(Clone)]
pub struct SimFn {
    pub func: Arc<dyn Fn(Vec<Object>) -> RuntimeResult<Vec<Object>> + Send + Sync>,
}

impl fmt::Debug for SimFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimFn({:p})", Arc::as_ptr(&self.func))
    }
}

/// A host runtime value. Signed integers of every width share the `Int`
/// carrier and unsigned widths share `Uint`; the width used for arithmetic
/// comes from the host type handle.
#[derive(Clone, Debug)]
pub enum RtValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    Str(String),
    /// The empty struct value.
    Unit,
    Struct(StructValue),
    Iface(Option<Box<IfaceValue>>),
    Ptr(Option<Cell>),
    Slice(Option<SliceValue>),
    Map(Option<MapValue>),
    Chan(Option<ChannelValue>),
    Func(Option<HostFn>),
    SimFunc(Option<SimFn>),
}

impl RtValue {
    pub fn is_nil(&self) -> bool {
        matches!(
            self,
            RtValue::Ptr(None)
                | RtValue::Slice(None)
                | RtValue::Map(None)
                | RtValue::Chan(None)
                | RtValue::Func(None)
                | RtValue::SimFunc(None)
                | RtValue::Iface(None)
        )
    }
}

/// The slot of a reflective runtime value: a settable cell for assignable
/// locations, a plain value for temporaries.
#[derive(Clone, Debug)]
pub enum Slot {
    Cell(Cell),
    Temp(RtValue),
}

/// What an `Object` carries: a reflective value, a compile-time exact
/// constant, or the untyped-nil sentinel.
#[derive(Clone, Debug)]
pub enum ObjValue {
    Rt(Slot),
    Exact(Constant),
    Nil,
}

/// The evaluator's universal value: runtime value, static type, and the
/// simulated flag.
#[derive(Clone, Debug)]
pub struct Object {
    pub value: ObjValue,
    pub typ: Type,
    pub sim: bool,
}

impl Object {
    pub fn cell(cell: Cell, typ: Type, sim: bool) -> Object {
        Object {
            value: ObjValue::Rt(Slot::Cell(cell)),
            typ,
            sim,
        }
    }

    pub fn temp(value: RtValue, typ: Type, sim: bool) -> Object {
        Object {
            value: ObjValue::Rt(Slot::Temp(value)),
            typ,
            sim,
        }
    }

    pub fn exact(value: Constant, typ: Type) -> Object {
        Object {
            value: ObjValue::Exact(value),
            typ,
            sim: false,
        }
    }

    pub fn untyped_nil() -> Object {
        Object {
            value: ObjValue::Nil,
            typ: Type::Basic(BasicKind::UntypedNil),
            sim: false,
        }
    }

    pub fn bool(value: bool) -> Object {
        Object::temp(RtValue::Bool(value), Type::Basic(BasicKind::Bool), false)
    }

    pub fn is_untyped_nil(&self) -> bool {
        matches!(self.value, ObjValue::Nil)
    }

    /// The reflective value of this object, materializing exact constants.
    pub fn rt_value(&self, registry: &Registry) -> RuntimeResult<RtValue> {
        match &self.value {
            ObjValue::Rt(Slot::Cell(cell)) => Ok(cell.get()),
            ObjValue::Rt(Slot::Temp(value)) => Ok(value.clone()),
            ObjValue::Exact(constant) => {
                let (rt, _) = registry.resolve_defaulted(&self.typ).ok_or_else(|| {
                    RuntimeError::panic(format!("unresolved type {}", self.typ))
                })?;
                Ok(materialize(constant, &rt))
            }
            ObjValue::Nil => Err(RuntimeError::panic("untyped nil used as a value")),
        }
    }

    /// The settable cell of this object; fails for temporaries.
    pub fn expect_cell(&self) -> RuntimeResult<Cell> {
        match &self.value {
            ObjValue::Rt(Slot::Cell(cell)) => Ok(cell.clone()),
            _ => Err(RuntimeError::panic("value is not assignable")),
        }
    }

    /// Gives an untyped object its default type, materializing the value.
    /// Typed objects pass through untouched.
    pub fn defaulted(self, registry: &Registry) -> RuntimeResult<Object> {
        if !self.typ.is_untyped() || self.is_untyped_nil() {
            return Ok(self);
        }
        let Type::Basic(kind) = &self.typ else {
            return Ok(self);
        };
        let default = Type::Basic(kind.default_kind());
        let value = self.rt_value(registry)?;
        Ok(Object::temp(value, default, false))
    }
}

/// Converts an exact constant to the host representation of the given type.
pub fn materialize(constant: &Constant, rt: &RtType) -> RtValue {
    match rt.repr() {
        RtType::Bool => RtValue::Bool(constant.as_bool()),
        RtType::Int | RtType::Int8 | RtType::Int16 | RtType::Int32 | RtType::Int64 => {
            RtValue::Int(constant.as_i128() as i64)
        }
        RtType::Uint
        | RtType::Uint8
        | RtType::Uint16
        | RtType::Uint32
        | RtType::Uint64
        | RtType::Uintptr => RtValue::Uint(constant.as_i128() as u64),
        RtType::Float32 => RtValue::Float(constant.as_f64() as f32 as f64),
        RtType::Float64 => RtValue::Float(constant.as_f64()),
        RtType::Complex64 | RtType::Complex128 => {
            let (re, im) = constant.as_complex();
            RtValue::Complex(re, im)
        }
        RtType::Str => RtValue::Str(constant.as_str().to_string()),
        RtType::Iface => {
            // Untyped constants assigned into interfaces take their
            // default representation; the checker retypes them first, so
            // reaching this is a constant of unexpected shape.
            RtValue::Iface(None)
        }
        _ => RtValue::Iface(None),
    }
}

/// The zero value of a host type.
pub fn zero_value(rt: &RtType) -> RtValue {
    match rt.repr() {
        RtType::Bool => RtValue::Bool(false),
        RtType::Int | RtType::Int8 | RtType::Int16 | RtType::Int32 | RtType::Int64 => {
            RtValue::Int(0)
        }
        RtType::Uint
        | RtType::Uint8
        | RtType::Uint16
        | RtType::Uint32
        | RtType::Uint64
        | RtType::Uintptr => RtValue::Uint(0),
        RtType::Float32 | RtType::Float64 => RtValue::Float(0.0),
        RtType::Complex64 | RtType::Complex128 => RtValue::Complex(0.0, 0.0),
        RtType::Str => RtValue::Str(String::new()),
        RtType::Unit => RtValue::Unit,
        RtType::Iface => RtValue::Iface(None),
        RtType::Struct(fields) => RtValue::Struct(StructValue {
            fields: Arc::new(fields.iter().map(|f| TypedCell::zeroed(f.clone())).collect()),
        }),
        RtType::Ptr(_) => RtValue::Ptr(None),
        RtType::Slice(_) => RtValue::Slice(None),
        RtType::Map(_, _) => RtValue::Map(None),
        RtType::Chan(_, _) => RtValue::Chan(None),
        RtType::Func(_) => RtValue::Func(None),
        RtType::SimFunc => RtValue::SimFunc(None),
        RtType::Named(_) => unreachable!("repr resolves named types"),
    }
}

/// A copy of a value suitable for storing into a new location. Structs have
/// value semantics, so their field cells are duplicated; everything else
/// shares or copies naturally through Clone.
pub fn copy_for_assign(value: &RtValue) -> RtValue {
    match value {
        RtValue::Struct(sv) => RtValue::Struct(StructValue {
            fields: Arc::new(
                sv.fields
                    .iter()
                    .map(|cell| TypedCell::new(cell.typ.clone(), copy_for_assign(&cell.get())))
                    .collect(),
            ),
        }),
        other => other.clone(),
    }
}

/// Produces the value to store into a destination of host type `dst` from
/// the given object, applying the nil-to-zero rule and interface wrapping.
pub fn value_for_type(src: &Object, dst: &RtType, registry: &Registry) -> RuntimeResult<RtValue> {
    if src.is_untyped_nil() {
        return Ok(zero_value(dst));
    }
    let value = src.rt_value(registry)?;
    if matches!(dst.repr(), RtType::Iface) && !matches!(value, RtValue::Iface(_)) {
        let (src_rt, _) = registry
            .resolve_defaulted(&src.typ)
            .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", src.typ)))?;
        return Ok(RtValue::Iface(Some(Box::new(IfaceValue {
            typ: src_rt,
            value: copy_for_assign(&value),
        }))));
    }
    Ok(copy_for_assign(&value))
}

/// Assigns the value of `src` into the settable cell of `dst`.
pub fn assign_object(dst: &Object, src: &Object, registry: &Registry) -> RuntimeResult<()> {
    let cell = dst.expect_cell()?;
    let value = value_for_type(src, &cell.typ, registry)?;
    cell.set(value);
    Ok(())
}

/// Converts a runtime value between host representations; the conversion
/// was vetted by the checker, so unexpected shapes are internal errors.
/// Interface destinations are handled by `value_for_type`, which knows the
/// source's dynamic type.
pub fn convert_rt(value: RtValue, to: &RtType) -> RuntimeResult<RtValue> {
    let target = to.repr();
    match (&value, target) {
        // Numeric conversions dispatch on the target width.
        (RtValue::Int(_) | RtValue::Uint(_) | RtValue::Float(_), _) if is_numeric(target) => {
            Ok(convert_numeric(&value, target))
        }
        (RtValue::Complex(re, im), RtType::Complex64) => {
            Ok(RtValue::Complex(*re as f32 as f64, *im as f32 as f64))
        }
        (RtValue::Complex(re, im), RtType::Complex128) => Ok(RtValue::Complex(*re, *im)),
        // An integer converts to the string holding that code point.
        (RtValue::Int(v), RtType::Str) => {
            let ch = char::from_u32(*v as u32).unwrap_or('\u{FFFD}');
            Ok(RtValue::Str(ch.to_string()))
        }
        (RtValue::Uint(v), RtType::Str) => {
            let ch = char::from_u32(*v as u32).unwrap_or('\u{FFFD}');
            Ok(RtValue::Str(ch.to_string()))
        }
        (RtValue::Str(s), RtType::Str) => Ok(RtValue::Str(s.clone())),
        (RtValue::Str(s), RtType::Slice(elem)) => {
            let cells: Vec<Cell> = match elem.repr() {
                RtType::Uint8 => s
                    .bytes()
                    .map(|b| TypedCell::new(RtType::Uint8, RtValue::Uint(b as u64)))
                    .collect(),
                RtType::Int32 => s
                    .chars()
                    .map(|c| TypedCell::new(RtType::Int32, RtValue::Int(c as i64)))
                    .collect(),
                other => {
                    return Err(RuntimeError::panic(format!(
                        "cannot convert string to []{}",
                        other
                    )));
                }
            };
            Ok(RtValue::Slice(Some(SliceValue {
                elems: Arc::new(cells),
            })))
        }
        (RtValue::Slice(slice), RtType::Str) => {
            let Some(slice) = slice else {
                return Ok(RtValue::Str(String::new()));
            };
            let mut out = String::new();
            for cell in slice.elems.iter() {
                match cell.get() {
                    RtValue::Uint(b) => out.push(b as u8 as char),
                    RtValue::Int(r) => out.push(char::from_u32(r as u32).unwrap_or('\u{FFFD}')),
                    other => {
                        return Err(RuntimeError::panic(format!(
                            "cannot convert slice of {:?} to string",
                            other
                        )));
                    }
                }
            }
            Ok(RtValue::Str(out))
        }
        // Conversions between a named type and its underlying type (or
        // between identically structured types) keep the representation.
        _ => Ok(value),
    }
}

fn is_numeric(rt: &RtType) -> bool {
    matches!(
        rt,
        RtType::Int
            | RtType::Int8
            | RtType::Int16
            | RtType::Int32
            | RtType::Int64
            | RtType::Uint
            | RtType::Uint8
            | RtType::Uint16
            | RtType::Uint32
            | RtType::Uint64
            | RtType::Uintptr
            | RtType::Float32
            | RtType::Float64
            | RtType::Complex64
            | RtType::Complex128
    )
}

fn convert_numeric(value: &RtValue, to: &RtType) -> RtValue {
    let as_f64 = match value {
        RtValue::Int(v) => *v as f64,
        RtValue::Uint(v) => *v as f64,
        RtValue::Float(v) => *v,
        _ => 0.0,
    };
    let as_i64 = match value {
        RtValue::Int(v) => *v,
        RtValue::Uint(v) => *v as i64,
        RtValue::Float(v) => *v as i64,
        _ => 0,
    };
    match to {
        RtType::Int | RtType::Int64 => RtValue::Int(as_i64),
        RtType::Int8 => RtValue::Int(as_i64 as i8 as i64),
        RtType::Int16 => RtValue::Int(as_i64 as i16 as i64),
        RtType::Int32 => RtValue::Int(as_i64 as i32 as i64),
        RtType::Uint | RtType::Uint64 | RtType::Uintptr => RtValue::Uint(as_i64 as u64),
        RtType::Uint8 => RtValue::Uint(as_i64 as u8 as u64),
        RtType::Uint16 => RtValue::Uint(as_i64 as u16 as u64),
        RtType::Uint32 => RtValue::Uint(as_i64 as u32 as u64),
        RtType::Float32 => RtValue::Float(as_f64 as f32 as f64),
        RtType::Float64 => RtValue::Float(as_f64),
        RtType::Complex64 => RtValue::Complex(as_f64 as f32 as f64, 0.0),
        RtType::Complex128 => RtValue::Complex(as_f64, 0.0),
        _ => value.clone(),
    }
}

/// Builds a map key from a runtime value; fails for types without a
/// hashable host representation.
pub fn map_key(value: &RtValue) -> RuntimeResult<MapKey> {
    match value {
        RtValue::Bool(b) => Ok(MapKey::Bool(*b)),
        RtValue::Int(v) => Ok(MapKey::Int(*v)),
        RtValue::Uint(v) => Ok(MapKey::Uint(*v)),
        RtValue::Float(v) => Ok(MapKey::Float(v.to_bits())),
        RtValue::Str(s) => Ok(MapKey::Str(s.clone())),
        RtValue::Iface(Some(inner)) => map_key(&inner.value),
        other => Err(RuntimeError::panic(format!(
            "invalid map key {}",
            format_value(other)
        ))),
    }
}

/// Renders a runtime value the way the host formatted-print does.
pub fn format_value(value: &RtValue) -> String {
    match value {
        RtValue::Bool(b) => b.to_string(),
        RtValue::Int(v) => v.to_string(),
        RtValue::Uint(v) => v.to_string(),
        RtValue::Float(v) => format_float(*v),
        RtValue::Complex(re, im) => {
            if *im < 0.0 {
                format!("({}{}i)", format_float(*re), format_float(*im))
            } else {
                format!("({}+{}i)", format_float(*re), format_float(*im))
            }
        }
        RtValue::Str(s) => s.clone(),
        RtValue::Unit => "{}".to_string(),
        RtValue::Struct(sv) => {
            let fields: Vec<String> = sv
                .fields
                .iter()
                .map(|cell| format_value(&cell.get()))
                .collect();
            format!("{{{}}}", fields.join(" "))
        }
        RtValue::Iface(None) => "<nil>".to_string(),
        RtValue::Iface(Some(inner)) => format_value(&inner.value),
        RtValue::Ptr(None) => "<nil>".to_string(),
        RtValue::Ptr(Some(cell)) => format!("0x{:x}", Arc::as_ptr(cell) as usize),
        RtValue::Slice(None) => "[]".to_string(),
        RtValue::Slice(Some(slice)) => {
            let elems: Vec<String> = slice
                .elems
                .iter()
                .map(|cell| format_value(&cell.get()))
                .collect();
            format!("[{}]", elems.join(" "))
        }
        RtValue::Map(None) => "map[]".to_string(),
        RtValue::Map(Some(map)) => {
            let entries = map.entries.lock().expect("map lock");
            let mut rendered: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}:{}", format_map_key(k), format_value(v)))
                .collect();
            rendered.sort();
            format!("map[{}]", rendered.join(" "))
        }
        RtValue::Chan(None) | RtValue::Func(None) | RtValue::SimFunc(None) => "<nil>".to_string(),
        RtValue::Chan(Some(ch)) => format!("{:?}", ch),
        RtValue::Func(Some(hf)) => format!("0x{:x}", Arc::as_ptr(&hf.func) as *const () as usize),
        RtValue::SimFunc(Some(sf)) => {
            format!("0x{:x}", Arc::as_ptr(&sf.func) as *const () as usize)
        }
    }
}

fn format_map_key(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::Int(v) => v.to_string(),
        MapKey::Uint(v) => v.to_string(),
        MapKey::Float(bits) => format_float(f64::from_bits(*bits)),
        MapKey::Str(s) => s.clone(),
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e21 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Renders an object for the `=> type: value` echo at the top level.
pub fn format_object(obj: &Object, registry: &Registry) -> String {
    match &obj.value {
        ObjValue::Nil => "<nil>".to_string(),
        ObjValue::Exact(constant) => constant.to_string(),
        ObjValue::Rt(_) => match obj.rt_value(registry) {
            Ok(value) => format_value(&value),
            Err(_) => "<invalid>".to_string(),
        },
    }
}

/// Equality following the host rules: scalars by value, pointers and
/// channels by identity, interfaces by dynamic type then value, structs
/// field-wise.
pub fn values_equal(a: &RtValue, b: &RtValue) -> RuntimeResult<bool> {
    match (a, b) {
        (RtValue::Bool(x), RtValue::Bool(y)) => Ok(x == y),
        (RtValue::Int(x), RtValue::Int(y)) => Ok(x == y),
        (RtValue::Uint(x), RtValue::Uint(y)) => Ok(x == y),
        (RtValue::Float(x), RtValue::Float(y)) => Ok(x == y),
        (RtValue::Complex(xr, xi), RtValue::Complex(yr, yi)) => Ok(xr == yr && xi == yi),
        (RtValue::Str(x), RtValue::Str(y)) => Ok(x == y),
        (RtValue::Unit, RtValue::Unit) => Ok(true),
        (RtValue::Ptr(x), RtValue::Ptr(y)) => Ok(match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }),
        (RtValue::Chan(x), RtValue::Chan(y)) => Ok(match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => x.same_channel(y),
            _ => false,
        }),
        (RtValue::Iface(x), RtValue::Iface(y)) => match (x, y) {
            (None, None) => Ok(true),
            (Some(x), Some(y)) => {
                if x.typ != y.typ {
                    return Ok(false);
                }
                values_equal(&x.value, &y.value)
            }
            _ => Ok(false),
        },
        (RtValue::Iface(x), other) => match x {
            None => Ok(other.is_nil()),
            Some(x) => values_equal(&x.value, other),
        },
        (other, RtValue::Iface(y)) => match y {
            None => Ok(other.is_nil()),
            Some(y) => values_equal(other, &y.value),
        },
        (RtValue::Struct(x), RtValue::Struct(y)) => {
            if x.fields.len() != y.fields.len() {
                return Ok(false);
            }
            for (fx, fy) in x.fields.iter().zip(y.fields.iter()) {
                if !values_equal(&fx.get(), &fy.get())? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (RtValue::Func(x), RtValue::Func(y)) => match (x, y) {
            (None, None) => Ok(true),
            _ => Err(RuntimeError::panic("function values are not comparable")),
        },
        (RtValue::SimFunc(x), RtValue::SimFunc(y)) => match (x, y) {
            (None, None) => Ok(true),
            _ => Err(RuntimeError::panic("function values are not comparable")),
        },
        (RtValue::Slice(None), RtValue::Slice(None)) => Ok(true),
        (RtValue::Slice(_), RtValue::Slice(_)) => {
            Err(RuntimeError::panic("slice values are not comparable"))
        }
        (RtValue::Map(None), RtValue::Map(None)) => Ok(true),
        (RtValue::Map(_), RtValue::Map(_)) => {
            Err(RuntimeError::panic("map values are not comparable"))
        }
        _ => Err(RuntimeError::panic("mismatched operands to comparison")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_alias_through_object_clones() {
        let cell = TypedCell::new(RtType::Int, RtValue::Int(1));
        let a = Object::cell(cell.clone(), Type::Basic(BasicKind::Int), false);
        let b = a.clone();
        cell.set(RtValue::Int(9));
        let registry = Registry::new();
        assert!(matches!(b.rt_value(&registry).unwrap(), RtValue::Int(9)));
    }

    #[test]
    fn materializes_untyped_constants_by_default_rules() {
        let registry = Registry::new();
        let obj = Object::exact(Constant::Int(14), Type::Basic(BasicKind::UntypedInt));
        assert!(matches!(obj.rt_value(&registry).unwrap(), RtValue::Int(14)));

        let obj = Object::exact(Constant::Float(2.5), Type::Basic(BasicKind::UntypedFloat));
        assert!(matches!(
            obj.rt_value(&registry).unwrap(),
            RtValue::Float(v) if v == 2.5
        ));
    }

    #[test]
    fn assigning_into_interface_wraps_dynamic_type() {
        let registry = Registry::new();
        let cell = TypedCell::zeroed(RtType::Iface);
        let dst = Object::cell(cell.clone(), Type::Interface, false);
        let src = Object::temp(RtValue::Int(5), Type::Basic(BasicKind::Int), false);
        assign_object(&dst, &src, &registry).unwrap();
        match cell.get() {
            RtValue::Iface(Some(inner)) => {
                assert_eq!(inner.typ, RtType::Int);
                assert!(matches!(inner.value, RtValue::Int(5)));
            }
            other => panic!("expected wrapped interface value, got {:?}", other),
        }
    }

    #[test]
    fn struct_assignment_copies_fields() {
        let registry = Registry::new();
        let st = RtType::Struct(Arc::new(vec![RtType::Int]));
        let src_cell = TypedCell::zeroed(st.clone());
        let dst_cell = TypedCell::zeroed(st.clone());
        let src = Object::cell(
            src_cell.clone(),
            Type::Struct(Arc::new(crate::language::types::StructType {
                fields: vec![crate::language::types::StructField {
                    name: "a".into(),
                    typ: Type::Basic(BasicKind::Int),
                }],
            })),
            false,
        );
        let dst = Object::cell(dst_cell.clone(), src.typ.clone(), false);
        assign_object(&dst, &src, &registry).unwrap();

        // Mutating the source's field must not affect the copy.
        if let RtValue::Struct(sv) = src_cell.get() {
            sv.fields[0].set(RtValue::Int(9));
        }
        if let RtValue::Struct(sv) = dst_cell.get() {
            assert!(matches!(sv.fields[0].get(), RtValue::Int(0)));
        } else {
            panic!("expected struct value");
        }
    }

    #[test]
    fn nil_assignment_zeroes_destination() {
        let registry = Registry::new();
        let cell = TypedCell::new(
            RtType::Ptr(Arc::new(RtType::Int)),
            RtValue::Ptr(Some(TypedCell::zeroed(RtType::Int))),
        );
        let dst = Object::cell(
            cell.clone(),
            Type::pointer(Type::Basic(BasicKind::Int)),
            false,
        );
        assign_object(&dst, &Object::untyped_nil(), &registry).unwrap();
        assert!(matches!(cell.get(), RtValue::Ptr(None)));
    }

    #[test]
    fn string_conversion_round_trips_bytes() {
        let rt = RtType::Slice(Arc::new(RtType::Uint8));
        let bytes = convert_rt(RtValue::Str("hi".into()), &rt).unwrap();
        let back = convert_rt(bytes, &RtType::Str).unwrap();
        assert!(matches!(back, RtValue::Str(s) if s == "hi"));
    }

    #[test]
    fn formats_values_like_the_host_printer() {
        assert_eq!(format_value(&RtValue::Int(14)), "14");
        assert_eq!(format_value(&RtValue::Float(2.0)), "2");
        assert_eq!(format_value(&RtValue::Float(2.5)), "2.5");
        assert_eq!(format_value(&RtValue::Ptr(None)), "<nil>");
        assert_eq!(format_value(&RtValue::Complex(1.0, 2.0)), "(1+2i)");
    }
}
