//! The type registry: maps the checker's static types to the host value
//! domain's type handles, deriving compound handles on demand.

use crate::language::types::{BasicKind, ChanDir, StructType, Type};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtDir {
    Both,
    SendOnly,
    RecvOnly,
}

impl RtDir {
    fn from_static(dir: ChanDir) -> RtDir {
        match dir {
            ChanDir::Both => RtDir::Both,
            ChanDir::SendOnly => RtDir::SendOnly,
            ChanDir::RecvOnly => RtDir::RecvOnly,
        }
    }
}

/// Signature of a host-callable function, used to marshal arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostSig {
    pub params: Vec<RtType>,
    pub variadic: bool,
    pub results: Vec<RtType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RtNamed {
    pub name: String,
    pub underlying: RtType,
}

/// A host type handle. Identity (including named-ness and channel
/// direction) is structural equality on this representation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RtType {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Str,
    /// The canonical empty struct.
    Unit,
    /// The empty interface.
    Iface,
    Struct(Arc<Vec<RtType>>),
    Ptr(Arc<RtType>),
    Slice(Arc<RtType>),
    Chan(RtDir, Arc<RtType>),
    Map(Arc<RtType>, Arc<RtType>),
    Func(Arc<HostSig>),
    /// The single opaque type of all simulated callables.
    SimFunc,
    Named(Arc<RtNamed>),
}

impl RtType {
    /// Resolves through named types to the structural representation.
    pub fn repr(&self) -> &RtType {
        match self {
            RtType::Named(named) => named.underlying.repr(),
            other => other,
        }
    }
}

impl fmt::Display for RtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtType::Bool => write!(f, "bool"),
            RtType::Int => write!(f, "int"),
            RtType::Int8 => write!(f, "int8"),
            RtType::Int16 => write!(f, "int16"),
            RtType::Int32 => write!(f, "int32"),
            RtType::Int64 => write!(f, "int64"),
            RtType::Uint => write!(f, "uint"),
            RtType::Uint8 => write!(f, "uint8"),
            RtType::Uint16 => write!(f, "uint16"),
            RtType::Uint32 => write!(f, "uint32"),
            RtType::Uint64 => write!(f, "uint64"),
            RtType::Uintptr => write!(f, "uintptr"),
            RtType::Float32 => write!(f, "float32"),
            RtType::Float64 => write!(f, "float64"),
            RtType::Complex64 => write!(f, "complex64"),
            RtType::Complex128 => write!(f, "complex128"),
            RtType::Str => write!(f, "string"),
            RtType::Unit => write!(f, "struct{{}}"),
            RtType::Iface => write!(f, "interface{{}}"),
            RtType::Struct(_) => write!(f, "struct{{...}}"),
            RtType::Ptr(elem) => write!(f, "*{}", elem),
            RtType::Slice(elem) => write!(f, "[]{}", elem),
            RtType::Chan(dir, elem) => match dir {
                RtDir::Both => write!(f, "chan {}", elem),
                RtDir::SendOnly => write!(f, "chan<- {}", elem),
                RtDir::RecvOnly => write!(f, "<-chan {}", elem),
            },
            RtType::Map(key, value) => write!(f, "map[{}]{}", key, value),
            RtType::Func(_) => write!(f, "func"),
            RtType::SimFunc => write!(f, "func"),
            RtType::Named(named) => write!(f, "{}", named.name),
        }
    }
}

/// Maps static types to host type handles. Pre-populated with the scalar
/// types; the host bridge injects named types and concrete function
/// signatures before evaluation begins; compound types derive on demand.
pub struct Registry {
    map: Mutex<HashMap<Type, RtType>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let registry = Self {
            map: Mutex::new(HashMap::new()),
        };
        registry.populate_basics();
        registry
    }

    fn populate_basics(&self) {
        let basics: &[(BasicKind, RtType)] = &[
            (BasicKind::Bool, RtType::Bool),
            (BasicKind::Int, RtType::Int),
            (BasicKind::Int8, RtType::Int8),
            (BasicKind::Int16, RtType::Int16),
            (BasicKind::Int32, RtType::Int32),
            (BasicKind::Int64, RtType::Int64),
            (BasicKind::Uint, RtType::Uint),
            (BasicKind::Uint8, RtType::Uint8),
            (BasicKind::Uint16, RtType::Uint16),
            (BasicKind::Uint32, RtType::Uint32),
            (BasicKind::Uint64, RtType::Uint64),
            (BasicKind::Uintptr, RtType::Uintptr),
            (BasicKind::Float32, RtType::Float32),
            (BasicKind::Float64, RtType::Float64),
            (BasicKind::Complex64, RtType::Complex64),
            (BasicKind::Complex128, RtType::Complex128),
            (BasicKind::String, RtType::Str),
        ];
        let mut map = self.map.lock().expect("registry lock");
        for (kind, rt) in basics {
            map.insert(Type::Basic(*kind), rt.clone());
        }
        map.insert(
            Type::Struct(Arc::new(StructType { fields: Vec::new() })),
            RtType::Unit,
        );
        map.insert(Type::Interface, RtType::Iface);
    }

    /// Host-bridge injection of a named type or a concrete function
    /// signature. Must happen before evaluation begins.
    pub fn insert(&self, typ: Type, rt: RtType) {
        self.map.lock().expect("registry lock").insert(typ, rt);
    }

    /// Resolves a static type to its host type handle. The boolean is the
    /// simulated flag: true when the value is represented by the uniform
    /// simulated callable rather than a faithful host type.
    pub fn resolve(&self, typ: &Type) -> Option<(RtType, bool)> {
        if let Some(rt) = self.map.lock().expect("registry lock").get(typ) {
            return Some((rt.clone(), false));
        }
        match typ {
            // Any signature not injected by the bridge is simulated.
            Type::Func(_) => Some((RtType::SimFunc, true)),
            Type::Pointer(elem) => {
                let (elem_rt, _) = self.resolve(elem)?;
                let rt = RtType::Ptr(Arc::new(elem_rt));
                self.insert(typ.clone(), rt.clone());
                Some((rt, false))
            }
            Type::Slice(elem) => {
                let (elem_rt, _) = self.resolve(elem)?;
                let rt = RtType::Slice(Arc::new(elem_rt));
                self.insert(typ.clone(), rt.clone());
                Some((rt, false))
            }
            // Arrays have no faithful host representation; a slice stands in.
            Type::Array(_, elem) => {
                let (elem_rt, _) = self.resolve(elem)?;
                Some((RtType::Slice(Arc::new(elem_rt)), true))
            }
            Type::Chan(dir, elem) => {
                let (elem_rt, _) = self.resolve(elem)?;
                let rt = RtType::Chan(RtDir::from_static(*dir), Arc::new(elem_rt));
                self.insert(typ.clone(), rt.clone());
                Some((rt, false))
            }
            Type::Map(key, value) => {
                let (key_rt, _) = self.resolve(key)?;
                let (value_rt, _) = self.resolve(value)?;
                let rt = RtType::Map(Arc::new(key_rt), Arc::new(value_rt));
                self.insert(typ.clone(), rt.clone());
                Some((rt, false))
            }
            Type::Struct(st) => {
                let mut fields = Vec::with_capacity(st.fields.len());
                for field in &st.fields {
                    let (rt, _) = self.resolve(&field.typ)?;
                    fields.push(rt);
                }
                let rt = RtType::Struct(Arc::new(fields));
                self.insert(typ.clone(), rt.clone());
                Some((rt, false))
            }
            _ => None,
        }
    }

    /// Resolves an untyped constant type through its default typed kind.
    pub fn resolve_defaulted(&self, typ: &Type) -> Option<(RtType, bool)> {
        match typ {
            Type::Basic(kind) if kind.is_untyped() => {
                self.resolve(&Type::Basic(kind.default_kind()))
            }
            other => self.resolve(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::types::Signature;

    #[test]
    fn scalars_are_pre_populated() {
        let registry = Registry::new();
        let (rt, sim) = registry.resolve(&Type::Basic(BasicKind::Int)).unwrap();
        assert_eq!(rt, RtType::Int);
        assert!(!sim);
        let (rt, _) = registry.resolve(&Type::Interface).unwrap();
        assert_eq!(rt, RtType::Iface);
    }

    #[test]
    fn compound_types_derive_on_demand() {
        let registry = Registry::new();
        let chan = Type::chan(ChanDir::RecvOnly, Type::Basic(BasicKind::Int));
        let (rt, sim) = registry.resolve(&chan).unwrap();
        assert_eq!(rt, RtType::Chan(RtDir::RecvOnly, Arc::new(RtType::Int)));
        assert!(!sim);

        let m = Type::map_of(Type::Basic(BasicKind::String), Type::Basic(BasicKind::Int));
        let (rt, _) = registry.resolve(&m).unwrap();
        assert_eq!(
            rt,
            RtType::Map(Arc::new(RtType::Str), Arc::new(RtType::Int))
        );
    }

    #[test]
    fn unregistered_signatures_are_simulated() {
        let registry = Registry::new();
        let sig = Type::func(
            vec![Type::Basic(BasicKind::Int)],
            false,
            vec![Type::Basic(BasicKind::Int)],
        );
        let (rt, sim) = registry.resolve(&sig).unwrap();
        assert_eq!(rt, RtType::SimFunc);
        assert!(sim);
    }

    #[test]
    fn injected_signatures_are_concrete() {
        let registry = Registry::new();
        let sig = Type::func(vec![Type::Basic(BasicKind::Float64)], false, vec![]);
        let host = RtType::Func(Arc::new(HostSig {
            params: vec![RtType::Float64],
            variadic: false,
            results: vec![],
        }));
        registry.insert(sig.clone(), host.clone());
        let (rt, sim) = registry.resolve(&sig).unwrap();
        assert_eq!(rt, host);
        assert!(!sim);
    }

    #[test]
    fn resolve_caches_derivations() {
        let registry = Registry::new();
        let ptr = Type::pointer(Type::Basic(BasicKind::Int));
        let first = registry.resolve(&ptr).unwrap();
        let second = registry.resolve(&ptr).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn signature_equality_drives_identity() {
        let a = Signature {
            params: vec![Type::Basic(BasicKind::Int)],
            variadic: false,
            results: vec![],
        };
        let b = a.clone();
        assert_eq!(Type::Func(Arc::new(a)), Type::Func(Arc::new(b)));
    }
}
