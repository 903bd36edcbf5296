use std::fmt;
use std::sync::Arc;

/// The scalar kinds of the language, plus the untyped constant kinds the
/// checker assigns to constant expressions before they are materialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicKind {
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
    String,

    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedComplex
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
        )
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat
        )
    }

    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            BasicKind::Complex64 | BasicKind::Complex128 | BasicKind::UntypedComplex
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    pub fn is_ordered(&self) -> bool {
        self.is_integer() || self.is_float() || self.is_string()
    }

    /// The default typed kind an untyped constant assumes when it must
    /// become a value.
    pub fn default_kind(&self) -> BasicKind {
        match self {
            BasicKind::UntypedBool => BasicKind::Bool,
            BasicKind::UntypedInt => BasicKind::Int,
            BasicKind::UntypedRune => BasicKind::Int32,
            BasicKind::UntypedFloat => BasicKind::Float64,
            BasicKind::UntypedComplex => BasicKind::Complex128,
            BasicKind::UntypedString => BasicKind::String,
            other => *other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::String => "string",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedComplex => "untyped complex",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    SendOnly,
    RecvOnly,
}

impl ChanDir {
    pub fn can_send(&self) -> bool {
        matches!(self, ChanDir::Both | ChanDir::SendOnly)
    }

    pub fn can_recv(&self) -> bool {
        matches!(self, ChanDir::Both | ChanDir::RecvOnly)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamedType {
    pub package: Option<String>,
    pub name: String,
    pub underlying: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Type>,
    pub variadic: bool,
    pub results: Vec<Type>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub typ: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructType {
    pub fields: Vec<StructField>,
}

/// The static type of an expression as the checker sees it. Equality is
/// structural, which doubles as the identity relation the registry keys on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Basic(BasicKind),
    Named(Arc<NamedType>),
    Pointer(Arc<Type>),
    Slice(Arc<Type>),
    Array(u64, Arc<Type>),
    Map(Arc<Type>, Arc<Type>),
    Chan(ChanDir, Arc<Type>),
    Func(Arc<Signature>),
    Interface,
    Struct(Arc<StructType>),
    /// Multi-valued expressions only; never the type of a variable.
    Tuple(Arc<Vec<Type>>),
}

impl Type {
    pub fn pointer(elem: Type) -> Type {
        Type::Pointer(Arc::new(elem))
    }

    pub fn slice(elem: Type) -> Type {
        Type::Slice(Arc::new(elem))
    }

    pub fn map_of(key: Type, value: Type) -> Type {
        Type::Map(Arc::new(key), Arc::new(value))
    }

    pub fn chan(dir: ChanDir, elem: Type) -> Type {
        Type::Chan(dir, Arc::new(elem))
    }

    pub fn func(params: Vec<Type>, variadic: bool, results: Vec<Type>) -> Type {
        Type::Func(Arc::new(Signature {
            params,
            variadic,
            results,
        }))
    }

    pub fn tuple(types: Vec<Type>) -> Type {
        Type::Tuple(Arc::new(types))
    }

    /// Resolves through named types to the structural type beneath.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Named(named) => named.underlying.underlying(),
            other => other,
        }
    }

    pub fn basic_kind(&self) -> Option<BasicKind> {
        match self.underlying() {
            Type::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Basic(kind) if kind.is_untyped())
    }

    pub fn is_typed(&self) -> bool {
        !self.is_untyped()
    }

    pub fn is_untyped_nil(&self) -> bool {
        matches!(self, Type::Basic(BasicKind::UntypedNil))
    }

    pub fn is_boolean(&self) -> bool {
        self.basic_kind().is_some_and(|k| k.is_boolean())
    }

    /// Types whose zero value is nil, and which `nil` may be assigned to.
    pub fn is_nilable(&self) -> bool {
        matches!(
            self.underlying(),
            Type::Pointer(_)
                | Type::Slice(_)
                | Type::Map(_, _)
                | Type::Chan(_, _)
                | Type::Func(_)
                | Type::Interface
        )
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.underlying(), Type::Interface)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(kind) => write!(f, "{}", kind.name()),
            Type::Named(named) => match &named.package {
                Some(pkg) => write!(f, "{}.{}", pkg, named.name),
                None => write!(f, "{}", named.name),
            },
            Type::Pointer(elem) => write!(f, "*{}", elem),
            Type::Slice(elem) => write!(f, "[]{}", elem),
            Type::Array(len, elem) => write!(f, "[{}]{}", len, elem),
            Type::Map(key, value) => write!(f, "map[{}]{}", key, value),
            Type::Chan(dir, elem) => match dir {
                ChanDir::Both => write!(f, "chan {}", elem),
                ChanDir::SendOnly => write!(f, "chan<- {}", elem),
                ChanDir::RecvOnly => write!(f, "<-chan {}", elem),
            },
            Type::Func(sig) => {
                write!(f, "func(")?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if sig.variadic && i == sig.params.len() - 1 {
                        let elem = match param.underlying() {
                            Type::Slice(elem) => elem.as_ref().clone(),
                            other => other.clone(),
                        };
                        write!(f, "...{}", elem)?;
                    } else {
                        write!(f, "{}", param)?;
                    }
                }
                write!(f, ")")?;
                match sig.results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", sig.results[0]),
                    _ => {
                        write!(f, " (")?;
                        for (i, res) in sig.results.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", res)?;
                        }
                        write!(f, ")")
                    }
                }
            }
            Type::Interface => write!(f, "interface{{}}"),
            Type::Struct(st) => {
                write!(f, "struct{{")?;
                for (i, field) in st.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", field.name, field.typ)?;
                }
                write!(f, "}}")
            }
            Type::Tuple(types) => {
                write!(f, "(")?;
                for (i, typ) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", typ)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_compound_types_in_source_syntax() {
        let chan_int = Type::chan(ChanDir::Both, Type::Basic(BasicKind::Int));
        assert_eq!(chan_int.to_string(), "chan int");

        let m = Type::map_of(Type::Basic(BasicKind::String), Type::Basic(BasicKind::Int));
        assert_eq!(m.to_string(), "map[string]int");

        let f = Type::func(
            vec![Type::Basic(BasicKind::Int)],
            false,
            vec![Type::Basic(BasicKind::Int), Type::Basic(BasicKind::Bool)],
        );
        assert_eq!(f.to_string(), "func(int) (int, bool)");

        let variadic = Type::func(vec![Type::slice(Type::Interface)], true, vec![]);
        assert_eq!(variadic.to_string(), "func(...interface{})");
    }

    #[test]
    fn untyped_kinds_default_correctly() {
        assert_eq!(BasicKind::UntypedInt.default_kind(), BasicKind::Int);
        assert_eq!(BasicKind::UntypedFloat.default_kind(), BasicKind::Float64);
        assert_eq!(BasicKind::UntypedRune.default_kind(), BasicKind::Int32);
        assert_eq!(
            BasicKind::UntypedComplex.default_kind(),
            BasicKind::Complex128
        );
    }
}
