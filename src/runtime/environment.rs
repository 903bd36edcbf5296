//! Lexically nested frames binding names to objects, with the
//! interpreter-wide shared state every frame points back to.

use crate::language::typecheck::TypeInfo;
use crate::language::types::Type;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::{value_for_type, Object, TypedCell};
use crate::runtime::registry::Registry;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, RwLock};

/// Where the interpreter's output goes. Shared by the top-level echo, the
/// print builtins, and the bridged formatted-print functions; injectable so
/// scripted sessions can capture output.
#[derive(Clone)]
pub struct OutputSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    pub fn stdout() -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(io::stdout()))),
        }
    }

    /// A sink writing into a shared buffer, for tests and scripted runs.
    pub fn buffer() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            writer: Arc::new(Mutex::new(Box::new(SharedBuf(buf.clone())))),
        };
        (sink, buf)
    }

    pub fn write_str(&self, s: &str) {
        let mut writer = self.writer.lock().expect("output lock");
        let _ = writer.write_all(s.as_bytes());
        let _ = writer.flush();
    }
}

struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A bridged package: a local name and its export table.
pub struct HostPackage {
    pub name: String,
    pub objs: HashMap<String, Object>,
}

impl HostPackage {
    pub fn lookup(&self, name: &str) -> Option<Object> {
        self.objs.get(name).cloned()
    }
}

/// Interpreter-wide state shared by every frame and every spawned task:
/// the type registry, the bridged package table, and the output sink.
pub struct InterpShared {
    pub registry: Registry,
    pub pkgs: HashMap<String, Arc<HostPackage>>,
    pub out: OutputSink,
}

/// One lexical frame: bindings, insertion order for the declaration dump,
/// a parent link, and the typing info in effect when it was created.
pub struct Frame {
    pub interp: Arc<InterpShared>,
    info: RwLock<Arc<TypeInfo>>,
    pub parent: Option<Arc<Frame>>,
    objs: Mutex<HashMap<String, Object>>,
    names: Mutex<Vec<String>>,
}

impl Frame {
    pub fn root(interp: Arc<InterpShared>, info: Arc<TypeInfo>) -> Arc<Frame> {
        Arc::new(Frame {
            interp,
            info: RwLock::new(info),
            parent: None,
            objs: Mutex::new(HashMap::new()),
            names: Mutex::new(Vec::new()),
        })
    }

    /// A nested frame for a block, loop clause, if clause, or select case.
    pub fn child(self: &Arc<Frame>) -> Arc<Frame> {
        Arc::new(Frame {
            interp: self.interp.clone(),
            info: RwLock::new(self.info()),
            parent: Some(self.clone()),
            objs: Mutex::new(HashMap::new()),
            names: Mutex::new(Vec::new()),
        })
    }

    /// A frame with an explicit parent, used for closure environments.
    pub fn with_parent(
        interp: Arc<InterpShared>,
        info: Arc<TypeInfo>,
        parent: Option<Arc<Frame>>,
    ) -> Arc<Frame> {
        Arc::new(Frame {
            interp,
            info: RwLock::new(info),
            parent,
            objs: Mutex::new(HashMap::new()),
            names: Mutex::new(Vec::new()),
        })
    }

    pub fn info(&self) -> Arc<TypeInfo> {
        self.info.read().expect("info lock").clone()
    }

    /// Swaps in the typing info of a new turn. Only the root frame changes
    /// info over its lifetime.
    pub fn set_info(&self, info: Arc<TypeInfo>) {
        *self.info.write().expect("info lock") = info;
    }

    pub fn registry(&self) -> &Registry {
        &self.interp.registry
    }

    pub fn lookup_local(&self, name: &str) -> Option<Object> {
        self.objs.lock().expect("frame lock").get(name).cloned()
    }

    pub fn lookup(&self, name: &str) -> Option<Object> {
        if let Some(obj) = self.lookup_local(name) {
            return Some(obj);
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Installs a binding, tracking first-seen names in insertion order.
    pub fn insert(&self, name: &str, obj: Object) {
        let mut objs = self.objs.lock().expect("frame lock");
        if !objs.contains_key(name) {
            self.names.lock().expect("names lock").push(name.to_string());
        }
        objs.insert(name.to_string(), obj);
    }

    /// Creates a fresh settable cell for a variable of the given static
    /// type and writes the initial object into it (zero for untyped nil).
    pub fn declare(&self, name: &str, typ: &Type, initial: &Object) -> RuntimeResult<Object> {
        let registry = self.registry();
        let (rt, sim) = registry
            .resolve(typ)
            .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", typ)))?;
        let value = value_for_type(initial, &rt, registry)?;
        let cell = TypedCell::new(rt, value);
        let obj = Object::cell(cell, typ.clone(), sim);
        self.insert(name, obj.clone());
        Ok(obj)
    }

    /// Renders the frame's bindings as variable declarations suitable for
    /// splicing into the synthetic source of the next turn.
    pub fn dump_decls(&self) -> (String, usize) {
        let names = self.names.lock().expect("names lock");
        let objs = self.objs.lock().expect("frame lock");
        let mut lines = Vec::new();
        for name in names.iter() {
            if let Some(obj) = objs.get(name) {
                lines.push(format!("var {} {}", name, obj.typ));
            }
        }
        if lines.is_empty() {
            (String::new(), 0)
        } else {
            let count = lines.len();
            (format!("{};", lines.join(";")), count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::types::BasicKind;
    use crate::runtime::object::RtValue;

    fn test_interp() -> Arc<InterpShared> {
        Arc::new(InterpShared {
            registry: Registry::new(),
            pkgs: HashMap::new(),
            out: OutputSink::buffer().0,
        })
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let interp = test_interp();
        let root = Frame::root(interp, Arc::new(TypeInfo::default()));
        root.declare(
            "x",
            &Type::Basic(BasicKind::Int),
            &Object::exact(
                crate::language::constant::Constant::Int(3),
                Type::Basic(BasicKind::UntypedInt),
            ),
        )
        .unwrap();
        let child = root.child();
        let obj = child.lookup("x").expect("x visible from child");
        assert!(matches!(
            obj.rt_value(child.registry()).unwrap(),
            RtValue::Int(3)
        ));
        assert!(child.lookup("y").is_none());
    }

    #[test]
    fn shadowing_rebinds_without_touching_parent() {
        let interp = test_interp();
        let root = Frame::root(interp, Arc::new(TypeInfo::default()));
        let nil = Object::untyped_nil();
        root.declare("x", &Type::Basic(BasicKind::Int), &nil).unwrap();
        let child = root.child();
        child.declare("x", &Type::Basic(BasicKind::String), &nil).unwrap();
        assert_eq!(child.lookup("x").unwrap().typ.to_string(), "string");
        assert_eq!(root.lookup("x").unwrap().typ.to_string(), "int");
    }

    #[test]
    fn dump_renders_declarations_in_insertion_order() {
        let interp = test_interp();
        let root = Frame::root(interp, Arc::new(TypeInfo::default()));
        let nil = Object::untyped_nil();
        root.declare("x", &Type::Basic(BasicKind::Int), &nil).unwrap();
        root.declare(
            "f",
            &Type::func(
                vec![Type::Basic(BasicKind::Int)],
                false,
                vec![Type::Basic(BasicKind::Int)],
            ),
            &nil,
        )
        .unwrap();
        let (dump, count) = root.dump_decls();
        assert_eq!(dump, "var x int;var f func(int) int;");
        assert_eq!(count, 2);
    }

    #[test]
    fn redeclaring_a_name_keeps_one_dump_entry() {
        let interp = test_interp();
        let root = Frame::root(interp, Arc::new(TypeInfo::default()));
        let nil = Object::untyped_nil();
        root.declare("x", &Type::Basic(BasicKind::Int), &nil).unwrap();
        root.declare("x", &Type::Basic(BasicKind::String), &nil).unwrap();
        let (dump, count) = root.dump_decls();
        assert_eq!(dump, "var x string;");
        assert_eq!(count, 1);
    }
}
