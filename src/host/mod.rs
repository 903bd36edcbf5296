//! The host bridge: the bridged packages interpreted code can call into,
//! plus the registry injections that make their signatures concrete
//! (non-simulated) host function types.

pub mod fmt;
pub mod math;
pub mod strings;

use crate::language::typecheck::PackageInfo;
use crate::language::types::{Signature, Type};
use crate::runtime::environment::{HostPackage, OutputSink};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::{HostFn, Object, RtValue};
use crate::runtime::registry::{HostSig, Registry, RtType};
use std::collections::HashMap;
use std::sync::Arc;

pub struct BridgedPackages {
    pub runtime: HashMap<String, Arc<HostPackage>>,
    pub checker: HashMap<String, PackageInfo>,
}

/// Builds every bridged package and injects their function signatures into
/// the registry. Runs once, single-threaded, before the session starts.
pub fn install(registry: &Registry, out: &OutputSink) -> BridgedPackages {
    let mut runtime = HashMap::new();
    let mut checker = HashMap::new();
    for builder in [
        fmt::package(registry, out),
        strings::package(registry),
        math::package(registry),
    ] {
        let (pkg, info) = builder.finish();
        runtime.insert(pkg.name.clone(), pkg);
        checker.insert(info.name.clone(), info);
    }
    BridgedPackages { runtime, checker }
}

pub(crate) struct PackageBuilder {
    name: String,
    objs: HashMap<String, Object>,
    exports: HashMap<String, Type>,
}

impl PackageBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            objs: HashMap::new(),
            exports: HashMap::new(),
        }
    }

    /// Registers an exported function: its checker-side signature, the
    /// concrete host signature injected into the registry, and the native
    /// implementation.
    pub(crate) fn func<F>(
        &mut self,
        registry: &Registry,
        name: &str,
        params: Vec<Type>,
        variadic: bool,
        results: Vec<Type>,
        f: F,
    ) where
        F: Fn(Vec<RtValue>) -> RuntimeResult<Vec<RtValue>> + Send + Sync + 'static,
    {
        let typ = Type::Func(Arc::new(Signature {
            params: params.clone(),
            variadic,
            results: results.clone(),
        }));
        let resolve = |t: &Type| {
            registry
                .resolve(t)
                .map(|(rt, _)| rt)
                .expect("bridged signature resolves")
        };
        let host_sig = Arc::new(HostSig {
            params: params.iter().map(resolve).collect(),
            variadic,
            results: results.iter().map(resolve).collect(),
        });
        registry.insert(typ.clone(), RtType::Func(host_sig.clone()));
        let obj = Object::temp(
            RtValue::Func(Some(HostFn {
                sig: host_sig,
                func: Arc::new(f),
            })),
            typ.clone(),
            false,
        );
        self.objs.insert(name.to_string(), obj);
        self.exports.insert(name.to_string(), typ);
    }

    /// Registers an exported floating-point constant.
    pub(crate) fn float_const(&mut self, name: &str, value: f64) {
        let typ = Type::Basic(crate::language::types::BasicKind::Float64);
        self.objs.insert(
            name.to_string(),
            Object::temp(RtValue::Float(value), typ.clone(), false),
        );
        self.exports.insert(name.to_string(), typ);
    }

    pub(crate) fn finish(self) -> (Arc<HostPackage>, PackageInfo) {
        (
            Arc::new(HostPackage {
                name: self.name.clone(),
                objs: self.objs,
            }),
            PackageInfo {
                name: self.name,
                exports: self.exports,
            },
        )
    }
}

// ---- argument accessors shared by the bridged implementations ----

pub(crate) fn arg_str(args: &[RtValue], i: usize) -> RuntimeResult<String> {
    match unwrap_iface(args.get(i)) {
        Some(RtValue::Str(s)) => Ok(s.clone()),
        other => Err(RuntimeError::panic(format!(
            "expected string argument, found {:?}",
            other
        ))),
    }
}

pub(crate) fn arg_f64(args: &[RtValue], i: usize) -> RuntimeResult<f64> {
    match unwrap_iface(args.get(i)) {
        Some(RtValue::Float(v)) => Ok(*v),
        Some(RtValue::Int(v)) => Ok(*v as f64),
        Some(RtValue::Uint(v)) => Ok(*v as f64),
        other => Err(RuntimeError::panic(format!(
            "expected numeric argument, found {:?}",
            other
        ))),
    }
}

pub(crate) fn arg_i64(args: &[RtValue], i: usize) -> RuntimeResult<i64> {
    match unwrap_iface(args.get(i)) {
        Some(RtValue::Int(v)) => Ok(*v),
        Some(RtValue::Uint(v)) => Ok(*v as i64),
        other => Err(RuntimeError::panic(format!(
            "expected integer argument, found {:?}",
            other
        ))),
    }
}

fn unwrap_iface(value: Option<&RtValue>) -> Option<&RtValue> {
    match value {
        Some(RtValue::Iface(Some(inner))) => Some(&inner.value),
        other => other,
    }
}
