//! The bridged `math` package.

use crate::host::{arg_f64, PackageBuilder};
use crate::language::types::{BasicKind, Type};
use crate::runtime::object::RtValue;
use crate::runtime::registry::Registry;

pub(crate) fn package(registry: &Registry) -> PackageBuilder {
    let mut pkg = PackageBuilder::new("math");
    let float = Type::Basic(BasicKind::Float64);

    let unary: &[(&str, fn(f64) -> f64)] = &[
        ("Abs", f64::abs),
        ("Ceil", f64::ceil),
        ("Floor", f64::floor),
        ("Sqrt", f64::sqrt),
    ];
    for (name, f) in unary {
        let f = *f;
        pkg.func(
            registry,
            name,
            vec![float.clone()],
            false,
            vec![float.clone()],
            move |args| Ok(vec![RtValue::Float(f(arg_f64(&args, 0)?))]),
        );
    }

    let binary: &[(&str, fn(f64, f64) -> f64)] = &[
        ("Max", f64::max),
        ("Min", f64::min),
        ("Mod", |x, y| x % y),
        ("Pow", f64::powf),
    ];
    for (name, f) in binary {
        let f = *f;
        pkg.func(
            registry,
            name,
            vec![float.clone(), float.clone()],
            false,
            vec![float.clone()],
            move |args| Ok(vec![RtValue::Float(f(arg_f64(&args, 0)?, arg_f64(&args, 1)?))]),
        );
    }

    pkg.float_const("Pi", std::f64::consts::PI);
    pkg.float_const("E", std::f64::consts::E);
    pkg
}
