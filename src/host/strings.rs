//! The bridged `strings` package.

use crate::host::{arg_i64, arg_str, PackageBuilder};
use crate::language::types::{BasicKind, Type};
use crate::runtime::error::RuntimeError;
use crate::runtime::object::RtValue;
use crate::runtime::registry::Registry;

pub(crate) fn package(registry: &Registry) -> PackageBuilder {
    let mut pkg = PackageBuilder::new("strings");
    let string = Type::Basic(BasicKind::String);
    let boolean = Type::Basic(BasicKind::Bool);
    let int = Type::Basic(BasicKind::Int);

    pkg.func(
        registry,
        "Contains",
        vec![string.clone(), string.clone()],
        false,
        vec![boolean.clone()],
        |args| {
            Ok(vec![RtValue::Bool(
                arg_str(&args, 0)?.contains(&arg_str(&args, 1)?),
            )])
        },
    );
    pkg.func(
        registry,
        "HasPrefix",
        vec![string.clone(), string.clone()],
        false,
        vec![boolean.clone()],
        |args| {
            Ok(vec![RtValue::Bool(
                arg_str(&args, 0)?.starts_with(&arg_str(&args, 1)?),
            )])
        },
    );
    pkg.func(
        registry,
        "HasSuffix",
        vec![string.clone(), string.clone()],
        false,
        vec![boolean],
        |args| {
            Ok(vec![RtValue::Bool(
                arg_str(&args, 0)?.ends_with(&arg_str(&args, 1)?),
            )])
        },
    );
    pkg.func(
        registry,
        "Index",
        vec![string.clone(), string.clone()],
        false,
        vec![int.clone()],
        |args| {
            let haystack = arg_str(&args, 0)?;
            let needle = arg_str(&args, 1)?;
            let index = haystack
                .find(&needle)
                .map(|byte| byte as i64)
                .unwrap_or(-1);
            Ok(vec![RtValue::Int(index)])
        },
    );
    pkg.func(
        registry,
        "Repeat",
        vec![string.clone(), int],
        false,
        vec![string.clone()],
        |args| {
            let s = arg_str(&args, 0)?;
            let count = arg_i64(&args, 1)?;
            if count < 0 {
                return Err(RuntimeError::panic("strings: negative Repeat count"));
            }
            Ok(vec![RtValue::Str(s.repeat(count as usize))])
        },
    );
    pkg.func(
        registry,
        "ToLower",
        vec![string.clone()],
        false,
        vec![string.clone()],
        |args| Ok(vec![RtValue::Str(arg_str(&args, 0)?.to_lowercase())]),
    );
    pkg.func(
        registry,
        "ToUpper",
        vec![string.clone()],
        false,
        vec![string.clone()],
        |args| Ok(vec![RtValue::Str(arg_str(&args, 0)?.to_uppercase())]),
    );
    pkg.func(
        registry,
        "TrimSpace",
        vec![string.clone()],
        false,
        vec![string],
        |args| Ok(vec![RtValue::Str(arg_str(&args, 0)?.trim().to_string())]),
    );
    pkg
}
