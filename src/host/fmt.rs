//! The bridged `fmt` package: formatted printing through the session's
//! output sink. The language has no error type, so the printing functions
//! return no values.

use crate::host::{arg_str, PackageBuilder};
use crate::language::types::{BasicKind, Type};
use crate::runtime::environment::OutputSink;
use crate::runtime::error::RuntimeResult;
use crate::runtime::object::{format_value, RtValue};
use crate::runtime::registry::Registry;

pub(crate) fn package(registry: &Registry, out: &OutputSink) -> PackageBuilder {
    let mut pkg = PackageBuilder::new("fmt");
    let string = Type::Basic(BasicKind::String);
    let variadic_any = vec![Type::slice(Type::Interface)];

    {
        let out = out.clone();
        pkg.func(registry, "Print", variadic_any.clone(), true, vec![], move |args| {
            out.write_str(&sprint(&args));
            Ok(Vec::new())
        });
    }
    {
        let out = out.clone();
        pkg.func(
            registry,
            "Println",
            variadic_any.clone(),
            true,
            vec![],
            move |args| {
                out.write_str(&sprintln(&args));
                Ok(Vec::new())
            },
        );
    }
    {
        let out = out.clone();
        let params = vec![string.clone(), Type::slice(Type::Interface)];
        pkg.func(registry, "Printf", params, true, vec![], move |args| {
            let format = arg_str(&args, 0)?;
            out.write_str(&sprintf(&format, &args[1..])?);
            Ok(Vec::new())
        });
    }
    pkg.func(
        registry,
        "Sprint",
        variadic_any.clone(),
        true,
        vec![string.clone()],
        |args| Ok(vec![RtValue::Str(sprint(&args))]),
    );
    pkg.func(
        registry,
        "Sprintln",
        variadic_any.clone(),
        true,
        vec![string.clone()],
        |args| Ok(vec![RtValue::Str(sprintln(&args))]),
    );
    {
        let params = vec![string.clone(), Type::slice(Type::Interface)];
        pkg.func(registry, "Sprintf", params, true, vec![string], move |args| {
            let format = arg_str(&args, 0)?;
            Ok(vec![RtValue::Str(sprintf(&format, &args[1..])?)])
        });
    }
    pkg
}

/// Concatenates operands, adding a space between neighbors only when
/// neither is a string.
pub fn sprint(values: &[RtValue]) -> String {
    let mut parts = String::new();
    let mut prev_was_string = true;
    for (i, value) in values.iter().enumerate() {
        let is_string = matches!(unwrap(value), RtValue::Str(_));
        if i > 0 && !is_string && !prev_was_string {
            parts.push(' ');
        }
        parts.push_str(&format_value(value));
        prev_was_string = is_string;
    }
    parts
}

/// Space-separates all operands and appends a newline.
pub fn sprintln(values: &[RtValue]) -> String {
    let parts: Vec<String> = values.iter().map(format_value).collect();
    format!("{}\n", parts.join(" "))
}

/// A small verb set of the host formatter: %v %d %s %t %f %g %q %x %%.
pub fn sprintf(format: &str, args: &[RtValue]) -> RuntimeResult<String> {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    let mut next = 0usize;
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let Some(verb) = chars.next() else {
            out.push('%');
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.get(next) else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        next += 1;
        let arg = unwrap(arg);
        match verb {
            'v' | 'd' | 's' | 't' | 'g' => out.push_str(&format_value(arg)),
            'f' => match arg {
                RtValue::Float(v) => out.push_str(&format!("{:.6}", v)),
                other => out.push_str(&format_value(other)),
            },
            'q' => match arg {
                RtValue::Str(s) => out.push_str(&format!("{:?}", s)),
                other => out.push_str(&format_value(other)),
            },
            'x' => match arg {
                RtValue::Int(v) => out.push_str(&format!("{:x}", v)),
                RtValue::Uint(v) => out.push_str(&format!("{:x}", v)),
                other => out.push_str(&format_value(other)),
            },
            other => out.push_str(&format!("%!{}({})", other, format_value(arg))),
        }
    }
    Ok(out)
}

fn unwrap(value: &RtValue) -> &RtValue {
    match value {
        RtValue::Iface(Some(inner)) => &inner.value,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprint_spaces_only_between_non_strings() {
        let values = vec![RtValue::Int(1), RtValue::Int(2)];
        assert_eq!(sprint(&values), "1 2");
        let values = vec![RtValue::Str("a".into()), RtValue::Int(2)];
        assert_eq!(sprint(&values), "a2");
    }

    #[test]
    fn sprintln_always_spaces_and_terminates() {
        let values = vec![RtValue::Str("a".into()), RtValue::Int(2)];
        assert_eq!(sprintln(&values), "a 2\n");
    }

    #[test]
    fn sprintf_covers_the_verb_set() {
        let args = vec![RtValue::Int(255)];
        assert_eq!(sprintf("%d", &args).unwrap(), "255");
        assert_eq!(sprintf("%x", &args).unwrap(), "ff");
        assert_eq!(sprintf("%%", &[]).unwrap(), "%");
        assert_eq!(
            sprintf("%q", &[RtValue::Str("hi".into())]).unwrap(),
            "\"hi\""
        );
        assert_eq!(sprintf("%d", &[]).unwrap(), "%!d(MISSING)");
    }
}
