//! The evaluated builtins: `make`, `close`, `print`, `println`. The
//! remaining predeclared functions are reserved and report a clear
//! unimplemented error.

use crate::language::ast::Expr;
use crate::language::typecheck::{Builtin, UseInfo};
use crate::language::types::Type;
use crate::runtime::channel::ChannelValue;
use crate::runtime::environment::Frame;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::expr::{eval_expr_list, eval_single};
use crate::runtime::object::{MapValue, Object, RtValue, SliceValue, TypedCell};
use crate::runtime::registry::RtType;
use crate::runtime::task;
use crate::host::fmt as fmtpkg;
use std::sync::Arc;

pub fn eval_builtin(
    env: &Arc<Frame>,
    fun: &Expr,
    args: &[Expr],
    is_async: bool,
) -> RuntimeResult<Vec<Object>> {
    let info = env.info();
    let Some(UseInfo::Builtin(builtin)) = info.uses.get(&fun.id) else {
        return Err(RuntimeError::panic("builtin call without a use record"));
    };
    match builtin {
        Builtin::Make => Ok(vec![eval_make(env, args)?]),
        Builtin::Close => {
            let obj = eval_single(env, &args[0])?;
            match obj.rt_value(env.registry())? {
                RtValue::Chan(Some(ch)) => {
                    ch.close()?;
                    Ok(Vec::new())
                }
                RtValue::Chan(None) => Err(RuntimeError::NilChannel),
                _ => Err(RuntimeError::panic("close of non-channel value")),
            }
        }
        Builtin::Print | Builtin::Println => {
            let objs = eval_expr_list(env, args)?;
            let mut values = Vec::with_capacity(objs.len());
            for obj in &objs {
                if obj.is_untyped_nil() {
                    values.push(RtValue::Iface(None));
                } else {
                    values.push(obj.rt_value(env.registry())?);
                }
            }
            let line = if matches!(builtin, Builtin::Println) {
                fmtpkg::sprintln(&values)
            } else {
                fmtpkg::sprint(&values)
            };
            if is_async {
                let out = env.interp.out.clone();
                task::spawn_task(move || out.write_str(&line));
            } else {
                env.interp.out.write_str(&line);
            }
            Ok(Vec::new())
        }
        other => Err(RuntimeError::unimplemented(format!(
            "builtin {}",
            other.name()
        ))),
    }
}

fn eval_make(env: &Arc<Frame>, args: &[Expr]) -> RuntimeResult<Object> {
    let info = env.info();
    let typ = info
        .type_of(args[0].id)
        .cloned()
        .ok_or_else(|| RuntimeError::panic("make argument has no recorded type"))?;
    let (rt, sim) = env
        .registry()
        .resolve(&typ)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", typ)))?;

    let value = match typ.underlying() {
        Type::Chan(_, _) => {
            let capacity = match args.get(1) {
                Some(expr) => eval_usize(env, expr)?,
                None => 0,
            };
            RtValue::Chan(Some(ChannelValue::new(capacity)))
        }
        Type::Map(_, _) => {
            // An initial size hint is accepted and ignored.
            RtValue::Map(Some(MapValue::new()))
        }
        Type::Slice(_) => {
            let RtType::Slice(elem_rt) = rt.repr() else {
                return Err(RuntimeError::panic("slice type without slice host type"));
            };
            let len = match args.get(1) {
                Some(expr) => eval_usize(env, expr)?,
                None => return Err(RuntimeError::panic("missing length argument to make")),
            };
            if let Some(cap_expr) = args.get(2) {
                let cap = eval_usize(env, cap_expr)?;
                if cap < len {
                    return Err(RuntimeError::panic("len larger than cap in make"));
                }
            }
            let elems: Vec<_> = (0..len)
                .map(|_| TypedCell::zeroed(elem_rt.as_ref().clone()))
                .collect();
            RtValue::Slice(Some(SliceValue {
                elems: Arc::new(elems),
            }))
        }
        other => {
            return Err(RuntimeError::panic(format!("cannot make type {}", other)));
        }
    };
    Ok(Object::temp(value, typ, sim))
}

fn eval_usize(env: &Arc<Frame>, expr: &Expr) -> RuntimeResult<usize> {
    let obj = eval_single(env, expr)?;
    match obj.defaulted(env.registry())?.rt_value(env.registry())? {
        RtValue::Int(v) if v >= 0 => Ok(v as usize),
        RtValue::Uint(v) => Ok(v as usize),
        RtValue::Int(v) => Err(RuntimeError::panic(format!("negative size {} in make", v))),
        other => Err(RuntimeError::panic(format!(
            "invalid size argument {:?} to make",
            other
        ))),
    }
}
