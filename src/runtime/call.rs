//! Call machinery: call-kind classification, argument marshaling between
//! objects and host values, and synchronous or spawned dispatch.

use crate::language::ast::{Expr, ExprKind, UnaryOp};
use crate::language::typecheck::{TypeInfo, UseInfo};
use crate::language::types::Type;
use crate::runtime::environment::{Frame, InterpShared};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::expr::{eval_expr_list, eval_single};
use crate::runtime::object::{convert_rt, value_for_type, zero_value, Object, RtValue};
use crate::runtime::task;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Function,
    Builtin,
    Conversion,
}

/// Classifies a call by walking its head expression through the use table.
/// Parentheses and a leading `*` are transparent; a type-literal head is
/// always a conversion.
pub fn call_expr_kind(info: &TypeInfo, fun: &Expr) -> CallKind {
    match &fun.kind {
        ExprKind::Ident(_) => match info.uses.get(&fun.id) {
            Some(UseInfo::Builtin(_)) => CallKind::Builtin,
            Some(UseInfo::TypeName(_)) => CallKind::Conversion,
            _ => CallKind::Function,
        },
        ExprKind::Selector { sel, .. } => match info.uses.get(&sel.id) {
            Some(UseInfo::TypeName(_)) => CallKind::Conversion,
            _ => CallKind::Function,
        },
        ExprKind::Type(_) => CallKind::Conversion,
        ExprKind::Paren(inner) => call_expr_kind(info, inner),
        ExprKind::Unary {
            op: UnaryOp::Deref,
            operand,
        } => call_expr_kind(info, operand),
        _ => CallKind::Function,
    }
}

/// Evaluates a function call. For an asynchronous call the invocation runs
/// on a fresh task and the result is discarded; the callee and arguments
/// are still evaluated on the calling task.
pub fn eval_func_call(
    env: &Arc<Frame>,
    fun: &Expr,
    args: &[Expr],
    is_async: bool,
) -> RuntimeResult<Vec<Object>> {
    let fun_obj = eval_single(env, fun)?;
    let arg_objs = eval_expr_list(env, args)?;

    if is_async {
        let interp = env.interp.clone();
        task::spawn_task(move || {
            if let Err(err) = invoke_object(&interp, &fun_obj, arg_objs) {
                interp.out.write_str(&format!("task error: {}\n", err));
            }
        });
        return Ok(Vec::new());
    }
    invoke_object(&env.interp, &fun_obj, arg_objs)
}

/// Dispatches a call on an already-evaluated callee. Simulated callees are
/// invoked directly on objects; reflective callees marshal through host
/// values.
pub fn invoke_object(
    interp: &Arc<InterpShared>,
    fun_obj: &Object,
    args: Vec<Object>,
) -> RuntimeResult<Vec<Object>> {
    if fun_obj.sim {
        let value = fun_obj.rt_value(&interp.registry)?;
        let RtValue::SimFunc(sim) = value else {
            return Err(RuntimeError::panic(
                "simulated callee has no simulated representation",
            ));
        };
        let Some(sim) = sim else {
            return Err(RuntimeError::NilFunctionCall);
        };
        return (sim.func)(args);
    }

    let value = fun_obj.rt_value(&interp.registry)?;
    let RtValue::Func(host) = value else {
        return Err(RuntimeError::panic("callee is not a function"));
    };
    let Some(host) = host else {
        return Err(RuntimeError::NilFunctionCall);
    };

    let arg_vals = marshal_args(&host.sig.params, host.sig.variadic, &args, interp)?;
    let results = (host.func)(arg_vals)?;

    let Type::Func(sig) = fun_obj.typ.underlying().clone() else {
        return Err(RuntimeError::panic("callee has a non-function static type"));
    };
    let mut out = Vec::with_capacity(results.len());
    for (i, value) in results.into_iter().enumerate() {
        let typ = sig
            .results
            .get(i)
            .cloned()
            .ok_or_else(|| RuntimeError::panic("call produced extra results"))?;
        out.push(Object::temp(value, typ, false));
    }
    Ok(out)
}

/// Marshals objects into host argument values, substituting the zero value
/// of the parameter type for untyped nil and flattening variadic tails.
fn marshal_args(
    params: &[crate::runtime::registry::RtType],
    variadic: bool,
    args: &[Object],
    interp: &Arc<InterpShared>,
) -> RuntimeResult<Vec<RtValue>> {
    let fixed = if variadic {
        params.len().saturating_sub(1)
    } else {
        params.len()
    };
    let mut vals = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let param_rt = if i < fixed {
            params
                .get(i)
                .ok_or_else(|| RuntimeError::panic("argument count mismatch"))?
                .clone()
        } else {
            // The variadic tail: arguments convert to the element type of
            // the final slice parameter.
            match params
                .last()
                .ok_or_else(|| RuntimeError::panic("variadic callee has no parameters"))?
                .repr()
            {
                crate::runtime::registry::RtType::Slice(elem) => elem.as_ref().clone(),
                other => other.clone(),
            }
        };
        if arg.is_untyped_nil() {
            vals.push(zero_value(&param_rt));
        } else {
            vals.push(value_for_type(arg, &param_rt, &interp.registry)?);
        }
    }
    Ok(vals)
}

/// Evaluates a conversion call `T(x)`.
pub fn eval_conversion(
    env: &Arc<Frame>,
    call_expr: &Expr,
    args: &[Expr],
) -> RuntimeResult<Vec<Object>> {
    let info = env.info();
    let target = info
        .type_of(call_expr.id)
        .cloned()
        .ok_or_else(|| RuntimeError::panic("conversion has no recorded type"))?;
    let (rt, sim) = env
        .registry()
        .resolve(&target)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", target)))?;

    let arg = eval_single(env, &args[0])?;
    let value = if arg.is_untyped_nil() {
        zero_value(&rt)
    } else if matches!(rt.repr(), crate::runtime::registry::RtType::Iface) {
        value_for_type(&arg, &rt, env.registry())?
    } else {
        convert_rt(arg.rt_value(env.registry())?, &rt)?
    };
    Ok(vec![Object::temp(value, target, sim)])
}
