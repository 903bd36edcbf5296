//! The expression evaluator: a recursive walk over typed expressions
//! producing vectors of objects (multi-valued results have length > 1).

use crate::language::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::language::typecheck::UseInfo;
use crate::language::types::Type;
use crate::runtime::call::{self, CallKind};
use crate::runtime::environment::Frame;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::{
    format_value, map_key, zero_value, Object, ObjValue, RtValue, Slot,
};
use crate::runtime::operator;
use crate::runtime::{builtins, func};
use std::sync::Arc;

pub fn eval_single(env: &Arc<Frame>, expr: &Expr) -> RuntimeResult<Object> {
    let mut objs = eval_expr(env, expr)?;
    if objs.is_empty() {
        return Err(RuntimeError::panic(
            "expression used as value has no value",
        ));
    }
    Ok(objs.swap_remove(0))
}

/// The single-vs-multi argument rule: one expression may expand to several
/// values; several expressions are each single-valued.
pub fn eval_expr_list(env: &Arc<Frame>, exprs: &[Expr]) -> RuntimeResult<Vec<Object>> {
    if exprs.len() == 1 {
        return eval_expr(env, &exprs[0]);
    }
    let mut objs = Vec::with_capacity(exprs.len());
    for expr in exprs {
        objs.push(eval_single(env, expr)?);
    }
    Ok(objs)
}

pub fn eval_expr(env: &Arc<Frame>, expr: &Expr) -> RuntimeResult<Vec<Object>> {
    let info = env.info();
    let tv = info.types.get(&expr.id);

    // Constant and nil expressions come straight from the checker.
    if let Some(tv) = tv {
        if tv.typ.is_untyped_nil() {
            return Ok(vec![Object::untyped_nil()]);
        }
        if let Some(constant) = &tv.value {
            if tv.typ.is_typed() {
                let (rt, _) = env.registry().resolve(&tv.typ).ok_or_else(|| {
                    RuntimeError::panic(format!("unresolved type {}", tv.typ))
                })?;
                let value = crate::runtime::object::materialize(constant, &rt);
                return Ok(vec![Object::temp(value, tv.typ.clone(), false)]);
            }
            return Ok(vec![Object::exact(constant.clone(), tv.typ.clone())]);
        }
    }

    let typ = tv
        .map(|tv| tv.typ.clone())
        .ok_or_else(|| RuntimeError::panic("expression has no recorded type"))?;

    match &expr.kind {
        ExprKind::Ident(name) => {
            let obj = env
                .lookup(name)
                .ok_or_else(|| RuntimeError::panic(format!("undefined: {}", name)))?;
            Ok(vec![obj])
        }
        ExprKind::Paren(inner) => eval_expr(env, inner),
        ExprKind::Unary { op, operand } => eval_unary(env, expr, *op, operand, typ),
        ExprKind::Binary { op, left, right } => eval_binary(env, *op, left, right, typ),
        ExprKind::Selector { expr: x, sel } => {
            let info = env.info();
            match info.selections.get(&expr.id) {
                None => {
                    // A package member.
                    let Some(UseInfo::PackageExport { pkg, name, .. }) = info.uses.get(&sel.id)
                    else {
                        return Err(RuntimeError::panic(format!(
                            "unresolved selector {}",
                            sel.name
                        )));
                    };
                    let package = env.interp.pkgs.get(pkg).ok_or_else(|| {
                        RuntimeError::panic(format!("unknown package {}", pkg))
                    })?;
                    let obj = package.lookup(name).ok_or_else(|| {
                        RuntimeError::panic(format!("package member {}.{} not found", pkg, name))
                    })?;
                    Ok(vec![obj])
                }
                Some(selection) => {
                    let xo = eval_single(env, x)?;
                    let mut value = xo.rt_value(env.registry())?;
                    if selection.indirect {
                        value = match value {
                            RtValue::Ptr(Some(cell)) => cell.get(),
                            RtValue::Ptr(None) => return Err(RuntimeError::NilDereference),
                            other => other,
                        };
                    }
                    let RtValue::Struct(sv) = value else {
                        return Err(RuntimeError::panic("field selection on non-struct value"));
                    };
                    let cell = sv.fields[selection.index].clone();
                    let sim = env
                        .registry()
                        .resolve(&selection.typ)
                        .map(|(_, sim)| sim)
                        .unwrap_or(false);
                    Ok(vec![Object::cell(cell, selection.typ.clone(), sim)])
                }
            }
        }
        ExprKind::Call { fun, args } => match call::call_expr_kind(&env.info(), fun) {
            CallKind::Builtin => builtins::eval_builtin(env, fun, args, false),
            CallKind::Conversion => call::eval_conversion(env, expr, args),
            CallKind::Function => call::eval_func_call(env, fun, args, false),
        },
        ExprKind::Index { expr: x, index } => eval_index(env, expr, x, index, typ),
        ExprKind::TypeAssert { expr: x, .. } => eval_type_assert(env, x, typ),
        ExprKind::FuncLit(lit) => {
            let obj = func::eval_func_lit(env, &typ, lit)?;
            Ok(vec![obj])
        }
        ExprKind::Type(_) => Err(RuntimeError::panic("type used as value")),
        _ => Err(RuntimeError::unimplemented(format!(
            "expression form {:?}",
            std::mem::discriminant(&expr.kind)
        ))),
    }
}

fn eval_unary(
    env: &Arc<Frame>,
    _expr: &Expr,
    op: UnaryOp,
    operand: &Expr,
    typ: Type,
) -> RuntimeResult<Vec<Object>> {
    match op {
        UnaryOp::Deref => {
            let xo = eval_single(env, operand)?;
            match xo.rt_value(env.registry())? {
                RtValue::Ptr(Some(cell)) => {
                    let sim = env
                        .registry()
                        .resolve(&typ)
                        .map(|(_, sim)| sim)
                        .unwrap_or(false);
                    Ok(vec![Object::cell(cell, typ, sim)])
                }
                RtValue::Ptr(None) => Err(RuntimeError::NilDereference),
                other => Err(RuntimeError::panic(format!(
                    "cannot dereference {}",
                    format_value(&other)
                ))),
            }
        }
        UnaryOp::Addr => {
            let xo = eval_single(env, operand)?;
            let cell = xo.expect_cell()?;
            Ok(vec![Object::temp(RtValue::Ptr(Some(cell)), typ, false)])
        }
        UnaryOp::Recv => {
            let xo = eval_single(env, operand)?;
            let (elem_typ, comma_ok) = match &typ {
                Type::Tuple(types) => (types[0].clone(), true),
                other => (other.clone(), false),
            };
            let chan = match xo.rt_value(env.registry())? {
                RtValue::Chan(Some(ch)) => ch,
                RtValue::Chan(None) => return Err(RuntimeError::NilChannel),
                other => {
                    return Err(RuntimeError::panic(format!(
                        "cannot receive from {}",
                        format_value(&other)
                    )));
                }
            };
            let (rt, sim) = env
                .registry()
                .resolve(&elem_typ)
                .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", elem_typ)))?;
            let (value, ok) = match chan.recv() {
                Some(value) => (value, true),
                None => (zero_value(&rt), false),
            };
            let value_obj = Object::temp(value, elem_typ, sim);
            if comma_ok {
                Ok(vec![value_obj, Object::bool(ok)])
            } else {
                Ok(vec![value_obj])
            }
        }
        UnaryOp::Neg | UnaryOp::Pos | UnaryOp::Not | UnaryOp::BitNot => Err(
            RuntimeError::unimplemented("unary operators on non-constant operands"),
        ),
    }
}

fn eval_binary(
    env: &Arc<Frame>,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    typ: Type,
) -> RuntimeResult<Vec<Object>> {
    // Logical operators short-circuit; everything else is strict.
    if matches!(op, BinaryOp::LogAnd | BinaryOp::LogOr) {
        let lo = eval_single(env, left)?;
        let lval = truthy(env, &lo)?;
        let decided = match op {
            BinaryOp::LogAnd => !lval,
            _ => lval,
        };
        if decided {
            return Ok(vec![Object::temp(RtValue::Bool(lval), typ, false)]);
        }
        let ro = eval_single(env, right)?;
        let rval = truthy(env, &ro)?;
        return Ok(vec![Object::temp(RtValue::Bool(rval), typ, false)]);
    }

    let lo = eval_single(env, left)?;
    let ro = eval_single(env, right)?;

    let obj = if op.is_comparison() {
        operator::binary_compare(op, lo, ro, &typ, env.registry())?
    } else if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
        operator::binary_shift(op, lo, ro, env.registry())?
    } else {
        operator::binary_arith(op, lo, ro, env.registry())?
    };
    Ok(vec![obj])
}

/// Reads a boolean condition value, accepting both reflective and exact
/// representations.
pub fn truthy(env: &Arc<Frame>, obj: &Object) -> RuntimeResult<bool> {
    match &obj.value {
        ObjValue::Exact(constant) => Ok(constant.as_bool()),
        ObjValue::Rt(Slot::Cell(cell)) => match cell.get() {
            RtValue::Bool(b) => Ok(b),
            other => Err(RuntimeError::panic(format!(
                "non-boolean condition {}",
                format_value(&other)
            ))),
        },
        ObjValue::Rt(Slot::Temp(RtValue::Bool(b))) => Ok(*b),
        _ => Err(RuntimeError::panic("non-boolean condition")),
    }
}

fn eval_index(
    env: &Arc<Frame>,
    _expr: &Expr,
    x: &Expr,
    index: &Expr,
    typ: Type,
) -> RuntimeResult<Vec<Object>> {
    let info = env.info();
    let coll_typ = info
        .type_of(x.id)
        .cloned()
        .ok_or_else(|| RuntimeError::panic("indexed expression has no recorded type"))?;

    match coll_typ.underlying().clone() {
        Type::Map(key_typ, _) => {
            let (result_typ, comma_ok) = match &typ {
                Type::Tuple(types) => (types[0].clone(), true),
                other => (other.clone(), false),
            };
            let (key_rt, _) = env
                .registry()
                .resolve(&key_typ)
                .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", key_typ)))?;
            let key_obj = eval_single(env, index)?;
            let key_val = if key_obj.is_untyped_nil() {
                zero_value(&key_rt)
            } else {
                key_obj.rt_value(env.registry())?
            };
            let (result_rt, sim) = env
                .registry()
                .resolve(&result_typ)
                .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", result_typ)))?;

            let map_obj = eval_single(env, x)?;
            let found = match map_obj.rt_value(env.registry())? {
                RtValue::Map(Some(mv)) => {
                    let key = map_key(&key_val)?;
                    mv.entries.lock().expect("map lock").get(&key).cloned()
                }
                RtValue::Map(None) => None,
                other => {
                    return Err(RuntimeError::panic(format!(
                        "cannot index {}",
                        format_value(&other)
                    )));
                }
            };
            let ok = found.is_some();
            let value = found.unwrap_or_else(|| zero_value(&result_rt));
            let value_obj = Object::temp(value, result_typ, sim);
            if comma_ok {
                Ok(vec![value_obj, Object::bool(ok)])
            } else {
                Ok(vec![value_obj])
            }
        }
        Type::Slice(_) => {
            let idx_obj = eval_single(env, index)?;
            let idx = match idx_obj.defaulted(env.registry())?.rt_value(env.registry())? {
                RtValue::Int(v) => v,
                RtValue::Uint(v) => v as i64,
                other => {
                    return Err(RuntimeError::panic(format!(
                        "invalid index {}",
                        format_value(&other)
                    )));
                }
            };
            let slice_obj = eval_single(env, x)?;
            let slice = match slice_obj.rt_value(env.registry())? {
                RtValue::Slice(Some(slice)) => slice,
                RtValue::Slice(None) => {
                    return Err(RuntimeError::IndexOutOfRange { index: idx, len: 0 });
                }
                other => {
                    return Err(RuntimeError::panic(format!(
                        "cannot index {}",
                        format_value(&other)
                    )));
                }
            };
            if idx < 0 || idx as usize >= slice.elems.len() {
                return Err(RuntimeError::IndexOutOfRange {
                    index: idx,
                    len: slice.elems.len(),
                });
            }
            let cell = slice.elems[idx as usize].clone();
            let sim = env
                .registry()
                .resolve(&typ)
                .map(|(_, sim)| sim)
                .unwrap_or(false);
            Ok(vec![Object::cell(cell, typ, sim)])
        }
        Type::Array(_, _) => Err(RuntimeError::unimplemented("array indexing")),
        Type::Basic(kind) if kind.is_string() => {
            Err(RuntimeError::unimplemented("string indexing"))
        }
        Type::Pointer(_) => Err(RuntimeError::unimplemented("pointer-to-array indexing")),
        other => Err(RuntimeError::panic(format!("cannot index type {}", other))),
    }
}

fn eval_type_assert(env: &Arc<Frame>, x: &Expr, typ: Type) -> RuntimeResult<Vec<Object>> {
    let (target, comma_ok) = match &typ {
        Type::Tuple(types) => (types[0].clone(), true),
        other => (other.clone(), false),
    };
    let (target_rt, sim) = env
        .registry()
        .resolve(&target)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", target)))?;

    let xo = eval_single(env, x)?;
    let inner = match xo.rt_value(env.registry())? {
        RtValue::Iface(inner) => inner,
        other => {
            return Err(RuntimeError::panic(format!(
                "type assertion on non-interface value {}",
                format_value(&other)
            )));
        }
    };

    let (success, value) = match &inner {
        None => (false, None),
        Some(iv) => {
            if target.is_interface() {
                // The only interface type is the empty one, which every
                // dynamic type implements.
                (true, Some(RtValue::Iface(inner.clone())))
            } else if iv.typ == target_rt {
                (true, Some(iv.value.clone()))
            } else {
                (false, None)
            }
        }
    };

    if success {
        let obj = Object::temp(value.expect("successful assertion has a value"), target, sim);
        if comma_ok {
            return Ok(vec![obj, Object::bool(true)]);
        }
        return Ok(vec![obj]);
    }

    if comma_ok {
        let obj = Object::temp(zero_value(&target_rt), target, sim);
        return Ok(vec![obj, Object::bool(false)]);
    }
    let from = match &inner {
        None => "nil".to_string(),
        Some(iv) => iv.typ.to_string(),
    };
    Err(RuntimeError::InterfaceConversion {
        from,
        to: target.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::types::BasicKind;

    #[test]
    fn truthy_accepts_exact_and_reflective_booleans() {
        let interp = Arc::new(crate::runtime::environment::InterpShared {
            registry: crate::runtime::registry::Registry::new(),
            pkgs: std::collections::HashMap::new(),
            out: crate::runtime::environment::OutputSink::buffer().0,
        });
        let env = Frame::root(
            interp,
            Arc::new(crate::language::typecheck::TypeInfo::default()),
        );
        let exact = Object::exact(
            crate::language::constant::Constant::Bool(true),
            Type::Basic(BasicKind::UntypedBool),
        );
        assert!(truthy(&env, &exact).unwrap());
        let reflective = Object::temp(RtValue::Bool(false), Type::Basic(BasicKind::Bool), false);
        assert!(!truthy(&env, &reflective).unwrap());
    }
}
