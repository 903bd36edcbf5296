//! Function literals. A literal whose signature resolves to a concrete
//! host type becomes a host function of that exact signature; any other
//! literal becomes a simulated callable over objects. Both close over a
//! snapshot frame whose bindings alias the captured variables' cells.

use crate::language::ast::{
    Block, CommClause, Expr, ExprKind, FuncLit, Stmt, TypeExpr, TypeExprKind,
};
use crate::language::typecheck::{TypeInfo, UseInfo};
use crate::language::types::Type;
use crate::runtime::environment::{Frame, InterpShared};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::{assign_object, HostFn, Object, RtValue, SimFn, TypedCell};
use crate::runtime::registry::RtType;
use crate::runtime::stmt::{self, Flow};
use std::sync::Arc;

pub fn eval_func_lit(
    env: &Arc<Frame>,
    typ: &Type,
    lit: &Arc<FuncLit>,
) -> RuntimeResult<Object> {
    let (rt, sim) = env
        .registry()
        .resolve(typ)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", typ)))?;

    let Type::Func(sig) = typ.underlying().clone() else {
        return Err(RuntimeError::panic("function literal with non-function type"));
    };
    if sig.variadic {
        return Err(RuntimeError::unimplemented("variadic function literals"));
    }

    let closure = build_closure_frame(env, lit);
    let interp = env.interp.clone();
    let info = env.info();

    if sim {
        let lit = lit.clone();
        let func = move |args: Vec<Object>| {
            run_function_body(&interp, &info, &closure, &lit, &sig, args)
        };
        return Ok(Object::temp(
            RtValue::SimFunc(Some(SimFn {
                func: Arc::new(func),
            })),
            typ.clone(),
            true,
        ));
    }

    let RtType::Func(host_sig) = rt else {
        return Err(RuntimeError::panic(
            "non-simulated function type without a host signature",
        ));
    };
    let lit = lit.clone();
    let static_sig = sig.clone();
    let func = move |in_vals: Vec<RtValue>| {
        let args: Vec<Object> = in_vals
            .into_iter()
            .zip(static_sig.params.iter())
            .map(|(value, typ)| Object::temp(value, typ.clone(), false))
            .collect();
        let results = run_function_body(&interp, &info, &closure, &lit, &static_sig, args)?;
        let mut out = Vec::with_capacity(results.len());
        for obj in results {
            out.push(obj.rt_value(&interp.registry)?);
        }
        Ok(out)
    };
    Ok(Object::temp(
        RtValue::Func(Some(HostFn {
            sig: host_sig,
            func: Arc::new(func),
        })),
        typ.clone(),
        false,
    ))
}

/// Builds the closure snapshot: a frame holding, by reference, every
/// binding the literal uses whose definition lies outside the literal's
/// source range and is not a package name. Invocations chain their call
/// frame to this snapshot, so later rebindings of the captured names in
/// the enclosing scope do not affect the closure.
fn build_closure_frame(env: &Arc<Frame>, lit: &FuncLit) -> Arc<Frame> {
    let closure = Frame::with_parent(env.interp.clone(), env.info(), env.parent.clone());
    let info = env.info();
    visit_block(&lit.body, &mut |expr: &Expr| {
        if let ExprKind::Ident(name) = &expr.kind {
            if let Some(UseInfo::Var { decl_span, .. }) = info.uses.get(&expr.id) {
                if !lit.span.contains(decl_span.start) {
                    if let Some(obj) = env.lookup(name) {
                        closure.insert(name, obj);
                    }
                }
            }
        }
    });
    closure
}

/// The body shared by both function representations: bind parameters,
/// pre-allocate result cells (binding named results), run the body, and
/// copy a Return flow's values into the result cells.
fn run_function_body(
    interp: &Arc<InterpShared>,
    info: &Arc<TypeInfo>,
    closure: &Arc<Frame>,
    lit: &Arc<FuncLit>,
    sig: &Arc<crate::language::types::Signature>,
    args: Vec<Object>,
) -> RuntimeResult<Vec<Object>> {
    let func_env = Frame::with_parent(interp.clone(), info.clone(), Some(closure.clone()));

    for (i, param) in lit.sig.params.iter().enumerate() {
        let Some(arg) = args.get(i) else {
            return Err(RuntimeError::panic("missing argument"));
        };
        if let Some(name) = &param.name {
            if name.name != "_" {
                func_env.declare(&name.name, &sig.params[i], arg)?;
            }
        }
    }

    let mut result_objs = Vec::with_capacity(sig.results.len());
    for (i, result_typ) in sig.results.iter().enumerate() {
        let (rt, sim) = interp
            .registry
            .resolve(result_typ)
            .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", result_typ)))?;
        let obj = Object::cell(TypedCell::zeroed(rt), result_typ.clone(), sim);
        if let Some(name) = lit.sig.results.get(i).and_then(|r| r.name.as_ref()) {
            if name.name != "_" {
                func_env.insert(&name.name, obj.clone());
            }
        }
        result_objs.push(obj);
    }

    match stmt::run_block(&func_env, &lit.body)? {
        Flow::Return(values) => {
            for (i, value) in values.iter().enumerate() {
                let Some(result) = result_objs.get(i) else {
                    return Err(RuntimeError::panic("too many return values"));
                };
                assign_object(result, value, &interp.registry)?;
            }
        }
        Flow::Normal => {}
        Flow::Break(_) => return Err(RuntimeError::StrayFlow { kind: "break" }),
        Flow::Continue(_) => return Err(RuntimeError::StrayFlow { kind: "continue" }),
    }
    Ok(result_objs)
}

// ---- AST traversal for closure capture ----

fn visit_block(block: &Block, f: &mut impl FnMut(&Expr)) {
    for stmt in &block.stmts {
        visit_stmt(stmt, f);
    }
}

fn visit_stmt(stmt: &Stmt, f: &mut impl FnMut(&Expr)) {
    match stmt {
        Stmt::VarDecl(decl) => {
            for value in &decl.values {
                visit_expr(value, f);
            }
            if let Some(ty) = &decl.ty {
                visit_type_expr(ty, f);
            }
        }
        Stmt::Assign(assign) => {
            for expr in assign.lhs.iter().chain(assign.rhs.iter()) {
                visit_expr(expr, f);
            }
        }
        Stmt::Expr(es) => visit_expr(&es.expr, f),
        Stmt::Send(send) => {
            visit_expr(&send.chan, f);
            visit_expr(&send.value, f);
        }
        Stmt::IncDec(incdec) => visit_expr(&incdec.expr, f),
        Stmt::Go(go) => visit_expr(&go.call, f),
        Stmt::Defer(defer) => visit_expr(&defer.call, f),
        Stmt::Return(ret) => {
            for expr in &ret.results {
                visit_expr(expr, f);
            }
        }
        Stmt::Branch(_) | Stmt::Empty => {}
        Stmt::Labeled(labeled) => visit_stmt(&labeled.stmt, f),
        Stmt::If(ifs) => {
            if let Some(init) = &ifs.init {
                visit_stmt(init, f);
            }
            visit_expr(&ifs.cond, f);
            visit_block(&ifs.then, f);
            if let Some(els) = &ifs.els {
                visit_stmt(els, f);
            }
        }
        Stmt::For(fors) => {
            if let Some(init) = &fors.init {
                visit_stmt(init, f);
            }
            if let Some(cond) = &fors.cond {
                visit_expr(cond, f);
            }
            if let Some(post) = &fors.post {
                visit_stmt(post, f);
            }
            visit_block(&fors.body, f);
        }
        Stmt::Range(range) => {
            if let Some(key) = &range.key {
                visit_expr(key, f);
            }
            if let Some(value) = &range.value {
                visit_expr(value, f);
            }
            visit_expr(&range.collection, f);
            visit_block(&range.body, f);
        }
        Stmt::Select(select) => {
            for case in &select.cases {
                match &case.comm {
                    CommClause::Default => {}
                    CommClause::Send(send) => {
                        visit_expr(&send.chan, f);
                        visit_expr(&send.value, f);
                    }
                    CommClause::Recv { lhs, chan, .. } => {
                        for expr in lhs {
                            visit_expr(expr, f);
                        }
                        visit_expr(chan, f);
                    }
                }
                for stmt in &case.body {
                    visit_stmt(stmt, f);
                }
            }
        }
        Stmt::Block(block) => visit_block(block, f),
    }
}

fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    match &expr.kind {
        ExprKind::Unary { operand, .. } => visit_expr(operand, f),
        ExprKind::Binary { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        ExprKind::Call { fun, args } => {
            visit_expr(fun, f);
            for arg in args {
                visit_expr(arg, f);
            }
        }
        ExprKind::Paren(inner) => visit_expr(inner, f),
        ExprKind::Selector { expr, .. } => visit_expr(expr, f),
        ExprKind::Index { expr, index } => {
            visit_expr(expr, f);
            visit_expr(index, f);
        }
        ExprKind::TypeAssert { expr, ty } => {
            visit_expr(expr, f);
            visit_type_expr(ty, f);
        }
        ExprKind::FuncLit(lit) => visit_block(&lit.body, f),
        ExprKind::Type(ty) => visit_type_expr(ty, f),
        _ => {}
    }
}

fn visit_type_expr(ty: &TypeExpr, f: &mut impl FnMut(&Expr)) {
    match &ty.kind {
        TypeExprKind::Pointer(elem) | TypeExprKind::Slice(elem) => visit_type_expr(elem, f),
        TypeExprKind::Array { len, elem } => {
            visit_expr(len, f);
            visit_type_expr(elem, f);
        }
        TypeExprKind::Map { key, value } => {
            visit_type_expr(key, f);
            visit_type_expr(value, f);
        }
        TypeExprKind::Chan { elem, .. } => visit_type_expr(elem, f),
        TypeExprKind::Func(sig) => {
            for param in sig.params.iter().chain(sig.results.iter()) {
                visit_type_expr(&param.ty, f);
            }
        }
        TypeExprKind::Struct { fields } => {
            for field in fields {
                visit_type_expr(&field.ty, f);
            }
        }
        _ => {}
    }
}
