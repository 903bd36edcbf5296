//! The statement evaluator. Execution produces a flow result consumed by
//! the enclosing construct: loops match break/continue labels, function
//! bodies consume returns, and anything escaping to the turn boundary is a
//! runtime error.

use crate::language::ast::*;
use crate::language::types::Type;
use crate::runtime::call::{self, CallKind};
use crate::runtime::channel::{ChannelValue, TryRecv, TrySend};
use crate::runtime::environment::Frame;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::expr::{eval_expr, eval_expr_list, eval_single, truthy};
use crate::runtime::builtins;
use crate::runtime::object::{
    assign_object, format_object, map_key, value_for_type, zero_value, Object, RtValue,
};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;

/// The statement evaluator's non-value output.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Vec<Object>),
    Break(String),
    Continue(String),
}

impl Flow {
    fn matches_label(target: &str, active: &str) -> bool {
        target.is_empty() || target == active
    }
}

pub fn run_block(env: &Arc<Frame>, block: &Block) -> RuntimeResult<Flow> {
    let block_env = env.child();
    for stmt in &block.stmts {
        let flow = run_stmt(&block_env, stmt, "", false)?;
        if !matches!(flow, Flow::Normal) {
            return Ok(flow);
        }
    }
    Ok(Flow::Normal)
}

pub fn run_stmt(
    env: &Arc<Frame>,
    stmt: &Stmt,
    label: &str,
    top_level: bool,
) -> RuntimeResult<Flow> {
    match stmt {
        Stmt::VarDecl(decl) => run_var_decl(env, decl),
        Stmt::Assign(assign) => run_assign(env, assign),
        Stmt::Expr(es) => {
            let objs = eval_expr(env, &es.expr)?;
            if top_level {
                for obj in &objs {
                    let line = format!(
                        "=> {}: {}\n",
                        obj.typ,
                        format_object(obj, env.registry())
                    );
                    env.interp.out.write_str(&line);
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::Send(send) => {
            run_send(env, send)?;
            Ok(Flow::Normal)
        }
        Stmt::IncDec(incdec) => {
            let obj = eval_single(env, &incdec.expr)?;
            crate::runtime::operator::inc_dec(&obj, incdec.dec)?;
            Ok(Flow::Normal)
        }
        Stmt::Go(go) => {
            let ExprKind::Call { fun, args } = &strip_parens(&go.call).kind else {
                return Err(RuntimeError::panic("go statement without a call"));
            };
            match call::call_expr_kind(&env.info(), fun) {
                CallKind::Builtin => {
                    builtins::eval_builtin(env, fun, args, true)?;
                }
                _ => {
                    call::eval_func_call(env, fun, args, true)?;
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::Defer(_) => Err(RuntimeError::unimplemented("defer statements")),
        Stmt::Return(ret) => {
            let objs = eval_expr_list(env, &ret.results)?;
            Ok(Flow::Return(objs))
        }
        Stmt::Branch(branch) => {
            let target = branch
                .label
                .as_ref()
                .map(|l| l.name.clone())
                .unwrap_or_default();
            match branch.kind {
                BranchKind::Break => Ok(Flow::Break(target)),
                BranchKind::Continue => Ok(Flow::Continue(target)),
                BranchKind::Goto => Err(RuntimeError::unimplemented("goto statements")),
                BranchKind::Fallthrough => {
                    Err(RuntimeError::unimplemented("fallthrough statements"))
                }
            }
        }
        Stmt::Labeled(labeled) => run_stmt(env, &labeled.stmt, &labeled.label.name, top_level),
        Stmt::If(ifs) => {
            // The init clause lives in its own frame enclosing both branches.
            let clause_env = if ifs.init.is_some() { env.child() } else { env.clone() };
            if let Some(init) = &ifs.init {
                run_stmt(&clause_env, init, "", false)?;
            }
            let cond = eval_single(&clause_env, &ifs.cond)?;
            if truthy(&clause_env, &cond)? {
                run_block(&clause_env, &ifs.then)
            } else if let Some(els) = &ifs.els {
                run_stmt(&clause_env, els, "", false)
            } else {
                Ok(Flow::Normal)
            }
        }
        Stmt::For(fors) => run_for(env, fors, label),
        Stmt::Range(_) => Err(RuntimeError::unimplemented("range loops")),
        Stmt::Select(select) => run_select(env, select),
        Stmt::Block(block) => run_block(env, block),
        Stmt::Empty => Ok(Flow::Normal),
    }
}

fn run_var_decl(env: &Arc<Frame>, decl: &VarDeclStmt) -> RuntimeResult<Flow> {
    let info = env.info();
    let values = if decl.values.is_empty() {
        Vec::new()
    } else {
        eval_expr_list(env, &decl.values)?
    };
    for (i, name) in decl.names.iter().enumerate() {
        let typ = info
            .defs
            .get(&name.id)
            .map(|def| def.typ.clone())
            .ok_or_else(|| RuntimeError::panic(format!("undeclared variable {}", name.name)))?;
        if name.name == "_" {
            continue;
        }
        let initial = values.get(i).cloned().unwrap_or_else(Object::untyped_nil);
        env.declare(&name.name, &typ, &initial)?;
    }
    Ok(Flow::Normal)
}

/// A classified assignment target.
enum Target {
    /// A settable location, held as an object whose slot is a cell.
    Object(Object),
    /// A map index, which must assign through map insertion.
    MapIndex { map: Expr, index: Expr },
    /// The blank identifier.
    Blank,
}

fn run_assign(env: &Arc<Frame>, assign: &AssignStmt) -> RuntimeResult<Flow> {
    let info = env.info();

    // Classify targets first; short declarations create their variables
    // before the right-hand side runs.
    let mut targets = Vec::with_capacity(assign.lhs.len());
    for lhs in &assign.lhs {
        if matches!(&lhs.kind, ExprKind::Ident(name) if name == "_") {
            targets.push(Target::Blank);
            continue;
        }
        match assign.tok {
            AssignTok::Define => {
                if let Some(def) = info.defs.get(&lhs.id) {
                    // A genuinely new variable: created zeroed, assigned below.
                    let obj = env.declare(&def.name, &def.typ, &Object::untyped_nil())?;
                    targets.push(Target::Object(obj));
                } else {
                    // Redeclaration: reuse the existing binding.
                    let ExprKind::Ident(name) = &lhs.kind else {
                        return Err(RuntimeError::panic("non-name in short declaration"));
                    };
                    let obj = env.lookup(name).ok_or_else(|| {
                        RuntimeError::panic(format!("undefined: {}", name))
                    })?;
                    targets.push(Target::Object(obj));
                }
            }
            AssignTok::Assign => {
                if is_map_index(env, lhs) {
                    let ExprKind::Index { expr, index } = &lhs.kind else {
                        unreachable!("map index target is an index expression");
                    };
                    targets.push(Target::MapIndex {
                        map: expr.as_ref().clone(),
                        index: index.as_ref().clone(),
                    });
                } else {
                    targets.push(Target::Object(eval_single(env, lhs)?));
                }
            }
        }
    }

    let values = eval_expr_list(env, &assign.rhs)?;
    if values.len() != targets.len() {
        return Err(RuntimeError::panic("assignment count mismatch"));
    }

    for (target, value) in targets.iter().zip(values.iter()) {
        match target {
            Target::Blank => {}
            Target::Object(obj) => assign_object(obj, value, env.registry())?,
            Target::MapIndex { map, index } => assign_map_index(env, map, index, value)?,
        }
    }
    Ok(Flow::Normal)
}

fn is_map_index(env: &Arc<Frame>, expr: &Expr) -> bool {
    let ExprKind::Index { expr: x, .. } = &expr.kind else {
        return false;
    };
    matches!(
        env.info().type_of(x.id).map(|t| t.underlying().clone()),
        Some(Type::Map(_, _))
    )
}

fn assign_map_index(
    env: &Arc<Frame>,
    map: &Expr,
    index: &Expr,
    value: &Object,
) -> RuntimeResult<()> {
    let info = env.info();
    let map_typ = info
        .type_of(map.id)
        .cloned()
        .ok_or_else(|| RuntimeError::panic("map expression has no recorded type"))?;
    let Type::Map(key_typ, elem_typ) = map_typ.underlying().clone() else {
        return Err(RuntimeError::panic("map assignment to non-map type"));
    };
    let registry = env.registry();
    let (key_rt, _) = registry
        .resolve(&key_typ)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", key_typ)))?;
    let (elem_rt, _) = registry
        .resolve(&elem_typ)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", elem_typ)))?;

    let map_obj = eval_single(env, map)?;
    let key_obj = eval_single(env, index)?;
    let key_val = if key_obj.is_untyped_nil() {
        zero_value(&key_rt)
    } else {
        value_for_type(&key_obj, &key_rt, registry)?
    };
    let elem_val = value_for_type(value, &elem_rt, registry)?;

    match map_obj.rt_value(registry)? {
        RtValue::Map(Some(mv)) => {
            mv.entries
                .lock()
                .expect("map lock")
                .insert(map_key(&key_val)?, elem_val);
            Ok(())
        }
        RtValue::Map(None) => Err(RuntimeError::NilMapAssignment),
        _ => Err(RuntimeError::panic("map assignment to non-map value")),
    }
}

fn run_send(env: &Arc<Frame>, send: &SendStmt) -> RuntimeResult<()> {
    let info = env.info();
    let chan_typ = info
        .type_of(send.chan.id)
        .cloned()
        .ok_or_else(|| RuntimeError::panic("send channel has no recorded type"))?;
    let Type::Chan(dir, elem_typ) = chan_typ.underlying().clone() else {
        return Err(RuntimeError::panic("send on non-channel type"));
    };
    if !dir.can_send() {
        return Err(RuntimeError::ChannelDirection {
            dir: "receive-only",
        });
    }
    let (elem_rt, _) = env
        .registry()
        .resolve(&elem_typ)
        .ok_or_else(|| RuntimeError::panic(format!("unresolved type {}", elem_typ)))?;

    let chan_obj = eval_single(env, &send.chan)?;
    let value_obj = eval_single(env, &send.value)?;
    let value = value_for_type(&value_obj, &elem_rt, env.registry())?;

    match chan_obj.rt_value(env.registry())? {
        RtValue::Chan(Some(ch)) => ch.send(value),
        RtValue::Chan(None) => Err(RuntimeError::NilChannel),
        _ => Err(RuntimeError::panic("send on non-channel value")),
    }
}

fn run_for(env: &Arc<Frame>, fors: &ForStmt, label: &str) -> RuntimeResult<Flow> {
    let clause_env = if fors.init.is_some() { env.child() } else { env.clone() };
    if let Some(init) = &fors.init {
        run_stmt(&clause_env, init, "", false)?;
    }
    loop {
        if let Some(cond) = &fors.cond {
            let obj = eval_single(&clause_env, cond)?;
            if !truthy(&clause_env, &obj)? {
                return Ok(Flow::Normal);
            }
        }
        match run_block(&clause_env, &fors.body)? {
            Flow::Normal => {}
            Flow::Break(target) => {
                if Flow::matches_label(&target, label) {
                    return Ok(Flow::Normal);
                }
                return Ok(Flow::Break(target));
            }
            Flow::Continue(target) => {
                if !Flow::matches_label(&target, label) {
                    return Ok(Flow::Continue(target));
                }
                // Fall through to the post statement.
            }
            flow @ Flow::Return(_) => return Ok(flow),
        }
        if let Some(post) = &fors.post {
            run_stmt(&clause_env, post, "", false)?;
        }
    }
}

/// One evaluated select case, ready to probe.
enum CaseOp {
    Default,
    Send {
        chan: Option<ChannelValue>,
        value: RtValue,
    },
    Recv {
        chan: Option<ChannelValue>,
        elem_typ: Type,
    },
}

/// The outcome carried into the chosen clause's body.
enum Chosen {
    Plain,
    Received { value: Object, ok: Object },
}

fn run_select(env: &Arc<Frame>, select: &SelectStmt) -> RuntimeResult<Flow> {
    let registry = env.registry();

    // Evaluate every case's channel (and value, for sends) up front.
    let mut ops = Vec::with_capacity(select.cases.len());
    let mut default_idx = None;
    for (i, case) in select.cases.iter().enumerate() {
        let op = match &case.comm {
            CommClause::Default => {
                default_idx = Some(i);
                CaseOp::Default
            }
            CommClause::Send(send) => {
                let info = env.info();
                let chan_typ = info
                    .type_of(send.chan.id)
                    .cloned()
                    .ok_or_else(|| RuntimeError::panic("send channel has no recorded type"))?;
                let Type::Chan(_, elem_typ) = chan_typ.underlying().clone() else {
                    return Err(RuntimeError::panic("select send on non-channel type"));
                };
                let (elem_rt, _) = registry.resolve(&elem_typ).ok_or_else(|| {
                    RuntimeError::panic(format!("unresolved type {}", elem_typ))
                })?;
                let chan_obj = eval_single(env, &send.chan)?;
                let value_obj = eval_single(env, &send.value)?;
                let value = value_for_type(&value_obj, &elem_rt, registry)?;
                let chan = match chan_obj.rt_value(registry)? {
                    RtValue::Chan(chan) => chan,
                    _ => return Err(RuntimeError::panic("select send on non-channel value")),
                };
                CaseOp::Send { chan, value }
            }
            CommClause::Recv { chan, .. } => {
                let info = env.info();
                let chan_typ = info
                    .type_of(chan.id)
                    .cloned()
                    .ok_or_else(|| RuntimeError::panic("receive channel has no recorded type"))?;
                let Type::Chan(_, elem_typ) = chan_typ.underlying().clone() else {
                    return Err(RuntimeError::panic("select receive on non-channel type"));
                };
                let chan_obj = eval_single(env, chan)?;
                let chan = match chan_obj.rt_value(registry)? {
                    RtValue::Chan(chan) => chan,
                    _ => return Err(RuntimeError::panic("select receive on non-channel value")),
                };
                CaseOp::Recv {
                    chan,
                    elem_typ: elem_typ.as_ref().clone(),
                }
            }
        };
        ops.push(op);
    }

    // Probe in random order so ready cases are chosen uniformly; fall back
    // to the default clause only when nothing is ready, and otherwise park
    // briefly before probing again.
    let mut order: Vec<usize> = (0..ops.len())
        .filter(|i| !matches!(ops[*i], CaseOp::Default))
        .collect();
    let mut rng = rand::rng();
    let (chosen_idx, outcome) = 'probe: loop {
        order.shuffle(&mut rng);
        for &i in &order {
            match &ops[i] {
                CaseOp::Default => {}
                CaseOp::Send { chan, value } => {
                    // A nil channel is never ready.
                    let Some(chan) = chan else { continue };
                    match chan.try_send(value.clone()) {
                        TrySend::Sent => break 'probe (i, Chosen::Plain),
                        TrySend::Closed => return Err(RuntimeError::SendOnClosedChannel),
                        TrySend::Pending => {}
                    }
                }
                CaseOp::Recv { chan, elem_typ } => {
                    let Some(chan) = chan else { continue };
                    let (elem_rt, sim) = registry.resolve(elem_typ).ok_or_else(|| {
                        RuntimeError::panic(format!("unresolved type {}", elem_typ))
                    })?;
                    match chan.try_recv() {
                        TryRecv::Value(value) => {
                            break 'probe (
                                i,
                                Chosen::Received {
                                    value: Object::temp(value, elem_typ.clone(), sim),
                                    ok: Object::bool(true),
                                },
                            );
                        }
                        TryRecv::Closed => {
                            break 'probe (
                                i,
                                Chosen::Received {
                                    value: Object::temp(
                                        zero_value(&elem_rt),
                                        elem_typ.clone(),
                                        sim,
                                    ),
                                    ok: Object::bool(false),
                                },
                            );
                        }
                        TryRecv::Pending => {}
                    }
                }
            }
        }
        if let Some(idx) = default_idx {
            break 'probe (idx, Chosen::Plain);
        }
        std::thread::sleep(Duration::from_millis(1));
    };

    // Bind receive targets and run the chosen clause in a fresh frame.
    let case = &select.cases[chosen_idx];
    let case_env = env.child();

    if let (Chosen::Received { value, ok }, CommClause::Recv { lhs, tok, .. }) =
        (&outcome, &case.comm)
    {
        let rhs = [value.clone(), ok.clone()];
        match tok {
            Some(AssignTok::Define) => {
                let info = case_env.info();
                for (i, target) in lhs.iter().enumerate() {
                    let Some(def) = info.defs.get(&target.id) else {
                        return Err(RuntimeError::panic("receive target without definition"));
                    };
                    if def.name == "_" {
                        continue;
                    }
                    case_env.declare(&def.name, &def.typ, &rhs[i])?;
                }
            }
            Some(AssignTok::Assign) => {
                for (i, target) in lhs.iter().enumerate() {
                    if matches!(&target.kind, ExprKind::Ident(name) if name == "_") {
                        continue;
                    }
                    if is_map_index(&case_env, target) {
                        let ExprKind::Index { expr, index } = &target.kind else {
                            unreachable!("map index target is an index expression");
                        };
                        assign_map_index(&case_env, expr, index, &rhs[i])?;
                    } else {
                        let obj = eval_single(&case_env, target)?;
                        assign_object(&obj, &rhs[i], registry)?;
                    }
                }
            }
            None => {}
        }
    }

    for stmt in &case.body {
        match run_stmt(&case_env, stmt, "", false)? {
            Flow::Normal => {}
            // An unlabeled break leaves the select.
            Flow::Break(target) if target.is_empty() => return Ok(Flow::Normal),
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

fn strip_parens(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Paren(inner) => strip_parens(inner),
        _ => expr,
    }
}
