use crate::language::{
    ast::*,
    constant::Constant,
    span::Span,
    types::{BasicKind, ChanDir, Signature, StructField, StructType, Type},
};
use miette::SourceSpan;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct TypeError {
    pub message: String,
    pub span: Span,
}

impl TypeError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn to_source_span(&self) -> SourceSpan {
        (self.span.start, self.span.len()).into()
    }
}

type CheckResult<T> = Result<T, TypeError>;

/// The predeclared functions. `Make`, `Close`, `Print`, and `Println` are
/// evaluated; the rest are reserved and rejected by the evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Make,
    Close,
    Print,
    Println,
    Append,
    Cap,
    Len,
    New,
    Complex,
    Real,
    Imag,
    Panic,
    Recover,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Make => "make",
            Builtin::Close => "close",
            Builtin::Print => "print",
            Builtin::Println => "println",
            Builtin::Append => "append",
            Builtin::Cap => "cap",
            Builtin::Len => "len",
            Builtin::New => "new",
            Builtin::Complex => "complex",
            Builtin::Real => "real",
            Builtin::Imag => "imag",
            Builtin::Panic => "panic",
            Builtin::Recover => "recover",
        }
    }
}

#[derive(Clone, Debug)]
pub struct TypeAndValue {
    pub typ: Type,
    pub value: Option<Constant>,
}

impl TypeAndValue {
    fn plain(typ: Type) -> Self {
        Self { typ, value: None }
    }
}

#[derive(Clone, Debug)]
pub struct DefInfo {
    pub name: String,
    pub typ: Type,
}

#[derive(Clone, Debug)]
pub enum UseInfo {
    Var { decl_span: Span, typ: Type },
    Builtin(Builtin),
    TypeName(Type),
    Package(String),
    PackageExport { pkg: String, name: String, typ: Type },
}

#[derive(Clone, Debug)]
pub struct Selection {
    pub index: usize,
    pub indirect: bool,
    pub typ: Type,
}

/// Everything the evaluator needs to know about a checked file, keyed by
/// node identity: per-expression types and folded constants, definition and
/// use records for identifiers, and field selections.
#[derive(Debug, Default)]
pub struct TypeInfo {
    pub types: HashMap<NodeId, TypeAndValue>,
    pub defs: HashMap<NodeId, DefInfo>,
    pub uses: HashMap<NodeId, UseInfo>,
    pub selections: HashMap<NodeId, Selection>,
}

impl TypeInfo {
    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id).map(|tv| &tv.typ)
    }
}

/// Checker-side description of a bridged package: exported names and their
/// static types.
#[derive(Clone, Debug)]
pub struct PackageInfo {
    pub name: String,
    pub exports: HashMap<String, Type>,
}

pub fn check_file(
    file: &File,
    packages: &HashMap<String, PackageInfo>,
) -> Result<TypeInfo, TypeError> {
    let mut checker = Checker::new(packages);
    checker.check_file(file)?;
    Ok(checker.info)
}

#[derive(Clone, Debug)]
enum Binding {
    Var { typ: Type, decl_span: Span },
    Const { typ: Type, value: Constant },
    Nil,
    TypeName(Type),
    Builtin(Builtin),
    Package(String),
}

struct Scope {
    names: HashMap<String, Binding>,
}

struct ResultsCtx {
    results: Vec<Type>,
    named: bool,
}

struct Checker<'a> {
    packages: &'a HashMap<String, PackageInfo>,
    info: TypeInfo,
    scopes: Vec<Scope>,
    results: Vec<ResultsCtx>,
}

impl<'a> Checker<'a> {
    fn new(packages: &'a HashMap<String, PackageInfo>) -> Self {
        let mut checker = Self {
            packages,
            info: TypeInfo::default(),
            scopes: Vec::new(),
            results: Vec::new(),
        };
        checker.push_scope();
        checker.install_universe();
        checker
    }

    fn install_universe(&mut self) {
        let types: &[(&str, BasicKind)] = &[
            ("bool", BasicKind::Bool),
            ("int", BasicKind::Int),
            ("int8", BasicKind::Int8),
            ("int16", BasicKind::Int16),
            ("int32", BasicKind::Int32),
            ("int64", BasicKind::Int64),
            ("uint", BasicKind::Uint),
            ("uint8", BasicKind::Uint8),
            ("uint16", BasicKind::Uint16),
            ("uint32", BasicKind::Uint32),
            ("uint64", BasicKind::Uint64),
            ("uintptr", BasicKind::Uintptr),
            ("float32", BasicKind::Float32),
            ("float64", BasicKind::Float64),
            ("complex64", BasicKind::Complex64),
            ("complex128", BasicKind::Complex128),
            ("string", BasicKind::String),
            ("byte", BasicKind::Uint8),
            ("rune", BasicKind::Int32),
        ];
        let scope = self.scopes.last_mut().expect("universe scope");
        for (name, kind) in types {
            scope
                .names
                .insert(name.to_string(), Binding::TypeName(Type::Basic(*kind)));
        }
        scope.names.insert(
            "true".into(),
            Binding::Const {
                typ: Type::Basic(BasicKind::UntypedBool),
                value: Constant::Bool(true),
            },
        );
        scope.names.insert(
            "false".into(),
            Binding::Const {
                typ: Type::Basic(BasicKind::UntypedBool),
                value: Constant::Bool(false),
            },
        );
        scope.names.insert("nil".into(), Binding::Nil);
        for builtin in [
            Builtin::Make,
            Builtin::Close,
            Builtin::Print,
            Builtin::Println,
            Builtin::Append,
            Builtin::Cap,
            Builtin::Len,
            Builtin::New,
            Builtin::Complex,
            Builtin::Real,
            Builtin::Imag,
            Builtin::Panic,
            Builtin::Recover,
        ] {
            scope
                .names
                .insert(builtin.name().to_string(), Binding::Builtin(builtin));
        }
    }

    fn check_file(&mut self, file: &File) -> CheckResult<()> {
        self.push_scope();
        for import in &file.imports {
            let local = import
                .alias
                .clone()
                .unwrap_or_else(|| import.path.rsplit('/').next().unwrap_or("").to_string());
            if !self.packages.contains_key(&local) {
                return Err(TypeError::new(
                    format!("Unknown package {:?}", import.path),
                    import.span,
                ));
            }
            self.scopes
                .last_mut()
                .expect("file scope")
                .names
                .insert(local.clone(), Binding::Package(local));
        }
        for decl in &file.decls {
            self.push_scope();
            self.results.push(ResultsCtx {
                results: Vec::new(),
                named: false,
            });
            for stmt in &decl.body.stmts {
                self.check_stmt(stmt)?;
            }
            self.results.pop();
            self.pop_scope();
        }
        self.pop_scope();
        Ok(())
    }

    // ---- scopes ----

    fn push_scope(&mut self) {
        self.scopes.push(Scope {
            names: HashMap::new(),
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.names.get(name) {
                return Some(binding);
            }
        }
        None
    }

    fn lookup_local(&self, name: &str) -> Option<&Binding> {
        self.scopes.last().and_then(|scope| scope.names.get(name))
    }

    fn declare_var(&mut self, ident: &Ident, typ: Type) {
        self.info.defs.insert(
            ident.id,
            DefInfo {
                name: ident.name.clone(),
                typ: typ.clone(),
            },
        );
        if ident.name == "_" {
            return;
        }
        self.scopes.last_mut().expect("scope").names.insert(
            ident.name.clone(),
            Binding::Var {
                typ,
                decl_span: ident.span,
            },
        );
    }

    // ---- statements ----

    fn check_stmt(&mut self, stmt: &Stmt) -> CheckResult<()> {
        match stmt {
            Stmt::VarDecl(decl) => self.check_var_decl(decl),
            Stmt::Assign(assign) => match assign.tok {
                AssignTok::Define => self.check_define(assign),
                AssignTok::Assign => self.check_assign(assign),
            },
            Stmt::Expr(es) => {
                self.check_expr(&es.expr)?;
                Ok(())
            }
            Stmt::Send(send) => self.check_send(send),
            Stmt::IncDec(incdec) => {
                let tv = self.check_expr(&incdec.expr)?;
                let typ = self.defaulted(&incdec.expr, tv)?;
                if !typ.basic_kind().is_some_and(|k| k.is_numeric()) {
                    return Err(TypeError::new(
                        format!(
                            "Invalid operand type {} for {}",
                            typ,
                            if incdec.dec { "--" } else { "++" }
                        ),
                        incdec.span,
                    ));
                }
                self.require_addressable(&incdec.expr)
            }
            Stmt::Go(go) => {
                self.check_deferred_call(&go.call, "go")?;
                Ok(())
            }
            Stmt::Defer(defer) => {
                self.check_deferred_call(&defer.call, "defer")?;
                Ok(())
            }
            Stmt::Return(ret) => self.check_return(ret),
            Stmt::Branch(_) => Ok(()),
            Stmt::Labeled(labeled) => self.check_stmt(&labeled.stmt),
            Stmt::If(ifs) => {
                self.push_scope();
                if let Some(init) = &ifs.init {
                    self.check_stmt(init)?;
                }
                self.check_condition(&ifs.cond)?;
                self.check_block(&ifs.then)?;
                if let Some(els) = &ifs.els {
                    self.check_stmt(els)?;
                }
                self.pop_scope();
                Ok(())
            }
            Stmt::For(fors) => {
                self.push_scope();
                if let Some(init) = &fors.init {
                    self.check_stmt(init)?;
                }
                if let Some(cond) = &fors.cond {
                    self.check_condition(cond)?;
                }
                if let Some(post) = &fors.post {
                    self.check_stmt(post)?;
                }
                self.check_block(&fors.body)?;
                self.pop_scope();
                Ok(())
            }
            Stmt::Range(range) => self.check_range(range),
            Stmt::Select(select) => self.check_select(select),
            Stmt::Block(block) => self.check_block(block),
            Stmt::Empty => Ok(()),
        }
    }

    /// The operand of `go` and `defer` must be a genuine call, not a
    /// conversion.
    fn check_deferred_call(&mut self, call: &Expr, keyword: &str) -> CheckResult<()> {
        let ExprKind::Call { fun, .. } = &strip(call).kind else {
            return Err(TypeError::new(
                format!("Expected call after {}", keyword),
                call.span,
            ));
        };
        if matches!(self.classify_callee(fun)?, Callee::Conversion(_)) {
            return Err(TypeError::new(
                format!("Expected call after {}, found conversion", keyword),
                call.span,
            ));
        }
        self.check_expr(call)?;
        Ok(())
    }

    fn check_block(&mut self, block: &Block) -> CheckResult<()> {
        self.push_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt)?;
        }
        self.pop_scope();
        Ok(())
    }

    fn check_condition(&mut self, cond: &Expr) -> CheckResult<()> {
        let tv = self.check_expr(cond)?;
        if !tv.typ.is_boolean() {
            return Err(TypeError::new(
                format!("Condition must be boolean, found {}", tv.typ),
                cond.span,
            ));
        }
        Ok(())
    }

    fn check_var_decl(&mut self, decl: &VarDeclStmt) -> CheckResult<()> {
        let declared = match &decl.ty {
            Some(ty) => Some(self.resolve_type(ty)?),
            None => None,
        };

        let value_types = if decl.values.is_empty() {
            Vec::new()
        } else {
            self.check_rhs(&decl.values, decl.names.len())?
        };

        if !decl.values.is_empty() && value_types.len() != decl.names.len() {
            return Err(TypeError::new(
                format!(
                    "Declaration mismatch: {} names but {} values",
                    decl.names.len(),
                    value_types.len()
                ),
                decl.span,
            ));
        }

        for (i, name) in decl.names.iter().enumerate() {
            let typ = match (&declared, value_types.get(i)) {
                (Some(t), Some(vt)) => {
                    self.check_assignable(vt, t, decl.values.get(i), decl.span)?;
                    t.clone()
                }
                (Some(t), None) => t.clone(),
                (None, Some(vt)) => {
                    let typ = self.default_type(vt, decl.span)?;
                    if let Some(expr) = decl.values.get(i) {
                        self.convert_untyped(expr, &typ)?;
                    }
                    typ
                }
                (None, None) => unreachable!("parser requires a type or an initializer"),
            };
            self.declare_var(name, typ);
        }
        Ok(())
    }

    fn check_define(&mut self, assign: &AssignStmt) -> CheckResult<()> {
        let value_types = self.check_rhs(&assign.rhs, assign.lhs.len())?;
        if value_types.len() != assign.lhs.len() {
            return Err(TypeError::new(
                format!(
                    "Assignment mismatch: {} variables but {} values",
                    assign.lhs.len(),
                    value_types.len()
                ),
                assign.span,
            ));
        }

        let mut new_vars = 0;
        for (i, lhs) in assign.lhs.iter().enumerate() {
            let ExprKind::Ident(name) = &lhs.kind else {
                return Err(TypeError::new("Non-name on left side of :=", lhs.span));
            };
            let vt = &value_types[i];
            if name == "_" {
                new_vars += 1;
                let typ = self.default_type(vt, lhs.span)?;
                self.info.defs.insert(
                    lhs.id,
                    DefInfo {
                        name: name.clone(),
                        typ,
                    },
                );
                continue;
            }
            if let Some(Binding::Var { typ, decl_span }) = self.lookup_local(name).cloned() {
                // Redeclaration in the same scope: keep the existing variable.
                self.check_assignable(vt, &typ, assign.rhs.get(i), lhs.span)?;
                self.info.uses.insert(
                    lhs.id,
                    UseInfo::Var {
                        decl_span,
                        typ: typ.clone(),
                    },
                );
                self.info.types.insert(lhs.id, TypeAndValue::plain(typ));
            } else {
                new_vars += 1;
                let typ = self.default_type(vt, lhs.span)?;
                if let Some(expr) = assign.rhs.get(i) {
                    self.convert_untyped(expr, &typ)?;
                }
                let ident = Ident {
                    id: lhs.id,
                    name: name.clone(),
                    span: lhs.span,
                };
                self.declare_var(&ident, typ.clone());
                self.info.types.insert(lhs.id, TypeAndValue::plain(typ));
            }
        }
        if new_vars == 0 {
            return Err(TypeError::new(
                "No new variables on left side of :=",
                assign.span,
            ));
        }
        Ok(())
    }

    fn check_assign(&mut self, assign: &AssignStmt) -> CheckResult<()> {
        let mut lhs_types = Vec::with_capacity(assign.lhs.len());
        for lhs in &assign.lhs {
            if matches!(&lhs.kind, ExprKind::Ident(name) if name == "_") {
                lhs_types.push(None);
                continue;
            }
            let tv = self.check_expr(lhs)?;
            self.require_assignable_target(lhs)?;
            lhs_types.push(Some(tv.typ));
        }

        let value_types = self.check_rhs(&assign.rhs, assign.lhs.len())?;
        if value_types.len() != assign.lhs.len() {
            return Err(TypeError::new(
                format!(
                    "Assignment mismatch: {} variables but {} values",
                    assign.lhs.len(),
                    value_types.len()
                ),
                assign.span,
            ));
        }

        for (i, target) in lhs_types.iter().enumerate() {
            if let Some(target) = target {
                self.check_assignable(&value_types[i], target, assign.rhs.get(i), assign.span)?;
            }
        }
        Ok(())
    }

    /// The single-vs-multi rule shared by assignments, declarations, calls,
    /// and returns: one expression may be multi-valued when more than one
    /// value is expected.
    fn check_rhs(&mut self, exprs: &[Expr], expected: usize) -> CheckResult<Vec<Type>> {
        if exprs.len() == 1 {
            let tv = self.check_expr(&exprs[0])?;
            if let Type::Tuple(types) = &tv.typ {
                return Ok(types.as_ref().clone());
            }
            // Comma-ok forms yield a second boolean when two values are
            // expected.
            if expected == 2 && self.comma_ok_capable(&exprs[0]) {
                let pair = vec![tv.typ.clone(), Type::Basic(BasicKind::Bool)];
                self.info
                    .types
                    .insert(exprs[0].id, TypeAndValue::plain(Type::tuple(pair.clone())));
                return Ok(pair);
            }
            return Ok(vec![tv.typ]);
        }
        let mut types = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let tv = self.check_expr(expr)?;
            if matches!(tv.typ, Type::Tuple(_)) {
                return Err(TypeError::new(
                    "Multi-valued expression in single-value context",
                    expr.span,
                ));
            }
            types.push(tv.typ);
        }
        Ok(types)
    }

    fn comma_ok_capable(&self, expr: &Expr) -> bool {
        match &strip(expr).kind {
            ExprKind::Unary {
                op: UnaryOp::Recv, ..
            } => true,
            ExprKind::TypeAssert { .. } => true,
            ExprKind::Index { expr, .. } => {
                matches!(
                    self.info.type_of(expr.id).map(|t| t.underlying()),
                    Some(Type::Map(_, _))
                )
            }
            _ => false,
        }
    }

    fn check_send(&mut self, send: &SendStmt) -> CheckResult<()> {
        let chan_tv = self.check_expr(&send.chan)?;
        let Type::Chan(dir, elem) = chan_tv.typ.underlying().clone() else {
            return Err(TypeError::new(
                format!("Cannot send to non-channel type {}", chan_tv.typ),
                send.chan.span,
            ));
        };
        if !dir.can_send() {
            return Err(TypeError::new(
                "Cannot send to receive-only channel",
                send.chan.span,
            ));
        }
        let value_tv = self.check_expr(&send.value)?;
        self.check_assignable(&value_tv.typ, &elem, Some(&send.value), send.value.span)?;
        Ok(())
    }

    fn check_return(&mut self, ret: &ReturnStmt) -> CheckResult<()> {
        let (results, named) = match self.results.last() {
            Some(ctx) => (ctx.results.clone(), ctx.named),
            None => (Vec::new(), false),
        };
        if ret.results.is_empty() {
            if results.is_empty() || named {
                return Ok(());
            }
            return Err(TypeError::new("Not enough return values", ret.span));
        }
        let value_types = self.check_rhs(&ret.results, results.len())?;
        if value_types.len() != results.len() {
            return Err(TypeError::new(
                format!(
                    "Wrong number of return values: expected {}, found {}",
                    results.len(),
                    value_types.len()
                ),
                ret.span,
            ));
        }
        for (i, vt) in value_types.iter().enumerate() {
            self.check_assignable(vt, &results[i], ret.results.get(i), ret.span)?;
        }
        Ok(())
    }

    fn check_range(&mut self, range: &RangeStmt) -> CheckResult<()> {
        self.push_scope();
        let tv = self.check_expr(&range.collection)?;
        let (key_type, value_type) = match tv.typ.underlying() {
            Type::Slice(elem) => (Type::Basic(BasicKind::Int), Some(elem.as_ref().clone())),
            Type::Map(key, value) => (key.as_ref().clone(), Some(value.as_ref().clone())),
            Type::Chan(dir, elem) => {
                if !dir.can_recv() {
                    return Err(TypeError::new(
                        "Cannot range over send-only channel",
                        range.collection.span,
                    ));
                }
                (elem.as_ref().clone(), None)
            }
            Type::Basic(kind) if kind.is_string() => (
                Type::Basic(BasicKind::Int),
                Some(Type::Basic(BasicKind::Int32)),
            ),
            other => {
                return Err(TypeError::new(
                    format!("Cannot range over {}", other),
                    range.collection.span,
                ));
            }
        };
        let value_type = value_type.unwrap_or(Type::Basic(BasicKind::Int));
        let pairs = [(&range.key, key_type), (&range.value, value_type)];
        for (target, typ) in pairs {
            let Some(expr) = target else { continue };
            let ExprKind::Ident(name) = &expr.kind else {
                return Err(TypeError::new("Range target must be a name", expr.span));
            };
            if range.tok == Some(AssignTok::Define) {
                let ident = Ident {
                    id: expr.id,
                    name: name.clone(),
                    span: expr.span,
                };
                self.declare_var(&ident, typ.clone());
                self.info.types.insert(expr.id, TypeAndValue::plain(typ));
            } else {
                self.check_expr(expr)?;
            }
        }
        self.check_block(&range.body)?;
        self.pop_scope();
        Ok(())
    }

    fn check_select(&mut self, select: &SelectStmt) -> CheckResult<()> {
        for case in &select.cases {
            self.push_scope();
            match &case.comm {
                CommClause::Default => {}
                CommClause::Send(send) => self.check_send(send)?,
                CommClause::Recv { lhs, tok, chan } => {
                    let chan_tv = self.check_expr(chan)?;
                    let Type::Chan(dir, elem) = chan_tv.typ.underlying().clone() else {
                        return Err(TypeError::new(
                            format!("Cannot receive from non-channel type {}", chan_tv.typ),
                            chan.span,
                        ));
                    };
                    if !dir.can_recv() {
                        return Err(TypeError::new(
                            "Cannot receive from send-only channel",
                            chan.span,
                        ));
                    }
                    let elem = elem.as_ref().clone();
                    if lhs.len() > 2 {
                        return Err(TypeError::new("Too many targets for receive", case.span));
                    }
                    let mut value_types = vec![elem];
                    if lhs.len() == 2 {
                        value_types.push(Type::Basic(BasicKind::Bool));
                    }
                    match tok {
                        Some(AssignTok::Define) => {
                            for (i, target) in lhs.iter().enumerate() {
                                let ExprKind::Ident(name) = &target.kind else {
                                    return Err(TypeError::new(
                                        "Non-name on left side of :=",
                                        target.span,
                                    ));
                                };
                                let ident = Ident {
                                    id: target.id,
                                    name: name.clone(),
                                    span: target.span,
                                };
                                self.declare_var(&ident, value_types[i].clone());
                                self.info.types.insert(
                                    target.id,
                                    TypeAndValue::plain(value_types[i].clone()),
                                );
                            }
                        }
                        Some(AssignTok::Assign) => {
                            for (i, target) in lhs.iter().enumerate() {
                                if matches!(&target.kind, ExprKind::Ident(n) if n == "_") {
                                    continue;
                                }
                                let tv = self.check_expr(target)?;
                                self.require_assignable_target(target)?;
                                self.check_assignable(
                                    &value_types[i],
                                    &tv.typ,
                                    None,
                                    target.span,
                                )?;
                            }
                        }
                        None => {}
                    }
                }
            }
            for stmt in &case.body {
                self.check_stmt(stmt)?;
            }
            self.pop_scope();
        }
        Ok(())
    }

    // ---- expressions ----

    fn record(&mut self, expr: &Expr, tv: TypeAndValue) -> TypeAndValue {
        self.info.types.insert(expr.id, tv.clone());
        tv
    }

    fn check_expr(&mut self, expr: &Expr) -> CheckResult<TypeAndValue> {
        let tv = self.check_expr_inner(expr)?;
        Ok(self.record(expr, tv))
    }

    fn check_expr_inner(&mut self, expr: &Expr) -> CheckResult<TypeAndValue> {
        match &expr.kind {
            ExprKind::Ident(name) => self.check_ident(expr, name),
            ExprKind::IntLit(v) => Ok(TypeAndValue {
                typ: Type::Basic(BasicKind::UntypedInt),
                value: Some(Constant::Int(*v)),
            }),
            ExprKind::FloatLit(v) => Ok(TypeAndValue {
                typ: Type::Basic(BasicKind::UntypedFloat),
                value: Some(Constant::Float(*v)),
            }),
            ExprKind::ImagLit(v) => Ok(TypeAndValue {
                typ: Type::Basic(BasicKind::UntypedComplex),
                value: Some(Constant::Complex(0.0, *v)),
            }),
            ExprKind::StringLit(s) => Ok(TypeAndValue {
                typ: Type::Basic(BasicKind::UntypedString),
                value: Some(Constant::Str(s.clone())),
            }),
            ExprKind::RuneLit(c) => Ok(TypeAndValue {
                typ: Type::Basic(BasicKind::UntypedRune),
                value: Some(Constant::Int(*c as i128)),
            }),
            ExprKind::Paren(inner) => self.check_expr(inner),
            ExprKind::Unary { op, operand } => self.check_unary(expr, *op, operand),
            ExprKind::Binary { op, left, right } => self.check_binary(expr, *op, left, right),
            ExprKind::Call { fun, args } => self.check_call(expr, fun, args),
            ExprKind::Selector { expr: x, sel } => self.check_selector(expr, x, sel),
            ExprKind::Index { expr: x, index } => self.check_index(x, index),
            ExprKind::TypeAssert { expr: x, ty } => {
                let xtv = self.check_expr(x)?;
                if !xtv.typ.is_interface() {
                    return Err(TypeError::new(
                        format!("Cannot type-assert non-interface type {}", xtv.typ),
                        x.span,
                    ));
                }
                let target = self.resolve_type(ty)?;
                Ok(TypeAndValue::plain(target))
            }
            ExprKind::FuncLit(lit) => self.check_func_lit(lit),
            ExprKind::Type(_) => Err(TypeError::new("Type is not an expression", expr.span)),
        }
    }

    fn check_ident(&mut self, expr: &Expr, name: &str) -> CheckResult<TypeAndValue> {
        if name == "_" {
            return Err(TypeError::new("Cannot use _ as a value", expr.span));
        }
        match self.lookup(name).cloned() {
            Some(Binding::Var { typ, decl_span }) => {
                self.info.uses.insert(
                    expr.id,
                    UseInfo::Var {
                        decl_span,
                        typ: typ.clone(),
                    },
                );
                Ok(TypeAndValue::plain(typ))
            }
            Some(Binding::Const { typ, value }) => Ok(TypeAndValue {
                typ,
                value: Some(value),
            }),
            Some(Binding::Nil) => Ok(TypeAndValue::plain(Type::Basic(BasicKind::UntypedNil))),
            Some(Binding::TypeName(typ)) => {
                self.info.uses.insert(expr.id, UseInfo::TypeName(typ.clone()));
                Err(TypeError::new(
                    format!("Type {} is not an expression", typ),
                    expr.span,
                ))
            }
            Some(Binding::Builtin(builtin)) => {
                self.info.uses.insert(expr.id, UseInfo::Builtin(builtin));
                Err(TypeError::new(
                    format!("{} must be called", builtin.name()),
                    expr.span,
                ))
            }
            Some(Binding::Package(pkg)) => {
                self.info.uses.insert(expr.id, UseInfo::Package(pkg));
                Err(TypeError::new(
                    "Package name is not an expression",
                    expr.span,
                ))
            }
            None => Err(TypeError::new(format!("Undefined: {}", name), expr.span)),
        }
    }

    fn check_unary(
        &mut self,
        expr: &Expr,
        op: UnaryOp,
        operand: &Expr,
    ) -> CheckResult<TypeAndValue> {
        if op == UnaryOp::Recv {
            let tv = self.check_expr(operand)?;
            let Type::Chan(dir, elem) = tv.typ.underlying().clone() else {
                return Err(TypeError::new(
                    format!("Cannot receive from non-channel type {}", tv.typ),
                    operand.span,
                ));
            };
            if !dir.can_recv() {
                return Err(TypeError::new(
                    "Cannot receive from send-only channel",
                    operand.span,
                ));
            }
            return Ok(TypeAndValue::plain(elem.as_ref().clone()));
        }

        if op == UnaryOp::Addr {
            let tv = self.check_expr(operand)?;
            self.require_addressable(operand)?;
            let typ = self.defaulted(operand, tv)?;
            return Ok(TypeAndValue::plain(Type::pointer(typ)));
        }

        if op == UnaryOp::Deref {
            let tv = self.check_expr(operand)?;
            let Type::Pointer(elem) = tv.typ.underlying().clone() else {
                return Err(TypeError::new(
                    format!("Cannot dereference non-pointer type {}", tv.typ),
                    operand.span,
                ));
            };
            return Ok(TypeAndValue::plain(elem.as_ref().clone()));
        }

        let tv = self.check_expr(operand)?;
        let kind = tv.typ.basic_kind().ok_or_else(|| {
            TypeError::new(
                format!("Invalid operand type {} for unary operator", tv.typ),
                expr.span,
            )
        })?;
        let valid = match op {
            UnaryOp::Neg | UnaryOp::Pos => kind.is_numeric(),
            UnaryOp::BitNot => kind.is_integer(),
            UnaryOp::Not => kind.is_boolean(),
            _ => unreachable!("handled above"),
        };
        if !valid {
            return Err(TypeError::new(
                format!("Invalid operand type {} for unary operator", tv.typ),
                expr.span,
            ));
        }
        if let Some(value) = tv.value {
            let folded = match op {
                UnaryOp::Neg => value.neg(),
                UnaryOp::Pos => Ok(value),
                UnaryOp::BitNot => value.bit_not(),
                UnaryOp::Not => value.not(),
                _ => unreachable!("handled above"),
            }
            .map_err(|msg| TypeError::new(msg, expr.span))?;
            return Ok(TypeAndValue {
                typ: tv.typ,
                value: Some(folded),
            });
        }
        Ok(TypeAndValue::plain(tv.typ))
    }

    fn check_binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> CheckResult<TypeAndValue> {
        let ltv = self.check_expr(left)?;
        let rtv = self.check_expr(right)?;

        match op {
            BinaryOp::LogAnd | BinaryOp::LogOr => {
                if !ltv.typ.is_boolean() || !rtv.typ.is_boolean() {
                    return Err(TypeError::new(
                        format!(
                            "Invalid operands to {}: {}, {}",
                            op.symbol(),
                            ltv.typ,
                            rtv.typ
                        ),
                        expr.span,
                    ));
                }
                let typ = if ltv.typ.is_typed() {
                    ltv.typ.clone()
                } else if rtv.typ.is_typed() {
                    rtv.typ.clone()
                } else {
                    Type::Basic(BasicKind::UntypedBool)
                };
                let value = match (&ltv.value, &rtv.value) {
                    (Some(a), Some(b)) => Some(Constant::Bool(match op {
                        BinaryOp::LogAnd => a.as_bool() && b.as_bool(),
                        _ => a.as_bool() || b.as_bool(),
                    })),
                    _ => None,
                };
                Ok(TypeAndValue { typ, value })
            }
            BinaryOp::Shl | BinaryOp::Shr => self.check_shift(expr, op, ltv, right, rtv),
            op if op.is_comparison() => self.check_comparison(expr, op, left, ltv, right, rtv),
            _ => self.check_arith(expr, op, left, ltv, right, rtv),
        }
    }

    fn check_shift(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        ltv: TypeAndValue,
        right: &Expr,
        rtv: TypeAndValue,
    ) -> CheckResult<TypeAndValue> {
        if !ltv.typ.basic_kind().is_some_and(|k| k.is_integer()) {
            return Err(TypeError::new(
                format!("Invalid shift operand type {}", ltv.typ),
                expr.span,
            ));
        }
        if !rtv.typ.basic_kind().is_some_and(|k| k.is_integer()) {
            return Err(TypeError::new(
                format!("Shift count must be an integer, found {}", rtv.typ),
                right.span,
            ));
        }
        if let Some(Constant::Int(v)) = &rtv.value {
            if *v < 0 {
                return Err(TypeError::new("Negative shift count", right.span));
            }
        }
        if let (Some(lv), Some(rv)) = (&ltv.value, &rtv.value) {
            let folded = match op {
                BinaryOp::Shl => lv.clone().shift_left(rv),
                _ => lv.clone().shift_right(rv),
            }
            .map_err(|msg| TypeError::new(msg, expr.span))?;
            return Ok(TypeAndValue {
                typ: ltv.typ,
                value: Some(folded),
            });
        }
        let typ = if ltv.typ.is_untyped() {
            Type::Basic(BasicKind::Int)
        } else {
            ltv.typ
        };
        Ok(TypeAndValue::plain(typ))
    }

    fn check_comparison(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        ltv: TypeAndValue,
        right: &Expr,
        rtv: TypeAndValue,
    ) -> CheckResult<TypeAndValue> {
        let ordered = matches!(
            op,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        );

        // nil comparisons: the other side must be nilable.
        if ltv.typ.is_untyped_nil() || rtv.typ.is_untyped_nil() {
            if ordered {
                return Err(TypeError::new("Cannot order nil", expr.span));
            }
            let other = if ltv.typ.is_untyped_nil() { &rtv } else { &ltv };
            if !other.typ.is_untyped_nil() && !other.typ.is_nilable() {
                return Err(TypeError::new(
                    format!("Cannot compare {} with nil", other.typ),
                    expr.span,
                ));
            }
            return Ok(TypeAndValue::plain(Type::Basic(BasicKind::UntypedBool)));
        }

        // Untyped sides take the typed side's type.
        if ltv.typ.is_typed() && rtv.typ.is_untyped() {
            self.convert_untyped(right, &ltv.typ)?;
        } else if rtv.typ.is_typed() && ltv.typ.is_untyped() {
            self.convert_untyped(left, &rtv.typ)?;
        } else if ltv.typ.is_typed() && rtv.typ.is_typed() && ltv.typ != rtv.typ {
            let comparable_mix = ltv.typ.is_interface() || rtv.typ.is_interface();
            if !comparable_mix {
                return Err(TypeError::new(
                    format!("Mismatched types {} and {}", ltv.typ, rtv.typ),
                    expr.span,
                ));
            }
        }

        if ordered {
            let kind = ltv
                .typ
                .basic_kind()
                .or_else(|| rtv.typ.basic_kind())
                .unwrap_or(BasicKind::Bool);
            if !kind.is_ordered() {
                return Err(TypeError::new(
                    format!("Operator {} not defined on {}", op.symbol(), ltv.typ),
                    expr.span,
                ));
            }
        }

        let value = match (&ltv.value, &rtv.value) {
            (Some(a), Some(b)) => {
                let result = match op {
                    BinaryOp::Eq => a.equal(b),
                    BinaryOp::NotEq => !a.equal(b),
                    _ => {
                        let ord = a.compare(b).map_err(|msg| TypeError::new(msg, expr.span))?;
                        match op {
                            BinaryOp::Lt => ord.is_lt(),
                            BinaryOp::LtEq => ord.is_le(),
                            BinaryOp::Gt => ord.is_gt(),
                            _ => ord.is_ge(),
                        }
                    }
                };
                Some(Constant::Bool(result))
            }
            _ => None,
        };
        Ok(TypeAndValue {
            typ: Type::Basic(BasicKind::UntypedBool),
            value,
        })
    }

    fn check_arith(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        ltv: TypeAndValue,
        right: &Expr,
        rtv: TypeAndValue,
    ) -> CheckResult<TypeAndValue> {
        // Constant folding happens before any typing decisions.
        if let (Some(a), Some(b)) = (ltv.value.clone(), rtv.value.clone()) {
            let folded = match op {
                BinaryOp::Add => a.add(b),
                BinaryOp::Sub => a.sub(b),
                BinaryOp::Mul => a.mul(b),
                BinaryOp::Div => a.div(b),
                BinaryOp::Rem => a.rem(b),
                BinaryOp::And => a.bit_and(b),
                BinaryOp::Or => a.bit_or(b),
                BinaryOp::Xor => a.bit_xor(b),
                BinaryOp::AndNot => a.bit_and_not(b),
                _ => unreachable!("non-arithmetic operator in check_arith"),
            }
            .map_err(|msg| TypeError::new(msg, expr.span))?;
            let typ = if ltv.typ.is_typed() {
                ltv.typ
            } else if rtv.typ.is_typed() {
                rtv.typ
            } else {
                self.promote_untyped(&ltv.typ, &rtv.typ)
            };
            if let Some(kind) = typ.basic_kind() {
                if typ.is_typed() && !folded.representable(kind) {
                    return Err(TypeError::new(
                        format!("Constant overflows {}", typ),
                        expr.span,
                    ));
                }
            }
            return Ok(TypeAndValue {
                typ,
                value: Some(folded),
            });
        }

        let typ = if ltv.typ.is_typed() && rtv.typ.is_untyped() {
            self.convert_untyped(right, &ltv.typ)?;
            ltv.typ.clone()
        } else if rtv.typ.is_typed() && ltv.typ.is_untyped() {
            self.convert_untyped(left, &rtv.typ)?;
            rtv.typ.clone()
        } else if ltv.typ == rtv.typ {
            ltv.typ.clone()
        } else {
            return Err(TypeError::new(
                format!("Mismatched types {} and {}", ltv.typ, rtv.typ),
                expr.span,
            ));
        };

        let kind = typ.basic_kind().ok_or_else(|| {
            TypeError::new(
                format!("Invalid operands to {}: {}", op.symbol(), typ),
                expr.span,
            )
        })?;
        let valid = match op {
            BinaryOp::Add => kind.is_numeric() || kind.is_string(),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => kind.is_numeric(),
            BinaryOp::Rem | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::AndNot => {
                kind.is_integer()
            }
            _ => false,
        };
        if !valid {
            return Err(TypeError::new(
                format!("Operator {} not defined on {}", op.symbol(), typ),
                expr.span,
            ));
        }
        Ok(TypeAndValue::plain(typ))
    }

    fn promote_untyped(&self, a: &Type, b: &Type) -> Type {
        fn rank(kind: BasicKind) -> u8 {
            match kind {
                BasicKind::UntypedInt => 0,
                BasicKind::UntypedRune => 1,
                BasicKind::UntypedFloat => 2,
                BasicKind::UntypedComplex => 3,
                _ => 4,
            }
        }
        let (Some(ka), Some(kb)) = (a.basic_kind(), b.basic_kind()) else {
            return a.clone();
        };
        if rank(ka) >= rank(kb) {
            a.clone()
        } else {
            b.clone()
        }
    }

    fn check_selector(&mut self, expr: &Expr, x: &Expr, sel: &Ident) -> CheckResult<TypeAndValue> {
        // Qualified identifier: a package member.
        if let ExprKind::Ident(name) = &x.kind {
            if let Some(Binding::Package(pkg)) = self.lookup(name).cloned() {
                self.info.uses.insert(x.id, UseInfo::Package(pkg.clone()));
                let info = self.packages.get(&pkg).expect("imported package");
                let Some(typ) = info.exports.get(&sel.name).cloned() else {
                    return Err(TypeError::new(
                        format!("Undefined: {}.{}", pkg, sel.name),
                        sel.span,
                    ));
                };
                self.info.uses.insert(
                    sel.id,
                    UseInfo::PackageExport {
                        pkg,
                        name: sel.name.clone(),
                        typ: typ.clone(),
                    },
                );
                return Ok(TypeAndValue::plain(typ));
            }
        }

        let xtv = self.check_expr(x)?;
        let (base, indirect) = match xtv.typ.underlying() {
            Type::Pointer(elem) => (elem.as_ref().clone(), true),
            other => (other.clone(), false),
        };
        let Type::Struct(st) = base.underlying() else {
            return Err(TypeError::new(
                format!("Type {} has no field {}", xtv.typ, sel.name),
                sel.span,
            ));
        };
        let Some(index) = st.fields.iter().position(|f| f.name == sel.name) else {
            return Err(TypeError::new(
                format!("Type {} has no field {}", xtv.typ, sel.name),
                sel.span,
            ));
        };
        let field_type = st.fields[index].typ.clone();
        self.info.selections.insert(
            expr.id,
            Selection {
                index,
                indirect,
                typ: field_type.clone(),
            },
        );
        Ok(TypeAndValue::plain(field_type))
    }

    fn check_index(&mut self, x: &Expr, index: &Expr) -> CheckResult<TypeAndValue> {
        let xtv = self.check_expr(x)?;
        match xtv.typ.underlying().clone() {
            Type::Map(key, value) => {
                let ktv = self.check_expr(index)?;
                self.check_assignable(&ktv.typ, &key, Some(index), index.span)?;
                Ok(TypeAndValue::plain(value.as_ref().clone()))
            }
            Type::Slice(elem) => {
                self.check_integer_index(index)?;
                Ok(TypeAndValue::plain(elem.as_ref().clone()))
            }
            Type::Array(_, elem) => {
                self.check_integer_index(index)?;
                Ok(TypeAndValue::plain(elem.as_ref().clone()))
            }
            Type::Basic(kind) if kind.is_string() => {
                self.check_integer_index(index)?;
                Ok(TypeAndValue::plain(Type::Basic(BasicKind::Uint8)))
            }
            other => Err(TypeError::new(
                format!("Cannot index type {}", other),
                x.span,
            )),
        }
    }

    fn check_integer_index(&mut self, index: &Expr) -> CheckResult<()> {
        let tv = self.check_expr(index)?;
        if !tv.typ.basic_kind().is_some_and(|k| k.is_integer()) {
            return Err(TypeError::new(
                format!("Index must be an integer, found {}", tv.typ),
                index.span,
            ));
        }
        self.convert_untyped(index, &Type::Basic(BasicKind::Int))?;
        Ok(())
    }

    fn check_func_lit(&mut self, lit: &FuncLit) -> CheckResult<TypeAndValue> {
        let sig = self.resolve_signature(&lit.sig)?;
        let named_results = lit.sig.results.iter().any(|r| r.name.is_some());

        self.push_scope();
        for (i, param) in lit.sig.params.iter().enumerate() {
            if let Some(name) = &param.name {
                if name.name != "_" {
                    self.declare_var(name, sig.params[i].clone());
                }
            }
        }
        for (i, result) in lit.sig.results.iter().enumerate() {
            if let Some(name) = &result.name {
                if name.name != "_" {
                    self.declare_var(name, sig.results[i].clone());
                }
            }
        }
        self.results.push(ResultsCtx {
            results: sig.results.clone(),
            named: named_results,
        });
        for stmt in &lit.body.stmts {
            self.check_stmt(stmt)?;
        }
        self.results.pop();
        self.pop_scope();

        Ok(TypeAndValue::plain(Type::Func(Arc::new(sig))))
    }

    // ---- calls ----

    fn check_call(&mut self, expr: &Expr, fun: &Expr, args: &[Expr]) -> CheckResult<TypeAndValue> {
        match self.classify_callee(fun)? {
            Callee::Builtin(builtin) => self.check_builtin_call(expr, builtin, args),
            Callee::Conversion(target) => self.check_conversion(expr, target, args),
            Callee::Value => {
                let ftv = self.check_expr(fun)?;
                let Type::Func(sig) = ftv.typ.underlying().clone() else {
                    return Err(TypeError::new(
                        format!("Cannot call non-function type {}", ftv.typ),
                        fun.span,
                    ));
                };
                self.check_call_args(&sig, args, expr.span)?;
                Ok(TypeAndValue::plain(match sig.results.len() {
                    0 => Type::tuple(Vec::new()),
                    1 => sig.results[0].clone(),
                    _ => Type::tuple(sig.results.clone()),
                }))
            }
        }
    }

    fn classify_callee(&mut self, fun: &Expr) -> CheckResult<Callee> {
        match &fun.kind {
            ExprKind::Ident(name) => match self.lookup(name).cloned() {
                Some(Binding::Builtin(builtin)) => {
                    self.info.uses.insert(fun.id, UseInfo::Builtin(builtin));
                    Ok(Callee::Builtin(builtin))
                }
                Some(Binding::TypeName(typ)) => {
                    self.info.uses.insert(fun.id, UseInfo::TypeName(typ.clone()));
                    self.info
                        .types
                        .insert(fun.id, TypeAndValue::plain(typ.clone()));
                    Ok(Callee::Conversion(typ))
                }
                _ => Ok(Callee::Value),
            },
            ExprKind::Type(ty) => {
                let typ = self.resolve_type(ty)?;
                self.info
                    .types
                    .insert(fun.id, TypeAndValue::plain(typ.clone()));
                Ok(Callee::Conversion(typ))
            }
            ExprKind::Paren(inner) => self.classify_callee(inner),
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => match self.classify_callee(operand)? {
                Callee::Conversion(typ) => {
                    let ptr = Type::pointer(typ);
                    self.info
                        .types
                        .insert(fun.id, TypeAndValue::plain(ptr.clone()));
                    Ok(Callee::Conversion(ptr))
                }
                _ => Ok(Callee::Value),
            },
            _ => Ok(Callee::Value),
        }
    }

    fn check_builtin_call(
        &mut self,
        expr: &Expr,
        builtin: Builtin,
        args: &[Expr],
    ) -> CheckResult<TypeAndValue> {
        match builtin {
            Builtin::Make => {
                let Some(first) = args.first() else {
                    return Err(TypeError::new("Missing argument to make", expr.span));
                };
                let target = self.type_from_arg(first)?;
                self.info
                    .types
                    .insert(first.id, TypeAndValue::plain(target.clone()));
                let extra = &args[1..];
                match target.underlying() {
                    Type::Chan(_, _) | Type::Map(_, _) => {
                        if extra.len() > 1 {
                            return Err(TypeError::new("Too many arguments to make", expr.span));
                        }
                    }
                    Type::Slice(_) => {
                        if extra.is_empty() {
                            return Err(TypeError::new(
                                "Missing length argument to make",
                                expr.span,
                            ));
                        }
                        if extra.len() > 2 {
                            return Err(TypeError::new("Too many arguments to make", expr.span));
                        }
                    }
                    other => {
                        return Err(TypeError::new(
                            format!("Cannot make type {}", other),
                            expr.span,
                        ));
                    }
                }
                for arg in extra {
                    self.check_integer_index(arg)?;
                }
                Ok(TypeAndValue::plain(target))
            }
            Builtin::Close => {
                if args.len() != 1 {
                    return Err(TypeError::new("close takes one argument", expr.span));
                }
                let tv = self.check_expr(&args[0])?;
                let Type::Chan(dir, _) = tv.typ.underlying() else {
                    return Err(TypeError::new(
                        format!("Cannot close non-channel type {}", tv.typ),
                        args[0].span,
                    ));
                };
                if !dir.can_send() {
                    return Err(TypeError::new(
                        "Cannot close receive-only channel",
                        args[0].span,
                    ));
                }
                Ok(TypeAndValue::plain(Type::tuple(Vec::new())))
            }
            Builtin::Print | Builtin::Println => {
                for arg in args {
                    let tv = self.check_expr(arg)?;
                    if tv.typ.is_untyped() && !tv.typ.is_untyped_nil() {
                        let default = self.default_type(&tv.typ, arg.span)?;
                        self.convert_untyped(arg, &default)?;
                    }
                }
                Ok(TypeAndValue::plain(Type::tuple(Vec::new())))
            }
            Builtin::Len | Builtin::Cap => {
                if args.len() != 1 {
                    return Err(TypeError::new(
                        format!("{} takes one argument", builtin.name()),
                        expr.span,
                    ));
                }
                self.check_expr(&args[0])?;
                Ok(TypeAndValue::plain(Type::Basic(BasicKind::Int)))
            }
            Builtin::New => {
                let Some(first) = args.first() else {
                    return Err(TypeError::new("Missing argument to new", expr.span));
                };
                let target = self.type_from_arg(first)?;
                self.info
                    .types
                    .insert(first.id, TypeAndValue::plain(target.clone()));
                Ok(TypeAndValue::plain(Type::pointer(target)))
            }
            Builtin::Append => {
                let Some(first) = args.first() else {
                    return Err(TypeError::new("Missing argument to append", expr.span));
                };
                let tv = self.check_expr(first)?;
                for arg in &args[1..] {
                    self.check_expr(arg)?;
                }
                Ok(TypeAndValue::plain(tv.typ))
            }
            Builtin::Complex => {
                for arg in args {
                    self.check_expr(arg)?;
                }
                Ok(TypeAndValue::plain(Type::Basic(BasicKind::Complex128)))
            }
            Builtin::Real | Builtin::Imag => {
                for arg in args {
                    self.check_expr(arg)?;
                }
                Ok(TypeAndValue::plain(Type::Basic(BasicKind::Float64)))
            }
            Builtin::Panic => {
                for arg in args {
                    self.check_expr(arg)?;
                }
                Ok(TypeAndValue::plain(Type::tuple(Vec::new())))
            }
            Builtin::Recover => Ok(TypeAndValue::plain(Type::Interface)),
        }
    }

    fn type_from_arg(&mut self, arg: &Expr) -> CheckResult<Type> {
        match &arg.kind {
            ExprKind::Type(ty) => self.resolve_type(ty),
            ExprKind::Ident(name) => match self.lookup(name).cloned() {
                Some(Binding::TypeName(typ)) => {
                    self.info.uses.insert(arg.id, UseInfo::TypeName(typ.clone()));
                    Ok(typ)
                }
                _ => Err(TypeError::new("Expected a type", arg.span)),
            },
            _ => Err(TypeError::new("Expected a type", arg.span)),
        }
    }

    fn check_conversion(
        &mut self,
        expr: &Expr,
        target: Type,
        args: &[Expr],
    ) -> CheckResult<TypeAndValue> {
        if args.len() != 1 {
            return Err(TypeError::new(
                format!("Conversion to {} takes one argument", target),
                expr.span,
            ));
        }
        let tv = self.check_expr(&args[0])?;

        if tv.typ.is_untyped_nil() {
            if !target.is_nilable() {
                return Err(TypeError::new(
                    format!("Cannot convert nil to {}", target),
                    expr.span,
                ));
            }
            return Ok(TypeAndValue::plain(target));
        }

        // Constant conversions stay constant when the target is basic.
        if let (Some(value), Some(kind)) = (&tv.value, target.basic_kind()) {
            if !kind.is_untyped() {
                let converted = convert_constant(value, kind).ok_or_else(|| {
                    TypeError::new(format!("Cannot convert {} to {}", value, target), expr.span)
                })?;
                return Ok(TypeAndValue {
                    typ: target,
                    value: Some(converted),
                });
            }
        }

        if !self.convertible(&tv.typ, &target) {
            return Err(TypeError::new(
                format!("Cannot convert {} to {}", tv.typ, target),
                expr.span,
            ));
        }
        Ok(TypeAndValue::plain(target))
    }

    fn convertible(&self, from: &Type, to: &Type) -> bool {
        if from == to || from.underlying() == to.underlying() {
            return true;
        }
        if to.is_interface() {
            return true;
        }
        if let (Some(fk), Some(tk)) = (from.basic_kind(), to.basic_kind()) {
            if fk.is_numeric() && tk.is_numeric() {
                return true;
            }
            if fk.is_integer() && tk.is_string() {
                return true;
            }
            if fk.is_string() && tk.is_string() {
                return true;
            }
        }
        // string <-> []byte / []rune
        let string_side = |t: &Type| t.basic_kind().is_some_and(|k| k.is_string());
        let char_slice = |t: &Type| {
            matches!(t.underlying(), Type::Slice(elem)
                if matches!(elem.basic_kind(), Some(BasicKind::Uint8) | Some(BasicKind::Int32)))
        };
        if (string_side(from) && char_slice(to)) || (char_slice(from) && string_side(to)) {
            return true;
        }
        false
    }

    fn check_call_args(&mut self, sig: &Signature, args: &[Expr], span: Span) -> CheckResult<()> {
        let arg_types = if args.len() == 1 && !sig.params.is_empty() {
            let tv = self.check_expr(&args[0])?;
            match &tv.typ {
                Type::Tuple(types) if types.len() == sig.params.len() && !sig.variadic => {
                    types.as_ref().clone()
                }
                Type::Tuple(types) if types.len() > 1 => {
                    return Err(TypeError::new(
                        format!(
                            "Wrong number of arguments: expected {}, found {}",
                            sig.params.len(),
                            types.len()
                        ),
                        span,
                    ));
                }
                _ => vec![tv.typ],
            }
        } else {
            let mut types = Vec::with_capacity(args.len());
            for arg in args {
                let tv = self.check_expr(arg)?;
                if matches!(tv.typ, Type::Tuple(_)) {
                    return Err(TypeError::new(
                        "Multi-valued expression in single-value context",
                        arg.span,
                    ));
                }
                types.push(tv.typ);
            }
            types
        };

        let fixed = if sig.variadic {
            sig.params.len() - 1
        } else {
            sig.params.len()
        };

        if sig.variadic {
            if arg_types.len() < fixed {
                return Err(TypeError::new(
                    format!(
                        "Not enough arguments: expected at least {}, found {}",
                        fixed,
                        arg_types.len()
                    ),
                    span,
                ));
            }
        } else if arg_types.len() != sig.params.len() {
            return Err(TypeError::new(
                format!(
                    "Wrong number of arguments: expected {}, found {}",
                    sig.params.len(),
                    arg_types.len()
                ),
                span,
            ));
        }

        for (i, at) in arg_types.iter().enumerate() {
            let param = if i < fixed {
                sig.params[i].clone()
            } else {
                match sig.params[sig.params.len() - 1].underlying() {
                    Type::Slice(elem) => elem.as_ref().clone(),
                    other => other.clone(),
                }
            };
            self.check_assignable(at, &param, args.get(i), span)?;
        }
        Ok(())
    }

    // ---- assignability and untyped conversion ----

    fn check_assignable(
        &mut self,
        src: &Type,
        dst: &Type,
        src_expr: Option<&Expr>,
        span: Span,
    ) -> CheckResult<()> {
        if src.is_untyped_nil() {
            if dst.is_nilable() {
                return Ok(());
            }
            return Err(TypeError::new(format!("Cannot assign nil to {}", dst), span));
        }
        if src.is_untyped() {
            if let Some(expr) = src_expr {
                return self.convert_untyped(expr, dst);
            }
            // No expression to retype; check kind compatibility only.
            let target = if dst.is_interface() {
                self.default_type(src, span)?
            } else {
                dst.clone()
            };
            let (Some(sk), Some(tk)) = (src.basic_kind(), target.basic_kind()) else {
                return Err(TypeError::new(
                    format!("Cannot use {} as {}", src, dst),
                    span,
                ));
            };
            let ok = (sk.is_numeric() && tk.is_numeric())
                || (sk.is_boolean() && tk.is_boolean())
                || (sk.is_string() && tk.is_string());
            if !ok {
                return Err(TypeError::new(
                    format!("Cannot use {} as {}", src, dst),
                    span,
                ));
            }
            return Ok(());
        }
        if src == dst || dst.is_interface() {
            return Ok(());
        }
        // A bidirectional channel is assignable to a directional view.
        if let (Type::Chan(ChanDir::Both, selem), Type::Chan(_, delem)) =
            (src.underlying(), dst.underlying())
        {
            if selem == delem {
                return Ok(());
            }
        }
        // A named type and its underlying type are mutually assignable.
        if src.underlying() == dst.underlying()
            && (matches!(src, Type::Named(_)) != matches!(dst, Type::Named(_)))
        {
            return Ok(());
        }
        Err(TypeError::new(
            format!("Cannot use {} as {}", src, dst),
            span,
        ))
    }

    /// Rewrites the recorded type of an untyped expression (and its constant,
    /// if any) to the given typed destination, checking representability.
    fn convert_untyped(&mut self, expr: &Expr, target: &Type) -> CheckResult<()> {
        let Some(tv) = self.info.types.get(&expr.id).cloned() else {
            return Ok(());
        };
        if tv.typ.is_typed() || tv.typ.is_untyped_nil() {
            return Ok(());
        }
        let dest = if target.is_interface() {
            self.default_type(&tv.typ, expr.span)?
        } else {
            target.clone()
        };
        let Some(kind) = dest.basic_kind() else {
            return Err(TypeError::new(
                format!("Cannot use {} as {}", tv.typ, target),
                expr.span,
            ));
        };
        let sk = tv.typ.basic_kind().expect("untyped kinds are basic");
        let compatible = (sk.is_numeric() && kind.is_numeric())
            || (sk.is_boolean() && kind.is_boolean())
            || (sk.is_string() && kind.is_string());
        if !compatible {
            return Err(TypeError::new(
                format!("Cannot use {} as {}", tv.typ, target),
                expr.span,
            ));
        }
        let value = match tv.value {
            Some(value) => {
                if !value.representable(kind) {
                    return Err(TypeError::new(
                        format!("Constant {} overflows {}", value, dest),
                        expr.span,
                    ));
                }
                Some(convert_constant(&value, kind).expect("representable constant converts"))
            }
            None => None,
        };
        self.info
            .types
            .insert(expr.id, TypeAndValue { typ: dest, value });
        Ok(())
    }

    fn default_type(&self, typ: &Type, span: Span) -> CheckResult<Type> {
        if typ.is_untyped_nil() {
            return Err(TypeError::new("Cannot infer a type from nil", span));
        }
        match typ {
            Type::Basic(kind) if kind.is_untyped() => Ok(Type::Basic(kind.default_kind())),
            other => Ok(other.clone()),
        }
    }

    fn defaulted(&mut self, expr: &Expr, tv: TypeAndValue) -> CheckResult<Type> {
        if tv.typ.is_untyped() {
            let default = self.default_type(&tv.typ, expr.span)?;
            self.convert_untyped(expr, &default)?;
            Ok(default)
        } else {
            Ok(tv.typ)
        }
    }

    fn require_addressable(&mut self, expr: &Expr) -> CheckResult<()> {
        if self.is_addressable(expr) {
            Ok(())
        } else {
            Err(TypeError::new(
                "Cannot take the address of this expression",
                expr.span,
            ))
        }
    }

    fn is_addressable(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Ident(name) => matches!(self.lookup(name), Some(Binding::Var { .. })),
            ExprKind::Paren(inner) => self.is_addressable(inner),
            ExprKind::Unary {
                op: UnaryOp::Deref, ..
            } => true,
            ExprKind::Selector { expr, .. } => {
                self.is_addressable(expr)
                    || self
                        .info
                        .type_of(expr.id)
                        .is_some_and(|t| matches!(t.underlying(), Type::Pointer(_)))
            }
            ExprKind::Index { expr, .. } => {
                matches!(
                    self.info.type_of(expr.id).map(|t| t.underlying()),
                    Some(Type::Slice(_))
                )
            }
            _ => false,
        }
    }

    fn require_assignable_target(&mut self, expr: &Expr) -> CheckResult<()> {
        let is_map_index = matches!(&expr.kind, ExprKind::Index { expr: x, .. }
            if matches!(self.info.type_of(x.id).map(|t| t.underlying()), Some(Type::Map(_, _))));
        if is_map_index || self.is_addressable(expr) {
            Ok(())
        } else {
            Err(TypeError::new(
                "Cannot assign to this expression",
                expr.span,
            ))
        }
    }

    // ---- type resolution ----

    fn resolve_type(&mut self, ty: &TypeExpr) -> CheckResult<Type> {
        match &ty.kind {
            TypeExprKind::Name(name) => match self.lookup(&name.name).cloned() {
                Some(Binding::TypeName(typ)) => Ok(typ),
                Some(_) => Err(TypeError::new(
                    format!("{} is not a type", name.name),
                    name.span,
                )),
                None => Err(TypeError::new(
                    format!("Undefined type {}", name.name),
                    name.span,
                )),
            },
            TypeExprKind::Qualified { pkg, name } => Err(TypeError::new(
                format!("Undefined type {}.{}", pkg.name, name.name),
                ty.span,
            )),
            TypeExprKind::Pointer(elem) => Ok(Type::pointer(self.resolve_type(elem)?)),
            TypeExprKind::Slice(elem) => Ok(Type::slice(self.resolve_type(elem)?)),
            TypeExprKind::Array { len, elem } => {
                let len_tv = self.check_expr(len)?;
                let Some(Constant::Int(n)) = len_tv.value else {
                    return Err(TypeError::new(
                        "Array length must be a constant integer",
                        len.span,
                    ));
                };
                if n < 0 {
                    return Err(TypeError::new("Array length must not be negative", len.span));
                }
                Ok(Type::Array(n as u64, Arc::new(self.resolve_type(elem)?)))
            }
            TypeExprKind::Map { key, value } => Ok(Type::map_of(
                self.resolve_type(key)?,
                self.resolve_type(value)?,
            )),
            TypeExprKind::Chan { dir, elem } => {
                let dir = match dir {
                    ChanDirExpr::Both => ChanDir::Both,
                    ChanDirExpr::SendOnly => ChanDir::SendOnly,
                    ChanDirExpr::RecvOnly => ChanDir::RecvOnly,
                };
                Ok(Type::chan(dir, self.resolve_type(elem)?))
            }
            TypeExprKind::Func(sig) => Ok(Type::Func(Arc::new(self.resolve_signature(sig)?))),
            TypeExprKind::Struct { fields } => {
                let mut resolved = Vec::with_capacity(fields.len());
                for field in fields {
                    resolved.push(StructField {
                        name: field.name.name.clone(),
                        typ: self.resolve_type(&field.ty)?,
                    });
                }
                Ok(Type::Struct(Arc::new(StructType { fields: resolved })))
            }
            TypeExprKind::Interface => Ok(Type::Interface),
        }
    }

    fn resolve_signature(&mut self, sig: &FuncTypeExpr) -> CheckResult<Signature> {
        let mut params = Vec::with_capacity(sig.params.len());
        for (i, param) in sig.params.iter().enumerate() {
            let typ = self.resolve_type(&param.ty)?;
            if sig.variadic && i == sig.params.len() - 1 {
                params.push(Type::slice(typ));
            } else {
                params.push(typ);
            }
        }
        let mut results = Vec::with_capacity(sig.results.len());
        for result in &sig.results {
            results.push(self.resolve_type(&result.ty)?);
        }
        Ok(Signature {
            params,
            variadic: sig.variadic,
            results,
        })
    }
}

enum Callee {
    Builtin(Builtin),
    Conversion(Type),
    Value,
}

fn strip(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Paren(inner) => strip(inner),
        _ => expr,
    }
}

/// Converts a constant to the representation of the given typed kind,
/// truncating and wrapping the way a runtime conversion would.
pub fn convert_constant(value: &Constant, kind: BasicKind) -> Option<Constant> {
    let kind = kind.default_kind();
    match kind {
        BasicKind::Bool => match value {
            Constant::Bool(b) => Some(Constant::Bool(*b)),
            _ => None,
        },
        BasicKind::String => match value {
            Constant::Str(s) => Some(Constant::Str(s.clone())),
            Constant::Int(v) => {
                let ch = char::from_u32(*v as u32).unwrap_or('\u{FFFD}');
                Some(Constant::Str(ch.to_string()))
            }
            _ => None,
        },
        k if k.is_integer() => {
            let v = match value {
                Constant::Int(v) => *v,
                Constant::Float(f) => *f as i128,
                _ => return None,
            };
            let wrapped: i128 = match k {
                BasicKind::Int | BasicKind::Int64 => v as i64 as i128,
                BasicKind::Int8 => v as i8 as i128,
                BasicKind::Int16 => v as i16 as i128,
                BasicKind::Int32 => v as i32 as i128,
                BasicKind::Uint | BasicKind::Uint64 | BasicKind::Uintptr => v as u64 as i128,
                BasicKind::Uint8 => v as u8 as i128,
                BasicKind::Uint16 => v as u16 as i128,
                BasicKind::Uint32 => v as u32 as i128,
                _ => v,
            };
            Some(Constant::Int(wrapped))
        }
        BasicKind::Float32 => Some(Constant::Float(value.as_f64() as f32 as f64)),
        BasicKind::Float64 => Some(Constant::Float(value.as_f64())),
        BasicKind::Complex64 | BasicKind::Complex128 => {
            let (re, im) = value.as_complex();
            Some(Constant::Complex(re, im))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_file;

    fn check(body: &str) -> Result<TypeInfo, TypeError> {
        let src = format!("package p;func _(){{{}\n}}", body);
        let file = parse_file(&src).expect("parse");
        check_file(&file, &HashMap::new())
    }

    fn last_expr_type(body: &str) -> String {
        let src = format!("package p;func _(){{{}\n}}", body);
        let file = parse_file(&src).expect("parse");
        let info = check_file(&file, &HashMap::new()).expect("check");
        let Stmt::Expr(es) = file.decls[0].body.stmts.last().expect("stmt") else {
            panic!("expected trailing expression statement");
        };
        info.type_of(es.expr.id).expect("typed").to_string()
    }

    #[test]
    fn folds_constant_arithmetic() {
        let src = "package p;func _(){x := 2 + 3 * 4\n}";
        let file = parse_file(src).expect("parse");
        let info = check_file(&file, &HashMap::new()).expect("check");
        let Stmt::Assign(assign) = &file.decls[0].body.stmts[0] else {
            panic!("expected assignment");
        };
        let tv = info.types.get(&assign.rhs[0].id).expect("typed");
        assert_eq!(tv.value, Some(Constant::Int(14)));
        // The defined variable defaults to int.
        let def = info.defs.get(&assign.lhs[0].id).expect("def");
        assert_eq!(def.typ.to_string(), "int");
    }

    #[test]
    fn redeclaration_in_same_scope_reuses_variable() {
        let src = "package p;func _(){x := 1;x, y := 2, 3\n}";
        let file = parse_file(src).expect("parse");
        let info = check_file(&file, &HashMap::new()).expect("check");
        let Stmt::Assign(second) = &file.decls[0].body.stmts[1] else {
            panic!("expected assignment");
        };
        assert!(!info.defs.contains_key(&second.lhs[0].id), "x is reused");
        assert!(info.defs.contains_key(&second.lhs[1].id), "y is new");
    }

    #[test]
    fn rejects_define_with_no_new_variables() {
        assert!(check("x := 1;x := 2").is_err());
    }

    #[test]
    fn comma_ok_map_index_becomes_tuple() {
        let src = "package p;func _(){m := make(map[string]int);v, ok := m[\"a\"]\n}";
        let file = parse_file(src).expect("parse");
        let info = check_file(&file, &HashMap::new()).expect("check");
        let Stmt::Assign(assign) = &file.decls[0].body.stmts[1] else {
            panic!("expected assignment");
        };
        let tv = info.types.get(&assign.rhs[0].id).expect("typed");
        assert_eq!(tv.typ.to_string(), "(int, bool)");
    }

    #[test]
    fn type_checks_function_literal_returns() {
        assert!(check("f := func(n int) int { return n };f(1)").is_ok());
        assert!(check("f := func(n int) int { return \"no\" }").is_err());
    }

    #[test]
    fn untyped_argument_converts_to_parameter_type() {
        let src = "package p;func _(){f := func(x float64) float64 { return x };f(1)\n}";
        let file = parse_file(src).expect("parse");
        let info = check_file(&file, &HashMap::new()).expect("check");
        let Stmt::Expr(es) = &file.decls[0].body.stmts[1] else {
            panic!("expected expression");
        };
        let ExprKind::Call { args, .. } = &es.expr.kind else {
            panic!("expected call");
        };
        assert_eq!(
            info.type_of(args[0].id).expect("typed").to_string(),
            "float64"
        );
    }

    #[test]
    fn comparison_yields_untyped_bool() {
        assert_eq!(last_expr_type("x := 1;x < 2"), "untyped bool");
    }

    #[test]
    fn rejects_send_on_receive_only_channel() {
        assert!(check("var ch <-chan int;ch <- 1").is_err());
        assert!(check("var ch chan int;ch <- 1").is_ok());
    }

    #[test]
    fn rejects_type_mismatch_in_assignment() {
        assert!(check("x := 1;x = \"s\"").is_err());
    }

    #[test]
    fn struct_field_selection_records_index() {
        let src = "package p;func _(){var s struct{a int; b string};s.b = \"x\"\n}";
        let file = parse_file(src).expect("parse");
        let info = check_file(&file, &HashMap::new()).expect("check");
        let Stmt::Assign(assign) = &file.decls[0].body.stmts[1] else {
            panic!("expected assignment");
        };
        let sel = info.selections.get(&assign.lhs[0].id).expect("selection");
        assert_eq!(sel.index, 1);
        assert!(!sel.indirect);
    }

    #[test]
    fn nil_comparison_requires_nilable_type() {
        assert!(check("var p *int;p == nil").is_ok());
        assert!(check("x := 1;x == nil").is_err());
    }

    #[test]
    fn stray_return_value_at_top_level_is_rejected() {
        assert!(check("return 5").is_err());
        assert!(check("return").is_ok());
    }
}
