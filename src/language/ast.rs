use crate::language::span::Span;
use std::sync::Arc;

/// Stable identity for AST nodes the type checker attaches information to.
pub type NodeId = u32;

#[derive(Clone, Debug)]
pub struct File {
    pub package: String,
    pub imports: Vec<Import>,
    pub decls: Vec<FuncDecl>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Import {
    pub path: String,
    pub alias: Option<String>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub name: String,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    VarDecl(VarDeclStmt),
    Assign(AssignStmt),
    Expr(ExprStmt),
    Send(SendStmt),
    IncDec(IncDecStmt),
    Go(GoStmt),
    Defer(DeferStmt),
    Return(ReturnStmt),
    Branch(BranchStmt),
    Labeled(Box<LabeledStmt>),
    If(Box<IfStmt>),
    For(Box<ForStmt>),
    Range(Box<RangeStmt>),
    Select(SelectStmt),
    Block(Block),
    Empty,
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::Expr(s) => s.expr.span,
            Stmt::Send(s) => s.span,
            Stmt::IncDec(s) => s.span,
            Stmt::Go(s) => s.span,
            Stmt::Defer(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Branch(s) => s.span,
            Stmt::Labeled(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Range(s) => s.span,
            Stmt::Select(s) => s.span,
            Stmt::Block(b) => b.span,
            Stmt::Empty => Span::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VarDeclStmt {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignTok {
    /// `:=`
    Define,
    /// `=`
    Assign,
}

#[derive(Clone, Debug)]
pub struct AssignStmt {
    pub lhs: Vec<Expr>,
    pub tok: AssignTok,
    pub rhs: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ExprStmt {
    pub expr: Expr,
}

#[derive(Clone, Debug)]
pub struct SendStmt {
    pub chan: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IncDecStmt {
    pub expr: Expr,
    pub dec: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct GoStmt {
    pub call: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct DeferStmt {
    pub call: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub results: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

#[derive(Clone, Debug)]
pub struct BranchStmt {
    pub kind: BranchKind,
    pub label: Option<Ident>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct LabeledStmt {
    pub label: Ident,
    pub stmt: Stmt,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IfStmt {
    pub init: Option<Stmt>,
    pub cond: Expr,
    pub then: Block,
    pub els: Option<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ForStmt {
    pub init: Option<Stmt>,
    pub cond: Option<Expr>,
    pub post: Option<Stmt>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct RangeStmt {
    pub key: Option<Expr>,
    pub value: Option<Expr>,
    pub tok: Option<AssignTok>,
    pub collection: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct SelectStmt {
    pub cases: Vec<SelectCase>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct SelectCase {
    pub comm: CommClause,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum CommClause {
    Default,
    Send(SendStmt),
    /// Receive with optional assignment targets: `v, ok := <-ch`, `v = <-ch`,
    /// or a bare `<-ch`.
    Recv {
        lhs: Vec<Expr>,
        tok: Option<AssignTok>,
        chan: Expr,
    },
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Ident(String),
    IntLit(i128),
    FloatLit(f64),
    ImagLit(f64),
    StringLit(String),
    RuneLit(char),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        fun: Box<Expr>,
        args: Vec<Expr>,
    },
    Paren(Box<Expr>),
    Selector {
        expr: Box<Expr>,
        sel: Ident,
    },
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    TypeAssert {
        expr: Box<Expr>,
        ty: TypeExpr,
    },
    FuncLit(Arc<FuncLit>),
    /// A type in expression position (first argument of `make`, or a
    /// composite type used as a conversion target).
    Type(TypeExpr),
}

#[derive(Clone, Debug)]
pub struct FuncLit {
    pub id: NodeId,
    pub sig: FuncTypeExpr,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,   // -
    Pos,   // +
    Not,   // !
    BitNot, // ^
    Addr,  // &
    Deref, // *
    Recv,  // <-
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,    // &
    Or,     // |
    Xor,    // ^
    AndNot, // &^
    Shl,
    Shr,
    LogAnd, // &&
    LogOr,  // ||
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::AndNot => "&^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

#[derive(Clone, Debug)]
pub struct TypeExpr {
    pub span: Span,
    pub kind: TypeExprKind,
}

#[derive(Clone, Debug)]
pub enum TypeExprKind {
    Name(Ident),
    Qualified {
        pkg: Ident,
        name: Ident,
    },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array {
        len: Box<Expr>,
        elem: Box<TypeExpr>,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Chan {
        dir: ChanDirExpr,
        elem: Box<TypeExpr>,
    },
    Func(FuncTypeExpr),
    Struct {
        fields: Vec<FieldDecl>,
    },
    Interface,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanDirExpr {
    Both,
    SendOnly,
    RecvOnly,
}

#[derive(Clone, Debug)]
pub struct FuncTypeExpr {
    pub params: Vec<ParamDecl>,
    pub variadic: bool,
    pub results: Vec<ParamDecl>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ParamDecl {
    /// Unnamed parameters and results keep `name` empty.
    pub name: Option<Ident>,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}
