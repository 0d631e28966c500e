//! Syntax nodes handed to the execution core.
//!
//! The front end parses, type-checks and constant-folds before producing
//! these nodes, so every literal is already a [`Lit`] and every type is a
//! resolved [`Type`]. Names are interned.

use crate::{FuncType, Lit, Name, Type, UntypedLit};

/// Binary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// `==`, `!=`, `<`, `<=`, `>`, `>=`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// `&&` and `||`.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Unary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Lit(Lit),
    /// `nil` of a nilable type.
    Nil(Type),
    Ident(Name),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `base[index]` on maps and slices.
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Func(Box<FuncLit>),
    /// `&operand`.
    AddrOf(Box<Expr>),
    /// `*operand`.
    Deref(Box<Expr>),
    /// `make(map[key]elem)`.
    MakeMap {
        key: Type,
        elem: Type,
    },
    /// `[]elem{items...}`.
    SliceLit {
        elem: Type,
        items: Vec<Expr>,
    },
    /// `ty(expr)`.
    Convert {
        ty: Type,
        expr: Box<Expr>,
    },
}

impl Expr {
    /// Untyped integer constant.
    pub fn int(i: i128) -> Self {
        Expr::Lit(Lit::untyped(UntypedLit::int(i)))
    }

    /// Untyped float constant.
    pub fn float(x: f64) -> Self {
        Expr::Lit(Lit::untyped(UntypedLit::float(x)))
    }

    /// Untyped string constant.
    pub fn string(s: &str) -> Self {
        Expr::Lit(Lit::untyped(UntypedLit::string(s)))
    }

    /// Untyped boolean constant.
    pub fn bool(b: bool) -> Self {
        Expr::Lit(Lit::untyped(UntypedLit::bool(b)))
    }

    pub fn ident(name: Name) -> Self {
        Expr::Ident(name)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Expr::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(func),
            args,
        }
    }

    pub fn func(lit: FuncLit) -> Self {
        Expr::Func(Box::new(lit))
    }

    pub fn addr_of(operand: Expr) -> Self {
        Expr::AddrOf(Box::new(operand))
    }

    pub fn deref(operand: Expr) -> Self {
        Expr::Deref(Box::new(operand))
    }

    pub fn convert(ty: Type, expr: Expr) -> Self {
        Expr::Convert {
            ty,
            expr: Box::new(expr),
        }
    }
}

/// Parameter or result of a function literal.
///
/// Unnamed parameters and results use [`Name::EMPTY`].
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty: Type,
}

impl Param {
    pub fn new(name: Name, ty: Type) -> Self {
        Param { name, ty }
    }

    pub fn unnamed(ty: Type) -> Self {
        Param {
            name: Name::EMPTY,
            ty,
        }
    }
}

/// Function literal or the body of a function declaration.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FuncLit {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub body: Vec<Stmt>,
}

impl FuncLit {
    pub fn signature(&self) -> FuncType {
        FuncType {
            params: self.params.iter().map(|p| p.ty.clone()).collect(),
            results: self.results.iter().map(|r| r.ty.clone()).collect(),
        }
    }

    /// Results are declared with names, so a bare `return` is allowed.
    pub fn named_results(&self) -> bool {
        self.results.iter().any(|r| r.name != Name::EMPTY)
    }
}

/// Statement node.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    /// `names := values`.
    Define {
        names: Vec<Name>,
        values: Vec<Expr>,
    },
    /// `var names ty = values`; `values` empty means zero values.
    Var {
        names: Vec<Name>,
        ty: Option<Type>,
        values: Vec<Expr>,
    },
    Const {
        name: Name,
        ty: Option<Type>,
        value: Lit,
    },
    Func {
        name: Name,
        func: FuncLit,
    },
    Type {
        name: Name,
        underlying: Type,
    },
    /// `targets = values`, or `target op= value` when `op` is set.
    Assign {
        op: Option<BinaryOp>,
        targets: Vec<Expr>,
        values: Vec<Expr>,
    },
    IncDec {
        target: Expr,
        inc: bool,
    },
    Block(Vec<Stmt>),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Vec<Stmt>,
        els: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    Break(Option<Name>),
    Continue(Option<Name>),
    Goto(Name),
    Labeled {
        label: Name,
        stmt: Box<Stmt>,
    },
    Return(Vec<Expr>),
    /// `defer call`; the expression must be a call.
    Defer(Expr),
}

impl Stmt {
    pub fn define(name: Name, value: Expr) -> Self {
        Stmt::Define {
            names: vec![name],
            values: vec![value],
        }
    }

    pub fn var(name: Name, ty: Type) -> Self {
        Stmt::Var {
            names: vec![name],
            ty: Some(ty),
            values: Vec::new(),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            op: None,
            targets: vec![target],
            values: vec![value],
        }
    }

    pub fn op_assign(op: BinaryOp, target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            op: Some(op),
            targets: vec![target],
            values: vec![value],
        }
    }

    pub fn inc(target: Expr) -> Self {
        Stmt::IncDec { target, inc: true }
    }

    pub fn func(name: Name, func: FuncLit) -> Self {
        Stmt::Func { name, func }
    }

    pub fn ret(values: Vec<Expr>) -> Self {
        Stmt::Return(values)
    }

    pub fn labeled(label: Name, stmt: Stmt) -> Self {
        Stmt::Labeled {
            label,
            stmt: Box::new(stmt),
        }
    }

    /// `for init; cond; post { body }`.
    pub fn for_loop(
        init: Option<Stmt>,
        cond: Option<Expr>,
        post: Option<Stmt>,
        body: Vec<Stmt>,
    ) -> Self {
        Stmt::For {
            init: init.map(Box::new),
            cond,
            post: post.map(Box::new),
            body,
        }
    }

    /// `if cond { then } else { els }`.
    pub fn if_else(cond: Expr, then: Vec<Stmt>, els: Option<Vec<Stmt>>) -> Self {
        Stmt::If {
            init: None,
            cond,
            then,
            els: els.map(|stmts| Box::new(Stmt::Block(stmts))),
        }
    }
}
