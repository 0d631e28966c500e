//! Declaration scan run when a scope opens.
//!
//! Decides whether a scope will allocate any slot, which fixes its up-cost
//! before the body compiles. Only declarations directly in the scope count:
//! nested blocks, `if` and `for` statements get scopes of their own.

use rill_ir::ast::{FuncLit, Param, Stmt};
use rill_ir::Name;

/// Returns `true` if compiling `stmts` as one block declares a slot.
pub fn allocates(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_allocates)
}

/// Returns `true` if `stmt`, compiled directly in a scope, declares a slot
/// in that scope.
pub fn stmt_allocates(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Define { names, .. } | Stmt::Var { names, .. } => names.iter().any(|name| !name.is_blank()),
        Stmt::Func { name, .. } => !name.is_blank(),
        Stmt::Labeled { stmt, .. } => stmt_allocates(stmt),
        _ => false,
    }
}

/// Returns `true` if a function scope for `func` owns slots: a named
/// parameter, any result (unnamed ones get hidden slots) or a declaration
/// in the body.
pub fn func_allocates(func: &FuncLit) -> bool {
    func.params.iter().any(is_named) || !func.results.is_empty() || allocates(&func.body)
}

fn is_named(param: &Param) -> bool {
    param.name != Name::EMPTY && !param.name.is_blank()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use rill_ir::ast::Expr;
    use rill_ir::Type;

    const X: Name = Name::from_raw(10);

    #[test]
    fn expression_statements_do_not_allocate() {
        assert!(!allocates(&[Stmt::Expr(Expr::int(1))]));
        assert!(!allocates(&[Stmt::Block(vec![Stmt::define(X, Expr::int(1))])]));
    }

    #[test]
    fn declarations_allocate_unless_blank() {
        assert!(allocates(&[Stmt::define(X, Expr::int(1))]));
        assert!(!allocates(&[Stmt::define(Name::BLANK, Expr::int(1))]));
        assert!(allocates(&[Stmt::var(X, Type::INT)]));
        assert!(allocates(&[Stmt::labeled(Name::from_raw(11), Stmt::var(X, Type::INT))]));
    }

    #[test]
    fn constants_and_types_do_not_allocate() {
        let stmts = [
            Stmt::Const {
                name: X,
                ty: None,
                value: rill_ir::Lit::int(1),
            },
            Stmt::Type {
                name: Name::from_raw(11),
                underlying: Type::INT,
            },
        ];
        assert!(!allocates(&stmts));
    }

    #[test]
    fn functions_allocate_for_named_params_and_any_result() {
        let mut func = FuncLit::default();
        assert!(!func_allocates(&func));

        func.params.push(Param::unnamed(Type::INT));
        func.params.push(Param::new(Name::BLANK, Type::INT));
        assert!(!func_allocates(&func));

        func.results.push(Param::unnamed(Type::INT));
        assert!(func_allocates(&func));

        let with_param = FuncLit {
            params: vec![Param::new(X, Type::INT)],
            ..FuncLit::default()
        };
        assert!(func_allocates(&with_param));
    }
}
