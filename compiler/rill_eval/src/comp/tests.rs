use super::*;
use crate::expr::Expr;
use pretty_assertions::assert_eq;
use rill_ir::ast::{self, BinaryOp};

fn compiler() -> Compiler {
    Compiler::new(SharedInterner::new())
}

fn name(c: &Compiler, s: &str) -> Name {
    c.interner().intern(s)
}

fn define(c: &Compiler, s: &str) -> ast::Stmt {
    ast::Stmt::define(name(c, s), ast::Expr::int(1))
}

#[test]
fn resolves_hops_through_allocating_scopes() {
    let mut c = compiler();
    let y = name(&c, "y");
    let x = name(&c, "x");

    c.open_scope(ScopeKind::Func, true);
    c.declare_var(y, Type::INT).unwrap();

    c.open_block(&[define(&c, "x")]);
    let bind = c.declare_var(x, Type::INT).unwrap();
    assert_eq!(bind.desc.class(), BindClass::Int);

    for inner in ["a", "b", "c"] {
        let stmts = [define(&c, inner)];
        c.open_block(&stmts);
        let inner = name(&c, inner);
        c.declare_var(inner, Type::INT).unwrap();
    }

    let var = c.resolve_var(x).unwrap();
    assert_eq!(var.upn, 3);
    assert_eq!(var.desc, bind.desc);
    assert_eq!(c.resolve_var(y).unwrap().upn, 4);

    for _ in 0..4 {
        assert_eq!(c.close_block(), 1);
    }
    let func = c.close_func();
    assert_eq!(func.up_cost, 1);
}

#[test]
fn empty_blocks_cost_no_hop() {
    let mut c = compiler();
    let x = name(&c, "x");
    c.declare_var(x, Type::STRING).unwrap();

    let before = c.code_len();
    c.open_block(&[]);
    c.open_block(&[ast::Stmt::Expr(ast::Expr::int(1))]);
    assert_eq!(c.resolve(x).unwrap().1, 0);
    assert_eq!(c.close_block(), 0);
    assert_eq!(c.close_block(), 0);
    assert_eq!(c.code_len(), before);
}

#[test]
fn allocating_block_emits_enter_and_leave() {
    let mut c = compiler();
    let before = c.code_len();
    let stmts = [define(&c, "x")];
    c.open_block(&stmts);
    c.compile_stmts(&stmts).unwrap();
    assert_eq!(c.close_block(), 1);
    // enter, store, leave
    assert_eq!(c.code_len(), before + 3);
}

#[test]
#[should_panic(expected = "internal error: scope up-cost changed")]
fn declaring_in_a_scope_opened_without_slots_panics() {
    let mut c = compiler();
    let x = name(&c, "x");
    c.open_block(&[]);
    c.declare_var(x, Type::INT).unwrap();
    c.close_block();
}

#[test]
fn word_sized_types_get_unboxed_slots() {
    let mut c = compiler();
    let cases = [
        ("b", Type::BOOL, BindClass::Int),
        ("f", Type::FLOAT32, BindClass::Int),
        ("s", Type::STRING, BindClass::Var),
        ("m", Type::map(Type::STRING, Type::INT), BindClass::Var),
    ];
    for (s, ty, class) in cases {
        let n = name(&c, s);
        assert_eq!(c.declare_var(n, ty).unwrap().desc.class(), class);
    }
    assert_eq!(c.file_shape(), FrameShape::new(2, 2));
}

#[test]
fn blank_declarations_allocate_nothing() {
    let mut c = compiler();
    let bind = c.declare_var(Name::BLANK, Type::INT).unwrap();
    assert_eq!(bind.desc.index(), BindDescriptor::NO_INDEX);
    assert!(!c.file().has_slots());
    assert_eq!(c.resolve(Name::BLANK).unwrap_err(), CompileError::Undefined {
        name: "_".to_owned(),
        depth: FILE_DEPTH,
    });
}

#[test]
fn redeclaration_in_one_scope_fails() {
    let mut c = compiler();
    let x = name(&c, "x");
    c.declare_var(x, Type::INT).unwrap();
    assert_eq!(
        c.declare_var(x, Type::INT).unwrap_err(),
        CompileError::Redeclared { name: "x".to_owned() }
    );

    c.open_block(&[define(&c, "x")]);
    assert!(c.declare_var(x, Type::STRING).is_ok());
    c.close_block();
}

#[test]
fn universe_holds_true_false_and_basic_types() {
    let c = compiler();
    let (bind, upn) = c.resolve(name(&c, "true")).unwrap();
    assert!(bind.is_const());
    assert_eq!(upn, 1);
    assert_eq!(c.lookup_type(name(&c, "float64")), Some(Type::FLOAT64));
    assert!(c.lookup(name(&c, "true"), FILE_DEPTH).is_none());
    assert!(c.lookup(name(&c, "true"), TOP_DEPTH).is_some());
}

#[test]
fn constants_are_not_settable() {
    let mut c = compiler();
    let k = name(&c, "k");
    c.declare_const(k, Lit::int(3)).unwrap();
    assert_eq!(
        c.resolve_var(k).unwrap_err(),
        CompileError::NotSettable { name: "k".to_owned() }
    );
}

#[test]
fn declared_types_print_with_package_path() {
    let mut c = compiler();
    c.set_package("temps", "example.com/temps");
    let celsius = name(&c, "Celsius");
    let ty = c.declare_type(celsius, Type::FLOAT64).unwrap();
    assert_eq!(c.type_name(&ty), "example.com/temps.Celsius");
    assert_eq!(c.type_name(&Type::INT), "int");
}

#[test]
fn untyped_constants_default_unless_kept() {
    let mut c = compiler();
    let expr = c.compile(&ast::Expr::int(10)).unwrap();
    assert!(!expr.is_untyped());
    assert_eq!(expr.ty(), Some(&Type::INT));

    let mut keep = Compiler::with_options(SharedInterner::new(), CompileOptions::KEEP_UNTYPED);
    let expr = keep.compile(&ast::Expr::int(10)).unwrap();
    assert!(expr.is_untyped());
    assert_eq!(expr.lit.untyped_kind(), Kind::Int);
}

#[test]
fn literals_compile_to_constants_and_names_to_evaluators() {
    use rill_ir::LitValue;

    let mut c = compiler();
    let cases = [
        (ast::Expr::int(10), Type::INT, LitValue::Int(10)),
        (ast::Expr::bool(true), Type::BOOL, LitValue::Bool(true)),
        (ast::Expr::string("hi"), Type::STRING, LitValue::String("hi".into())),
    ];
    for (source, ty, value) in cases {
        let expr = c.compile(&source).unwrap();
        assert!(expr.is_const());
        assert!(expr.fun.is_none());
        assert_eq!(expr.ty(), Some(&ty));
        assert_eq!(expr.lit.value, Some(value));
    }

    let x = name(&c, "x");
    c.declare_var(x, Type::INT).unwrap();
    let expr = c.compile(&ast::Expr::ident(x)).unwrap();
    assert!(!expr.is_const());
    assert!(expr.fun.is_some());
    assert_eq!(expr.ty(), Some(&Type::INT));
}

#[test]
fn untyped_operands_unify_to_the_wider_kind() {
    let mut c = compiler();
    let sum = c
        .compile(&ast::Expr::binary(BinaryOp::Add, ast::Expr::int(1), ast::Expr::float(0.5)))
        .unwrap();
    assert_eq!(sum.ty(), Some(&Type::FLOAT64));

    let x = name(&c, "x");
    c.declare_var(x, Type::FLOAT32).unwrap();
    let scaled = c
        .compile(&ast::Expr::binary(BinaryOp::Mul, ast::Expr::ident(x), ast::Expr::int(2)))
        .unwrap();
    assert_eq!(scaled.ty(), Some(&Type::FLOAT32));
}

#[test]
fn mismatched_operands_fail() {
    let mut c = compiler();
    let (i, s) = (name(&c, "i"), name(&c, "s"));
    c.declare_var(i, Type::INT).unwrap();
    c.declare_var(s, Type::STRING).unwrap();
    let err = c
        .compile(&ast::Expr::binary(BinaryOp::Add, ast::Expr::ident(i), ast::Expr::ident(s)))
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::TypeMismatch {
            expected: "int".to_owned(),
            found: "string".to_owned(),
        }
    );
    let err = c
        .compile(&ast::Expr::binary(BinaryOp::Sub, ast::Expr::ident(s), ast::Expr::ident(s)))
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidOperation { op: "-", .. }));
}

#[test]
fn statement_errors() {
    let mut c = compiler();
    let x = name(&c, "x");
    let l = name(&c, "L");
    let cases: Vec<(ast::Stmt, CompileError)> = vec![
        (ast::Stmt::Break(None), CompileError::NotInLoop { stmt: "break" }),
        (ast::Stmt::Continue(None), CompileError::NotInLoop { stmt: "continue" }),
        (
            ast::Stmt::Goto(l),
            CompileError::UndefinedLabel { label: "L".to_owned() },
        ),
        (
            ast::Stmt::ret(vec![]),
            CompileError::OutsideFunction { stmt: "return" },
        ),
        (
            ast::Stmt::assign(ast::Expr::ident(x), ast::Expr::int(1)),
            CompileError::Undefined {
                name: "x".to_owned(),
                depth: FILE_DEPTH,
            },
        ),
        (
            ast::Stmt::Expr(ast::Expr::ident(Name::BLANK)),
            CompileError::BlankUse,
        ),
    ];
    for (stmt, expected) in cases {
        assert_eq!(c.compile_stmt(&stmt).unwrap_err(), expected, "{stmt:?}");
    }
}

#[test]
fn define_needs_a_new_variable() {
    let mut c = compiler();
    let stmt = define(&c, "x");
    c.compile_stmts(std::slice::from_ref(&stmt)).unwrap();
    assert_eq!(c.compile_stmt(&stmt).unwrap_err(), CompileError::NoNewVariables);
}

#[test]
fn duplicate_labels_fail() {
    let mut c = compiler();
    let l = name(&c, "L");
    let stmts = [
        ast::Stmt::labeled(l, ast::Stmt::Expr(ast::Expr::int(1))),
        ast::Stmt::labeled(l, ast::Stmt::Expr(ast::Expr::int(2))),
    ];
    assert_eq!(
        c.compile_stmts(&stmts).unwrap_err(),
        CompileError::DuplicateLabel { label: "L".to_owned() }
    );
}

#[test]
fn bare_return_needs_named_results() {
    let mut c = compiler();
    let f = name(&c, "f");
    let func = ast::FuncLit {
        results: vec![ast::Param::unnamed(Type::INT)],
        body: vec![ast::Stmt::ret(vec![])],
        ..ast::FuncLit::default()
    };
    let err = c.compile_stmts(&[ast::Stmt::func(f, func)]).unwrap_err();
    assert_eq!(err, CompileError::AssignCount { expected: 1, found: 0 });
}

#[test]
fn map_elements_are_not_addressable() {
    let mut c = compiler();
    let m = name(&c, "m");
    c.declare_var(m, Type::map(Type::STRING, Type::INT)).unwrap();
    let err = c
        .compile(&ast::Expr::addr_of(ast::Expr::index(
            ast::Expr::ident(m),
            ast::Expr::string("k"),
        )))
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::NotAddressable {
            what: "map element".to_owned()
        }
    );
}

#[test]
fn taking_an_address_marks_the_scope() {
    let mut c = compiler();
    let x = name(&c, "x");
    c.open_block(&[define(&c, "x")]);
    c.declare_var(x, Type::INT).unwrap();
    let ptr: Expr = c.compile(&ast::Expr::addr_of(ast::Expr::ident(x))).unwrap();
    assert_eq!(ptr.ty(), Some(&Type::pointer(Type::INT)));
    assert!(c.current().shape().address_taken);
    c.close_block();
}

#[test]
fn func_literals_mark_enclosing_scopes_escaping() {
    let mut c = compiler();
    let stmts = [define(&c, "x")];
    c.open_block(&stmts);
    c.compile_stmts(&stmts).unwrap();
    c.compile(&ast::Expr::func(ast::FuncLit::default())).unwrap();
    assert!(c.current().shape().escapes);
    assert!(!c.file().shape().escapes);
    c.close_block();
}

#[test]
fn rollback_forgets_failed_chunks() {
    let mut c = compiler();
    let x = name(&c, "x");
    let checkpoint = c.checkpoint();
    let stmts = [define(&c, "x"), ast::Stmt::Break(None)];
    assert!(c.compile_stmts(&stmts).is_err());
    c.rollback(checkpoint);
    assert!(c.resolve(x).is_err());
    assert_eq!(c.file_shape(), FrameShape::default());
    assert_eq!(c.take_code().len(), 0);
}
