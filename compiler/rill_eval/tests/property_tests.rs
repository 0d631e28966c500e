//! Property-based tests for scope resolution.
//!
//! Random nestings of allocating and empty blocks check that:
//! 1. A variable resolves with one hop per allocating block in between
//! 2. Closing a block reports exactly the frames it pushed
//! 3. The compiled code reaches the variable at run time
//!
//! Binding descriptors are checked over their whole index range.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::doc_markdown,
    clippy::uninlined_format_args,
    reason = "Proptest macros generate code with these patterns"
)]

use proptest::prelude::*;
use rill_eval::{BindClass, BindDescriptor, Compiler, Interp, Value};
use rill_ir::ast::{BinaryOp, Expr, Stmt};
use rill_ir::{SharedInterner, Type};

/// Per level: does the block declare a variable?
fn nesting_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..12)
}

/// Blocks nested per `levels`, innermost statement `x = x + 1`.
fn nested(interner: &SharedInterner, levels: &[bool]) -> Stmt {
    let x = interner.intern("x");
    let mut stmt = Stmt::assign(
        Expr::ident(x),
        Expr::binary(BinaryOp::Add, Expr::ident(x), Expr::int(1)),
    );
    for (depth, allocates) in levels.iter().enumerate().rev() {
        let mut body = Vec::new();
        if *allocates {
            body.push(Stmt::define(interner.intern(&format!("v{depth}")), Expr::int(0)));
        }
        body.push(stmt);
        stmt = Stmt::Block(body);
    }
    stmt
}

fn class_strategy() -> impl Strategy<Value = BindClass> {
    prop_oneof![
        Just(BindClass::Const),
        Just(BindClass::Func),
        Just(BindClass::Var),
        Just(BindClass::Int),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn descriptor_unpacks_what_was_packed(
        class in class_strategy(),
        index in 0..=BindDescriptor::MAX_INDEX,
    ) {
        let desc = BindDescriptor::new(class, index);
        prop_assert_eq!(desc.class(), class);
        prop_assert_eq!(desc.index(), index);
        prop_assert_eq!(desc.settable(), matches!(class, BindClass::Var | BindClass::Int));
    }

    #[test]
    fn hops_count_allocating_blocks(levels in nesting_strategy()) {
        let interner = SharedInterner::new();
        let mut compiler = Compiler::new(interner.clone());
        let x = interner.intern("x");
        compiler.declare_var(x, Type::INT).unwrap();

        for (depth, allocates) in levels.iter().enumerate() {
            let name = interner.intern(&format!("v{depth}"));
            if *allocates {
                compiler.open_block(&[Stmt::define(name, Expr::int(0))]);
                compiler.declare_var(name, Type::STRING).unwrap();
            } else {
                compiler.open_block(&[]);
            }
        }

        let expected = levels.iter().filter(|a| **a).count();
        prop_assert_eq!(compiler.resolve_var(x).unwrap().upn, expected);

        for allocates in levels.iter().rev() {
            prop_assert_eq!(compiler.close_block(), usize::from(*allocates));
        }
        prop_assert_eq!(compiler.resolve_var(x).unwrap().upn, 0);
    }

    #[test]
    fn nested_blocks_reach_the_outer_variable(levels in nesting_strategy()) {
        let interner = SharedInterner::new();
        let mut interp = Interp::builder().interner(interner.clone()).build();
        let x = interner.intern("x");
        interp.run(&[Stmt::define(x, Expr::int(41)), nested(&interner, &levels)]).unwrap();

        prop_assert_eq!(interp.value("x"), Some(Value::Int(42)));
        let frames = levels.iter().filter(|a| **a).count();
        prop_assert_eq!(interp.pool_stats().allocated, frames);
        prop_assert_eq!(interp.pool_stats().recycled, frames);
    }
}
