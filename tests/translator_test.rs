//! Integration tests for compiling node trees.
//!
//! Tests cover:
//! - Memoization and reference sharing within one context
//! - Cycles through references and proxies
//! - Overload resolution and widening on real graphs
//! - Arithmetic faults, rounding, folds, records and scripts
//! - Algebraic laws of node replacement and rounding (proptest)

mod common;

use std::path::PathBuf;
use std::rc::Rc;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use tradeflow::domain::error::{CompileError, Fault};
use tradeflow::domain::node::{FoldOperand, Node, NodeKind};
use tradeflow::domain::translator::translate;
use tradeflow::domain::types::{CanvasType, NativeType};
use tradeflow::domain::value::{floor_to, Money, Value};

fn decimal(value: &Result<Value, Fault>) -> f64 {
    match value {
        Ok(Value::Decimal(d)) => *d,
        other => panic!("expected a decimal, got {other:?}"),
    }
}

mod memoization {
    use super::*;

    #[test]
    fn compiling_twice_shares_the_graph() {
        let node = binary(NodeKind::Addition, Node::value(1i64), Node::value(2i64));
        let mut context = bare_context();
        let first = translate(&mut context, &node).unwrap();
        let second = translate(&mut context, &node).unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn reference_shares_its_target() {
        let sum = binary(NodeKind::Addition, Node::value(1i64), Node::value(2i64));
        let root = Node::new(
            NodeKind::Chain,
            vec![sum, Node::reference("0", CanvasType::Integer)],
        )
        .unwrap();
        let mut context = bare_context();
        translate(&mut context, &root).unwrap();
        let target = translate(&mut context, &root.children()[0]).unwrap();
        let reference = translate(&mut context, &root.children()[1]).unwrap();
        assert!(target.ptr_eq(&reference));
    }

    #[test]
    fn separate_contexts_do_not_share() {
        let node = binary(NodeKind::Addition, Node::value(1i64), Node::value(2i64));
        let first = translate(&mut bare_context(), &node).unwrap();
        let second = translate(&mut bare_context(), &node).unwrap();
        assert!(!first.ptr_eq(&second));
    }
}

mod cycles {
    use super::*;

    #[test]
    fn cycle_through_reference_terminates_bound() {
        let root = Node::typed(
            NodeKind::Chain,
            CanvasType::Integer,
            vec![
                Node::value(1i64),
                Node::typed(
                    NodeKind::Previous,
                    CanvasType::Integer,
                    vec![Node::reference("", CanvasType::Integer)],
                ),
            ],
        );
        let mut context = bare_context();
        let translation = translate(&mut context, &root).unwrap();
        assert_eq!(translation.native_type(), NativeType::Integer);
        assert_eq!(context.unbound_proxies(), 0);
        // The continuation only sees the root's first value, so the cycle
        // settles after one evaluation instead of feeding itself.
        assert_eq!(
            evaluate(&context, &translation, 20),
            vec![Ok(Value::Integer(1))]
        );
    }

    #[test]
    fn reference_to_itself_is_empty() {
        let root = Node::new(
            NodeKind::Chain,
            vec![Node::value(1i64), Node::reference("1", CanvasType::Integer)],
        )
        .unwrap();
        let mut context = bare_context();
        let translation = translate(&mut context, &root).unwrap();
        let values = evaluate(&context, &translation, 10);
        assert_eq!(values, vec![Ok(Value::Integer(1))]);
    }

    #[test]
    fn dangling_reference_fails_compilation() {
        let root = Node::new(
            NodeKind::Chain,
            vec![Node::value(1i64), Node::reference("nowhere", CanvasType::Integer)],
        )
        .unwrap();
        let err = translate(&mut bare_context(), &root).unwrap_err();
        assert_eq!(
            err,
            CompileError::DanglingReference {
                path: "nowhere".into()
            }
        );
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn money_plus_money_stays_money() {
        let node = binary(NodeKind::Addition, money(10.0), money(5.25));
        assert_eq!(node.node_type(), &CanvasType::Money);
        let mut context = bare_context();
        let translation = translate(&mut context, &node).unwrap();
        assert_eq!(
            evaluate(&context, &translation, 10),
            vec![Ok(Value::Money(Money::from_f64(15.25)))]
        );
    }

    #[test]
    fn integer_widens_into_money() {
        let node = binary(NodeKind::Addition, Node::value(2i64), money(1.5));
        assert_eq!(node.node_type(), &CanvasType::Money);
        let mut context = bare_context();
        let translation = translate(&mut context, &node).unwrap();
        assert_eq!(
            evaluate(&context, &translation, 10),
            vec![Ok(Value::Money(Money::from_f64(3.5)))]
        );
    }

    #[test]
    fn money_ratio_is_decimal() {
        let node = binary(NodeKind::Division, money(10.0), money(2.0));
        assert_eq!(node.node_type(), &CanvasType::Decimal);
        let mut context = bare_context();
        let translation = translate(&mut context, &node).unwrap();
        let values = evaluate(&context, &translation, 10);
        assert_eq!(values.len(), 1);
        assert_relative_eq!(decimal(&values[0]), 5.0);
    }

    #[test]
    fn division_by_zero_faults() {
        let node = binary(NodeKind::Division, money(10.0), money(0.0));
        let mut context = bare_context();
        let translation = translate(&mut context, &node).unwrap();
        assert_eq!(
            evaluate(&context, &translation, 10),
            vec![Err(Fault::DivisionByZero)]
        );
    }

    #[test]
    fn money_at_the_range_limit_faults_instead_of_wrapping() {
        let smallest = || Node::value(Money::from_raw(i64::MIN));
        let abs = Node::new(NodeKind::Abs, vec![smallest()]).unwrap();
        let flipped = binary(NodeKind::Division, smallest(), Node::value(-1i64));
        assert_eq!(flipped.node_type(), &CanvasType::Money);
        let mut context = bare_context();
        let abs = translate(&mut context, &abs).unwrap();
        let flipped = translate(&mut context, &flipped).unwrap();
        assert_eq!(evaluate(&context, &abs, 10), vec![Err(Fault::Overflow)]);
        assert_eq!(evaluate(&context, &flipped, 10), vec![Err(Fault::Overflow)]);
    }

    #[test]
    fn floor_rounds_down_to_multiple() {
        let node = binary(NodeKind::Floor, Node::value(7.3), Node::value(0.5));
        let mut context = bare_context();
        let translation = translate(&mut context, &node).unwrap();
        let values = evaluate(&context, &translation, 10);
        assert_relative_eq!(decimal(&values[0]), 7.0);
    }

    #[test]
    fn if_picks_consequent() {
        let node = Node::new(
            NodeKind::If,
            vec![Node::value(true), Node::value(1i64), Node::value(2i64)],
        )
        .unwrap();
        let mut context = bare_context();
        let translation = translate(&mut context, &node).unwrap();
        assert_eq!(
            evaluate(&context, &translation, 10),
            vec![Ok(Value::Integer(1))]
        );
    }
}

mod sequences {
    use super::*;

    #[test]
    fn fold_sums_a_seeded_range() {
        let combiner = Node::new(
            NodeKind::Addition,
            vec![
                Node::fold_operand(FoldOperand::Left, CanvasType::Integer),
                Node::fold_operand(FoldOperand::Right, CanvasType::Integer),
            ],
        )
        .unwrap();
        let range = Node::new(NodeKind::Range, vec![Node::value(1i64), Node::value(3i64)]).unwrap();
        let series = Node::new(NodeKind::Chain, vec![Node::value(0i64), range]).unwrap();
        let root = Node::new(NodeKind::Fold, vec![combiner, series]).unwrap();

        let mut context = bare_context();
        let translation = translate(&mut context, &root).unwrap();
        let values = evaluate(&context, &translation, 50);
        assert_eq!(
            values,
            vec![
                Ok(Value::Integer(0)),
                Ok(Value::Integer(1)),
                Ok(Value::Integer(3)),
                Ok(Value::Integer(6)),
            ]
        );
    }

    #[test]
    fn chain_skips_none_children() {
        let root = Node::new(
            NodeKind::Chain,
            vec![
                Node::value(1i64),
                Node::none(CanvasType::Integer),
                Node::value(2i64),
            ],
        )
        .unwrap();
        let mut context = bare_context();
        let translation = translate(&mut context, &root).unwrap();
        assert_eq!(
            evaluate(&context, &translation, 10),
            vec![Ok(Value::Integer(1)), Ok(Value::Integer(2))]
        );
    }
}

mod records {
    use super::*;

    #[test]
    fn query_reads_a_record_field() {
        let record = Node::record(vec![
            ("price".into(), money(1.5)),
            ("size".into(), Node::value(10i64)),
        ]);
        let query = Node::query(record, "size").unwrap();
        assert_eq!(query.node_type(), &CanvasType::Integer);
        let mut context = bare_context();
        let translation = translate(&mut context, &query).unwrap();
        assert_eq!(
            evaluate(&context, &translation, 10),
            vec![Ok(Value::Integer(10))]
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let record = Node::record(vec![("price".into(), money(1.5))]);
        assert!(Node::query(record, "size").is_err());
    }
}

mod scripts {
    use super::*;

    fn script(path: &str, parameters: Vec<(String, Node)>) -> Node {
        Node::script(PathBuf::from(path), CanvasType::Integer, parameters)
    }

    #[test]
    fn script_result_flows_into_graph() {
        let node = script(
            "sum.py",
            vec![
                ("a".into(), Node::value(2i64)),
                ("b".into(), Node::value(3i64)),
            ],
        );
        let mut context = bare_context().with_scripts(Rc::new(SummingScriptHost));
        let translation = translate(&mut context, &node).unwrap();
        assert_eq!(
            evaluate(&context, &translation, 10),
            vec![Ok(Value::Integer(5))]
        );
    }

    #[test]
    fn load_failure_faults_without_failing_compilation() {
        let node = script("missing.py", Vec::new());
        let mut context = bare_context().with_scripts(Rc::new(SummingScriptHost));
        let translation = translate(&mut context, &node).unwrap();
        let values = evaluate(&context, &translation, 10);
        assert!(matches!(values.as_slice(), [Err(Fault::ScriptLoadFailure(_))]));
    }

    #[test]
    fn missing_host_is_a_load_failure() {
        let node = script("sum.py", Vec::new());
        let mut context = bare_context();
        let translation = translate(&mut context, &node).unwrap();
        let values = evaluate(&context, &translation, 10);
        assert!(matches!(values.as_slice(), [Err(Fault::ScriptLoadFailure(_))]));
    }

    #[test]
    fn call_error_is_a_script_failure() {
        let node = script("sum.py", vec![("a".into(), Node::value(true))]);
        let mut context = bare_context().with_scripts(Rc::new(SummingScriptHost));
        let translation = translate(&mut context, &node).unwrap();
        let values = evaluate(&context, &translation, 10);
        assert!(matches!(values.as_slice(), [Err(Fault::ScriptFailure(_))]));
    }
}

mod laws {
    use super::*;

    proptest! {
        #[test]
        fn replace_then_restore_is_identity(a in -1000i64..1000, b in -1000i64..1000, x in -1000i64..1000) {
            let original = binary(NodeKind::Addition, Node::value(a), Node::value(b));
            let child = original.children()[0].clone();
            let substitute = Node::value(x);
            let replaced = original.replace(&original.children()[0], substitute.clone()).unwrap();
            let restored = replaced.replace(&substitute, child).unwrap();
            prop_assert!(restored.structurally_equal(&original));
        }

        #[test]
        fn floor_to_never_exceeds_value(value in -1.0e6f64..1.0e6, multiple in 0.01f64..100.0) {
            let floored = floor_to(value, multiple);
            prop_assert!(floored <= value + 1e-9);
            prop_assert!(value - floored < multiple + 1e-9);
        }

        #[test]
        fn floor_to_zero_multiple_is_zero(value in -1.0e6f64..1.0e6) {
            prop_assert_eq!(floor_to(value, 0.0), 0.0);
        }
    }

    #[test]
    fn floor_to_known_values() {
        assert_relative_eq!(floor_to(7.3, 0.5), 7.0);
        assert_relative_eq!(floor_to(-7.3, 0.5), -7.5);
    }
}
