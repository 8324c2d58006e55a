//! Integration tests for order programs against the simulated venue.
//!
//! Tests cover:
//! - Catalog templates compiled and run as sessions
//! - Cancel-after wrapping through alarms and thread timers
//! - Rejections surfacing as session errors
//! - Live order wrappers and execution report monitors
//! - Spawned orders, one per trigger evaluation

mod common;

use std::rc::Rc;
use std::time::Duration;

use common::*;
use tradeflow::adapters::thread_timer_adapter::ThreadTimerFactory;
use tradeflow::domain::context::CompilationContext;
use tradeflow::domain::error::TradeflowError;
use tradeflow::domain::node::{Node, NodeKind};
use tradeflow::domain::order::{ExecutionReport, OrderHandle};
use tradeflow::domain::reactor::RunOutcome;
use tradeflow::domain::session::{self, build_program, SessionSettings, SimulationSettings};
use tradeflow::domain::translator::translate;
use tradeflow::domain::types::CanvasType;
use tradeflow::domain::value::{
    Currency, Money, OrderStatus, Security, Side, TimeInForce, Value, Venue,
};

fn settings(entry: &str, cancel_after_ms: Option<i64>) -> SessionSettings {
    SessionSettings {
        account: ACCOUNT.into(),
        max_ticks: 200,
        idle_timeout: Duration::from_secs(2),
        entry: entry.into(),
        security: Security::new("BHP", "ASX"),
        currency: Currency::default(),
        side: Some(Side::Bid),
        destination: Venue::new("ASX"),
        quantity: 300,
        price: Money::from_f64(45.10),
        time_in_force: TimeInForce::Day,
        cancel_after: cancel_after_ms.map(chrono::Duration::milliseconds),
        simulation: SimulationSettings {
            auto_fill: true,
            reject_above: None,
        },
        time_and_sales: None,
    }
}

mod sessions {
    use super::*;

    #[test]
    fn filled_order_completes_the_session() {
        let program = build_program(&settings("Limit Bid Order", None)).unwrap();
        let mut context = CompilationContext::new(ACCOUNT, fixed_clock())
            .unwrap()
            .with_order_client(simulated_venue(true, None));
        let report =
            session::run(&mut context, &program, 100, Duration::from_millis(500)).unwrap();

        assert!(matches!(report.outcome, RunOutcome::Complete { .. }));
        assert_eq!(report.orders.len(), 1);
        let order = &report.orders[0];
        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.filled_quantity(), 300);
        assert_eq!(order.fields().account, ACCOUNT);
        assert_eq!(order.fields().price, Money::from_f64(45.10));
    }

    #[test]
    fn market_template_pins_its_order_type() {
        let program = build_program(&settings("Market Ask Order", None)).unwrap();
        let mut context = CompilationContext::new(ACCOUNT, fixed_clock())
            .unwrap()
            .with_order_client(simulated_venue(true, None));
        let report =
            session::run(&mut context, &program, 100, Duration::from_millis(500)).unwrap();
        let fields = report.orders[0].fields();
        assert_eq!(fields.side, Side::Ask);
        assert_eq!(
            fields.order_type,
            tradeflow::domain::value::OrderType::Market
        );
    }

    #[test]
    fn resting_order_is_canceled_after_delay() {
        let program = build_program(&settings("Limit Bid Order", Some(30))).unwrap();
        let mut context = CompilationContext::new(ACCOUNT, fixed_clock())
            .unwrap()
            .with_order_client(simulated_venue(false, None))
            .with_timers(Rc::new(ThreadTimerFactory));
        let report =
            session::run(&mut context, &program, 200, Duration::from_secs(2)).unwrap();

        assert!(matches!(report.outcome, RunOutcome::Complete { .. }));
        assert_eq!(report.orders.len(), 1);
        let statuses: Vec<_> = report.orders[0]
            .reports()
            .iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(statuses, vec![OrderStatus::New, OrderStatus::Canceled]);
    }

    #[test]
    fn rejection_fails_the_session() {
        let program = build_program(&settings("Limit Bid Order", None)).unwrap();
        let mut context = CompilationContext::new(ACCOUNT, fixed_clock())
            .unwrap()
            .with_order_client(simulated_venue(true, Some(100)));
        let err = session::run(&mut context, &program, 100, Duration::from_millis(500))
            .unwrap_err();
        assert!(matches!(err, TradeflowError::OrderRejected { .. }));
    }

    #[test]
    fn missing_venue_faults_the_program() {
        let program = build_program(&settings("Limit Bid Order", None)).unwrap();
        let mut context = bare_context();
        let err = session::run(&mut context, &program, 100, Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, TradeflowError::Runtime(_)));
    }
}

mod live_orders {
    use super::*;

    fn live_order() -> OrderHandle {
        let order = OrderHandle::new(7, OrderFieldsBuilder::new().quantity(500).price(12.5).build());
        order.publish(ExecutionReport::status(OrderStatus::New, at(10, 0, 0)));
        order.publish(ExecutionReport::fill(
            OrderStatus::Filled,
            500,
            Money::from_f64(12.5),
            at(10, 0, 1),
        ));
        order
    }

    #[test]
    fn wrapper_exposes_live_fields_by_slot() {
        let wrapper = Node::order_wrapper(live_order());
        let mut context = bare_context();
        translate(&mut context, &wrapper).unwrap();

        let price = context.order_slot(&wrapper, "price").unwrap();
        assert_eq!(price.value(), Some(Ok(Value::Money(Money::from_f64(12.5)))));
        let quantity = context.order_slot(&wrapper, "quantity").unwrap();
        assert_eq!(quantity.value(), Some(Ok(Value::Integer(500))));
        assert!(context.order_slot(&wrapper, "nonexistent").is_none());

        let child = translate(&mut context, wrapper.find_child("price").unwrap()).unwrap();
        assert!(child.ptr_eq(&price));
    }

    #[test]
    fn wrapped_order_is_published() {
        let order = live_order();
        let wrapper = Node::order_wrapper(order.clone());
        let mut context = bare_context();
        let translation = translate(&mut context, &wrapper).unwrap();
        evaluate(&context, &translation, 10);
        assert_eq!(context.publisher().orders(), vec![order]);
    }

    #[test]
    fn monitor_replays_report_history() {
        let wrapper = Node::order_wrapper(live_order());
        let monitor = Node::new(NodeKind::ExecutionReportMonitor, vec![wrapper]).unwrap();
        let mut context = bare_context();
        let translation = translate(&mut context, &monitor).unwrap();
        let statuses: Vec<_> = evaluate(&context, &translation, 20)
            .into_iter()
            .map(|value| match value {
                Ok(Value::Record(record)) => record.get(2).cloned(),
                other => panic!("expected a report record, got {other:?}"),
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                Some(Value::OrderStatus(OrderStatus::New)),
                Some(Value::OrderStatus(OrderStatus::Filled)),
            ]
        );
    }

    #[test]
    fn terminal_statuses_from_the_monitor() {
        let monitor = Node::new(
            NodeKind::ExecutionReportMonitor,
            vec![Node::order_wrapper(live_order())],
        )
        .unwrap();
        let status = Node::query(monitor, "status").unwrap();
        let terminal = Node::new(NodeKind::IsTerminal, vec![status]).unwrap();
        let mut context = bare_context();
        let translation = translate(&mut context, &terminal).unwrap();
        assert_eq!(
            evaluate(&context, &translation, 20),
            vec![Ok(Value::Bool(false)), Ok(Value::Bool(true))]
        );
    }
}

mod spawned_orders {
    use super::*;

    fn spawn(trigger: Node) -> Node {
        let order = build_program(&settings("Limit Bid Order", None)).unwrap();
        Node::new(NodeKind::Spawn, vec![trigger, order]).unwrap()
    }

    #[test]
    fn each_trigger_submits_a_fresh_order() {
        let range = Node::new(NodeKind::Range, vec![Node::value(1i64), Node::value(3i64)]).unwrap();
        let program = spawn(range);
        let mut context = CompilationContext::new(ACCOUNT, fixed_clock())
            .unwrap()
            .with_order_client(simulated_venue(true, None));
        let report =
            session::run(&mut context, &program, 200, Duration::from_millis(500)).unwrap();

        assert!(matches!(report.outcome, RunOutcome::Complete { .. }));
        assert_eq!(report.orders.len(), 3);
        let mut ids: Vec<_> = report.orders.iter().map(OrderHandle::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert!(report
            .orders
            .iter()
            .all(|order| order.status() == OrderStatus::Filled));
    }

    #[test]
    fn nothing_is_submitted_without_a_trigger() {
        let program = spawn(Node::typed(NodeKind::None, CanvasType::Integer, vec![]));
        let mut context = CompilationContext::new(ACCOUNT, fixed_clock())
            .unwrap()
            .with_order_client(simulated_venue(true, None));
        let report =
            session::run(&mut context, &program, 50, Duration::from_millis(200)).unwrap();

        assert!(matches!(report.outcome, RunOutcome::Complete { .. }));
        assert!(report.orders.is_empty());
    }

    #[test]
    fn spawn_rejects_a_template_that_is_not_an_order() {
        let err = Node::new(NodeKind::Spawn, vec![Node::value(1i64), Node::value(2i64)]);
        assert!(err.is_err());
    }
}
