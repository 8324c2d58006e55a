//! Signature tables and resolution.
//!
//! Each node kind declares its admissible `(parameters..) -> return`
//! combinations in a fixed order. Resolution walks the table in that order and
//! takes the first signature that accepts the arguments, so more specific
//! overloads must be listed before more general ones.

use std::fmt;

use crate::domain::error::CompileError;
use crate::domain::node::NodeKind;
use crate::domain::types::{
    compatibility, execution_report_type, order_imbalance_type, quote_type, time_and_sale_type,
    CanvasType, Compatibility, NativeType,
};

use CanvasType as T;

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<CanvasType>,
    /// Type of every argument past `params`, for kinds with open arity.
    pub rest: Option<CanvasType>,
    pub ret: CanvasType,
}

impl Signature {
    pub fn new(params: Vec<CanvasType>, ret: CanvasType) -> Self {
        Self {
            params,
            rest: None,
            ret,
        }
    }

    pub fn variadic(params: Vec<CanvasType>, rest: CanvasType, ret: CanvasType) -> Self {
        Self {
            params,
            rest: Some(rest),
            ret,
        }
    }

    pub fn param(&self, index: usize) -> Option<&CanvasType> {
        self.params.get(index).or(self.rest.as_ref())
    }

    /// Whether every argument fits its parameter.
    pub fn accepts(&self, arguments: &[CanvasType]) -> bool {
        let arity_ok = match self.rest {
            Some(_) => arguments.len() >= self.params.len(),
            None => arguments.len() == self.params.len(),
        };
        arity_ok
            && arguments.iter().enumerate().all(|(i, argument)| {
                self.param(i)
                    .is_some_and(|p| compatibility(argument, p) != Compatibility::None)
            })
    }

    fn returns_into(&self, declared: &CanvasType) -> bool {
        if compatibility(&self.ret, declared) != Compatibility::None {
            return true;
        }
        self.ret.native_type() == Some(NativeType::Record)
            && declared.native_type() == Some(NativeType::Record)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        if let Some(rest) = &self.rest {
            if !self.params.is_empty() {
                f.write_str(", ")?;
            }
            write!(f, "{rest}...")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// Picks the first signature accepting `arguments` whose return type fits the
/// declared type, if one is given.
pub fn resolve<'a>(
    kind: &str,
    signatures: &'a [Signature],
    arguments: &[CanvasType],
    declared: Option<&CanvasType>,
) -> Result<&'a Signature, CompileError> {
    signatures
        .iter()
        .find(|s| s.accepts(arguments) && declared.is_none_or(|d| s.returns_into(d)))
        .ok_or_else(|| CompileError::NoMatchingSignature {
            kind: kind.to_string(),
            arguments: arguments
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Union of the parameter types a slot accepts across all signatures.
pub fn slot_type(signatures: &[Signature], index: usize) -> CanvasType {
    let mut members: Vec<CanvasType> = Vec::new();
    for param in signatures.iter().filter_map(|s| s.param(index)) {
        if !members.contains(param) {
            members.push(param.clone());
        }
    }
    match members.len() {
        0 => CanvasType::any(),
        1 => members.remove(0),
        _ => CanvasType::union(members),
    }
}

fn binary(params: [CanvasType; 2], ret: CanvasType) -> Signature {
    Signature::new(params.to_vec(), ret)
}

fn every_type() -> impl Iterator<Item = CanvasType> {
    NativeType::ALL.into_iter().map(CanvasType::from_native)
}

fn ordered_types() -> impl Iterator<Item = CanvasType> {
    NativeType::ALL
        .into_iter()
        .filter(|t| t.is_ordered())
        .map(CanvasType::from_native)
}

/// The signature table of a node kind, in declaration order.
pub fn signatures(kind: &NodeKind) -> Vec<Signature> {
    match kind {
        NodeKind::Addition => vec![
            binary([T::Integer, T::Integer], T::Integer),
            binary([T::Decimal, T::Decimal], T::Decimal),
            binary([T::Money, T::Money], T::Money),
            binary([T::Duration, T::Duration], T::Duration),
            binary([T::DateTime, T::Duration], T::DateTime),
            binary([T::Duration, T::DateTime], T::DateTime),
            binary([T::Text, T::Text], T::Text),
        ],
        NodeKind::Subtraction => vec![
            binary([T::Integer, T::Integer], T::Integer),
            binary([T::Decimal, T::Decimal], T::Decimal),
            binary([T::Money, T::Money], T::Money),
            binary([T::DateTime, T::DateTime], T::Duration),
            binary([T::DateTime, T::Duration], T::DateTime),
            binary([T::Duration, T::Duration], T::Duration),
        ],
        NodeKind::Multiplication => vec![
            binary([T::Integer, T::Integer], T::Integer),
            binary([T::Decimal, T::Decimal], T::Decimal),
            binary([T::Money, T::Integer], T::Money),
            binary([T::Integer, T::Money], T::Money),
            binary([T::Money, T::Decimal], T::Money),
            binary([T::Decimal, T::Money], T::Money),
            binary([T::Duration, T::Integer], T::Duration),
            binary([T::Integer, T::Duration], T::Duration),
            binary([T::Duration, T::Decimal], T::Duration),
            binary([T::Decimal, T::Duration], T::Duration),
        ],
        NodeKind::Division => vec![
            binary([T::Decimal, T::Decimal], T::Decimal),
            binary([T::Money, T::Integer], T::Money),
            binary([T::Money, T::Decimal], T::Money),
            binary([T::Money, T::Money], T::Decimal),
            binary([T::Duration, T::Integer], T::Duration),
            binary([T::Duration, T::Decimal], T::Duration),
            binary([T::Duration, T::Duration], T::Decimal),
        ],
        NodeKind::Max | NodeKind::Min => vec![
            binary([T::Integer, T::Integer], T::Integer),
            binary([T::Decimal, T::Decimal], T::Decimal),
            binary([T::Money, T::Money], T::Money),
            binary([T::Duration, T::Duration], T::Duration),
            binary([T::DateTime, T::DateTime], T::DateTime),
        ],
        NodeKind::Abs => vec![
            Signature::new(vec![T::Integer], T::Integer),
            Signature::new(vec![T::Decimal], T::Decimal),
            Signature::new(vec![T::Money], T::Money),
            Signature::new(vec![T::Duration], T::Duration),
        ],
        NodeKind::Floor | NodeKind::Ceil | NodeKind::Round => vec![
            binary([T::Decimal, T::Decimal], T::Decimal),
            binary([T::Money, T::Money], T::Money),
            binary([T::Duration, T::Duration], T::Duration),
        ],
        NodeKind::Not => vec![
            Signature::new(vec![T::Bool], T::Bool),
            Signature::new(vec![T::Side], T::Side),
        ],
        NodeKind::Equals | NodeKind::Unequal => every_type()
            .map(|t| binary([t.clone(), t], T::Bool))
            .collect(),
        NodeKind::Greater
        | NodeKind::GreaterOrEquals
        | NodeKind::Lesser
        | NodeKind::LesserOrEquals => ordered_types()
            .map(|t| binary([t.clone(), t], T::Bool))
            .collect(),
        NodeKind::If => every_type()
            .map(|t| Signature::new(vec![T::Bool, t.clone(), t.clone()], t))
            .collect(),
        NodeKind::Chain | NodeKind::Aggregate => every_type()
            .map(|t| Signature::variadic(Vec::new(), t.clone(), t))
            .collect(),
        NodeKind::When | NodeKind::Until | NodeKind::Filter => every_type()
            .map(|t| binary([T::Bool, t.clone()], t))
            .collect(),
        NodeKind::Distinct | NodeKind::First | NodeKind::Last | NodeKind::Previous => {
            every_type()
                .map(|t| Signature::new(vec![t.clone()], t))
                .collect()
        }
        NodeKind::Count => every_type()
            .map(|t| Signature::new(vec![t], T::Integer))
            .collect(),
        NodeKind::Fold => every_type()
            .map(|t| binary([t.clone(), t.clone()], t))
            .collect(),
        NodeKind::Range => vec![binary([T::Integer, T::Integer], T::Integer)],
        NodeKind::CurrentDateTime | NodeKind::CurrentDate => {
            vec![Signature::new(Vec::new(), T::DateTime)]
        }
        NodeKind::CurrentTime => vec![Signature::new(Vec::new(), T::Duration)],
        NodeKind::Timer => vec![Signature::new(vec![T::Duration], T::Integer)],
        NodeKind::Alarm => vec![Signature::new(vec![T::DateTime], T::Bool)],
        NodeKind::TimeAndSaleQuery => {
            vec![Signature::new(vec![T::Security], time_and_sale_type())]
        }
        NodeKind::BboQuoteQuery => vec![binary([T::Security, T::Side], quote_type())],
        NodeKind::OrderImbalanceQuery => {
            vec![Signature::new(vec![T::Venue], order_imbalance_type())]
        }
        NodeKind::SingleOrder | NodeKind::OrderWrapper(_) => {
            vec![Signature::variadic(
                vec![
                    T::Security,
                    T::Currency,
                    T::OrderType,
                    T::Side,
                    T::Venue,
                    T::Integer,
                    T::Money,
                    T::TimeInForce,
                ],
                CanvasType::any(),
                T::Order,
            )]
        }
        NodeKind::ExecutionReportMonitor => {
            vec![Signature::new(vec![T::Order], execution_report_type())]
        }
        NodeKind::IsTerminal => vec![Signature::new(vec![T::OrderStatus], T::Bool)],
        NodeKind::Spawn => vec![binary([CanvasType::any(), T::Order], T::Order)],
        NodeKind::Value(_)
        | NodeKind::None
        | NodeKind::FoldOperand(_)
        | NodeKind::Record
        | NodeKind::Query { .. }
        | NodeKind::Reference { .. }
        | NodeKind::Script { .. } => Vec::new(),
    }
}

/// Kinds listed by the `signatures` command, in display order.
pub fn tabulated_kinds() -> Vec<NodeKind> {
    vec![
        NodeKind::Addition,
        NodeKind::Subtraction,
        NodeKind::Multiplication,
        NodeKind::Division,
        NodeKind::Max,
        NodeKind::Min,
        NodeKind::Abs,
        NodeKind::Floor,
        NodeKind::Ceil,
        NodeKind::Round,
        NodeKind::Not,
        NodeKind::Equals,
        NodeKind::Unequal,
        NodeKind::Greater,
        NodeKind::GreaterOrEquals,
        NodeKind::Lesser,
        NodeKind::LesserOrEquals,
        NodeKind::If,
        NodeKind::Chain,
        NodeKind::When,
        NodeKind::Until,
        NodeKind::Filter,
        NodeKind::Distinct,
        NodeKind::Count,
        NodeKind::First,
        NodeKind::Last,
        NodeKind::Previous,
        NodeKind::Fold,
        NodeKind::Range,
        NodeKind::Aggregate,
        NodeKind::CurrentDateTime,
        NodeKind::CurrentDate,
        NodeKind::CurrentTime,
        NodeKind::Timer,
        NodeKind::Alarm,
        NodeKind::TimeAndSaleQuery,
        NodeKind::BboQuoteQuery,
        NodeKind::OrderImbalanceQuery,
        NodeKind::SingleOrder,
        NodeKind::ExecutionReportMonitor,
        NodeKind::IsTerminal,
        NodeKind::Spawn,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(kind: NodeKind, arguments: &[CanvasType]) -> Signature {
        let table = signatures(&kind);
        resolve(kind.name(), &table, arguments, None).unwrap().clone()
    }

    #[test]
    fn first_declared_overload_wins() {
        let table = vec![
            binary([T::Money, T::Money], T::Money),
            binary([T::Money, T::Decimal], T::Money),
        ];
        let picked = resolve("Test", &table, &[T::Money, T::Money], None).unwrap();
        assert_eq!(picked.params, vec![T::Money, T::Money]);

        let reversed = vec![table[1].clone(), table[0].clone()];
        let picked = resolve("Test", &reversed, &[T::Money, T::Money], None).unwrap();
        assert_eq!(picked.params, vec![T::Money, T::Money]);
        let picked = resolve("Test", &reversed, &[T::Money, T::Integer], None).unwrap();
        assert_eq!(picked.params, vec![T::Money, T::Decimal]);
    }

    #[test]
    fn integers_widen_for_mixed_arithmetic() {
        assert_eq!(
            resolved(NodeKind::Addition, &[T::Integer, T::Decimal]).ret,
            T::Decimal
        );
        assert_eq!(
            resolved(NodeKind::Addition, &[T::Integer, T::Money]).ret,
            T::Money
        );
        assert_eq!(
            resolved(NodeKind::Addition, &[T::Integer, T::Integer]).ret,
            T::Integer
        );
    }

    #[test]
    fn timestamp_and_duration_arithmetic() {
        assert_eq!(
            resolved(NodeKind::Subtraction, &[T::DateTime, T::DateTime]).ret,
            T::Duration
        );
        assert_eq!(
            resolved(NodeKind::Multiplication, &[T::Duration, T::Integer]).ret,
            T::Duration
        );
        assert_eq!(
            resolved(NodeKind::Division, &[T::Duration, T::Duration]).ret,
            T::Decimal
        );
    }

    #[test]
    fn money_division_overloads() {
        assert_eq!(resolved(NodeKind::Division, &[T::Money, T::Money]).ret, T::Decimal);
        assert_eq!(resolved(NodeKind::Division, &[T::Money, T::Integer]).ret, T::Money);
        assert_eq!(
            resolved(NodeKind::Division, &[T::Integer, T::Integer]).ret,
            T::Decimal
        );
    }

    #[test]
    fn declared_type_filters_candidates() {
        let table = signatures(&NodeKind::Addition);
        let picked = resolve("Addition", &table, &[T::Integer, T::Integer], Some(&T::Money));
        assert_eq!(picked.unwrap().params, vec![T::Integer, T::Integer]);
        let picked = resolve("Addition", &table, &[T::Integer, T::Integer], Some(&T::Side));
        assert!(picked.is_err());
    }

    #[test]
    fn arity_must_match() {
        let table = signatures(&NodeKind::Addition);
        let err = resolve("Addition", &table, &[T::Integer], None).unwrap_err();
        assert_eq!(
            err,
            CompileError::NoMatchingSignature {
                kind: "Addition".into(),
                arguments: "Integer".into(),
            }
        );
    }

    #[test]
    fn spawn_takes_any_trigger_but_only_orders() {
        let table = signatures(&NodeKind::Spawn);
        assert!(resolve("Spawn", &table, &[T::Bool, T::Order], None).is_ok());
        assert!(resolve("Spawn", &table, &[T::Money, T::Order], None).is_ok());
        assert!(resolve("Spawn", &table, &[T::Bool, T::Integer], None).is_err());
        assert_eq!(resolved(NodeKind::IsTerminal, &[T::OrderStatus]).ret, T::Bool);
    }

    #[test]
    fn variadic_chain_accepts_any_count() {
        let table = signatures(&NodeKind::Chain);
        assert!(resolve("Chain", &table, &[T::Integer, T::Integer, T::Integer], None).is_ok());
        assert!(resolve("Chain", &table, &[T::Integer, T::Side], None).is_err());
    }

    #[test]
    fn order_task_takes_extra_fields() {
        let mut arguments = vec![
            T::Security,
            T::Currency,
            T::OrderType,
            T::Side,
            T::Venue,
            T::Integer,
            T::Money,
            T::TimeInForce,
        ];
        assert_eq!(resolved(NodeKind::SingleOrder, &arguments).ret, T::Order);
        arguments.push(T::Text);
        assert_eq!(resolved(NodeKind::SingleOrder, &arguments).ret, T::Order);
        arguments[6] = T::Integer;
        assert_eq!(resolved(NodeKind::SingleOrder, &arguments).ret, T::Order);
    }

    #[test]
    fn slot_type_unions_parameters() {
        let slot = slot_type(&signatures(&NodeKind::Not), 0);
        assert_eq!(slot, CanvasType::union(vec![T::Bool, T::Side]));
        assert_eq!(slot_type(&signatures(&NodeKind::Range), 1), T::Integer);
    }

    #[test]
    fn display_format() {
        assert_eq!(
            binary([T::Money, T::Money], T::Money).to_string(),
            "(Money, Money) -> Money"
        );
        assert_eq!(
            Signature::variadic(Vec::new(), T::Integer, T::Integer).to_string(),
            "(Integer...) -> Integer"
        );
    }
}
