//! Type descriptors and the compatibility relation between them.

use std::fmt;
use std::rc::Rc;

/// Tag for the concrete Rust type a series produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NativeType {
    Bool,
    Integer,
    Decimal,
    Money,
    Currency,
    Duration,
    DateTime,
    Text,
    Security,
    Venue,
    Side,
    OrderType,
    TimeInForce,
    OrderStatus,
    Order,
    Record,
}

impl NativeType {
    pub const ALL: [NativeType; 16] = [
        NativeType::Bool,
        NativeType::Integer,
        NativeType::Decimal,
        NativeType::Money,
        NativeType::Currency,
        NativeType::Duration,
        NativeType::DateTime,
        NativeType::Text,
        NativeType::Security,
        NativeType::Venue,
        NativeType::Side,
        NativeType::OrderType,
        NativeType::TimeInForce,
        NativeType::OrderStatus,
        NativeType::Order,
        NativeType::Record,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NativeType::Bool => "Boolean",
            NativeType::Integer => "Integer",
            NativeType::Decimal => "Decimal",
            NativeType::Money => "Money",
            NativeType::Currency => "Currency",
            NativeType::Duration => "Duration",
            NativeType::DateTime => "DateTime",
            NativeType::Text => "Text",
            NativeType::Security => "Security",
            NativeType::Venue => "Venue",
            NativeType::Side => "Side",
            NativeType::OrderType => "OrderType",
            NativeType::TimeInForce => "TimeInForce",
            NativeType::OrderStatus => "OrderStatus",
            NativeType::Order => "Order",
            NativeType::Record => "Record",
        }
    }

    /// Types with a total order usable by comparison nodes.
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            NativeType::Integer
                | NativeType::Decimal
                | NativeType::Money
                | NativeType::Duration
                | NativeType::DateTime
                | NativeType::Text
        )
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named, ordered record layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    fields: Vec<(String, CanvasType)>,
}

impl RecordType {
    pub fn new(fields: Vec<(String, CanvasType)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, CanvasType)] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }

    pub fn field_type(&self, name: &str) -> Option<&CanvasType> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, t)| t)
    }
}

/// A value category attached to nodes and signature slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanvasType {
    Bool,
    Integer,
    Decimal,
    Money,
    Currency,
    Duration,
    DateTime,
    Text,
    Security,
    Venue,
    Side,
    OrderType,
    TimeInForce,
    OrderStatus,
    Order,
    Record(Rc<RecordType>),
    Union(Rc<[CanvasType]>),
    Sequence(Rc<CanvasType>),
}

impl CanvasType {
    pub fn record(record: RecordType) -> Self {
        CanvasType::Record(Rc::new(record))
    }

    pub fn union(members: Vec<CanvasType>) -> Self {
        CanvasType::Union(members.into())
    }

    pub fn sequence(element: CanvasType) -> Self {
        CanvasType::Sequence(Rc::new(element))
    }

    /// Union of every type a series can carry.
    pub fn any() -> Self {
        CanvasType::union(
            NativeType::ALL
                .iter()
                .filter(|t| **t != NativeType::Record)
                .map(|t| CanvasType::from_native(*t))
                .chain(std::iter::once(CanvasType::record(RecordType::new(
                    Vec::new(),
                ))))
                .collect(),
        )
    }

    /// Descriptor for a native tag. Records map to the empty layout.
    pub fn from_native(native: NativeType) -> Self {
        match native {
            NativeType::Bool => CanvasType::Bool,
            NativeType::Integer => CanvasType::Integer,
            NativeType::Decimal => CanvasType::Decimal,
            NativeType::Money => CanvasType::Money,
            NativeType::Currency => CanvasType::Currency,
            NativeType::Duration => CanvasType::Duration,
            NativeType::DateTime => CanvasType::DateTime,
            NativeType::Text => CanvasType::Text,
            NativeType::Security => CanvasType::Security,
            NativeType::Venue => CanvasType::Venue,
            NativeType::Side => CanvasType::Side,
            NativeType::OrderType => CanvasType::OrderType,
            NativeType::TimeInForce => CanvasType::TimeInForce,
            NativeType::OrderStatus => CanvasType::OrderStatus,
            NativeType::Order => CanvasType::Order,
            NativeType::Record => CanvasType::record(RecordType::new(Vec::new())),
        }
    }

    /// The runtime type of a series of this descriptor, or `None` when the
    /// descriptor is polymorphic.
    pub fn native_type(&self) -> Option<NativeType> {
        match self {
            CanvasType::Bool => Some(NativeType::Bool),
            CanvasType::Integer => Some(NativeType::Integer),
            CanvasType::Decimal => Some(NativeType::Decimal),
            CanvasType::Money => Some(NativeType::Money),
            CanvasType::Currency => Some(NativeType::Currency),
            CanvasType::Duration => Some(NativeType::Duration),
            CanvasType::DateTime => Some(NativeType::DateTime),
            CanvasType::Text => Some(NativeType::Text),
            CanvasType::Security => Some(NativeType::Security),
            CanvasType::Venue => Some(NativeType::Venue),
            CanvasType::Side => Some(NativeType::Side),
            CanvasType::OrderType => Some(NativeType::OrderType),
            CanvasType::TimeInForce => Some(NativeType::TimeInForce),
            CanvasType::OrderStatus => Some(NativeType::OrderStatus),
            CanvasType::Order => Some(NativeType::Order),
            CanvasType::Record(_) => Some(NativeType::Record),
            CanvasType::Union(_) | CanvasType::Sequence(_) => None,
        }
    }

    pub fn is_concrete(&self) -> bool {
        self.native_type().is_some()
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            CanvasType::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl fmt::Display for CanvasType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasType::Record(record) => {
                f.write_str("Record(")?;
                for (i, (name, field)) in record.fields().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {field}")?;
                }
                f.write_str(")")
            }
            CanvasType::Union(members) => {
                f.write_str("Union(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str(")")
            }
            CanvasType::Sequence(element) => write!(f, "Sequence({element})"),
            other => match other.native_type() {
                Some(native) => f.write_str(native.name()),
                None => f.write_str("?"),
            },
        }
    }
}

/// Outcome of comparing an argument type against a slot type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Compatibility {
    None,
    Compatible,
    Equal,
}

/// Compatibility of `argument` when placed in a slot of type `slot`.
///
/// The relation is asymmetric. Widenings accepted: Integer into Decimal,
/// Integer into Money, any member into a union that contains it, a union whose
/// members all fit into the slot, and sequences with compatible elements.
pub fn compatibility(argument: &CanvasType, slot: &CanvasType) -> Compatibility {
    if argument == slot {
        return Compatibility::Equal;
    }
    match (argument, slot) {
        (CanvasType::Integer, CanvasType::Decimal) | (CanvasType::Integer, CanvasType::Money) => {
            Compatibility::Compatible
        }
        (CanvasType::Sequence(a), CanvasType::Sequence(b)) => {
            match compatibility(a, b) {
                Compatibility::None => Compatibility::None,
                _ => Compatibility::Compatible,
            }
        }
        (CanvasType::Union(members), _) => {
            if members
                .iter()
                .all(|member| compatibility(member, slot) != Compatibility::None)
            {
                Compatibility::Compatible
            } else {
                Compatibility::None
            }
        }
        (_, CanvasType::Union(members)) => {
            if members
                .iter()
                .any(|member| compatibility(argument, member) != Compatibility::None)
            {
                Compatibility::Compatible
            } else {
                Compatibility::None
            }
        }
        (CanvasType::Record(a), CanvasType::Record(b)) if b.fields().is_empty() => {
            if a.fields().is_empty() {
                Compatibility::Equal
            } else {
                Compatibility::Compatible
            }
        }
        _ => Compatibility::None,
    }
}

/// Field layout produced by time and sales queries.
pub fn time_and_sale_type() -> CanvasType {
    CanvasType::record(RecordType::new(vec![
        ("timestamp".into(), CanvasType::DateTime),
        ("price".into(), CanvasType::Money),
        ("size".into(), CanvasType::Integer),
        ("market_center".into(), CanvasType::Text),
    ]))
}

/// Field layout produced by BBO quote queries (one side of the book).
pub fn quote_type() -> CanvasType {
    CanvasType::record(RecordType::new(vec![
        ("price".into(), CanvasType::Money),
        ("size".into(), CanvasType::Integer),
        ("side".into(), CanvasType::Side),
        ("timestamp".into(), CanvasType::DateTime),
    ]))
}

pub fn order_imbalance_type() -> CanvasType {
    CanvasType::record(RecordType::new(vec![
        ("security".into(), CanvasType::Security),
        ("side".into(), CanvasType::Side),
        ("size".into(), CanvasType::Integer),
        ("reference_price".into(), CanvasType::Money),
        ("timestamp".into(), CanvasType::DateTime),
    ]))
}

pub fn execution_report_type() -> CanvasType {
    CanvasType::record(RecordType::new(vec![
        ("order_id".into(), CanvasType::Integer),
        ("sequence".into(), CanvasType::Integer),
        ("status".into(), CanvasType::OrderStatus),
        ("last_quantity".into(), CanvasType::Integer),
        ("last_price".into(), CanvasType::Money),
        ("timestamp".into(), CanvasType::DateTime),
        ("text".into(), CanvasType::Text),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn native_strategy() -> impl Strategy<Value = CanvasType> {
        prop::sample::select(NativeType::ALL.to_vec()).prop_map(CanvasType::from_native)
    }

    proptest! {
        #[test]
        fn compatibility_is_reflexive(t in native_strategy()) {
            prop_assert_eq!(compatibility(&t, &t), Compatibility::Equal);
        }

        #[test]
        fn every_native_fits_the_any_union(t in native_strategy()) {
            prop_assert_ne!(compatibility(&t, &CanvasType::any()), Compatibility::None);
        }
    }

    #[test]
    fn integer_widens_to_decimal_and_money_only() {
        assert_eq!(
            compatibility(&CanvasType::Integer, &CanvasType::Decimal),
            Compatibility::Compatible
        );
        assert_eq!(
            compatibility(&CanvasType::Integer, &CanvasType::Money),
            Compatibility::Compatible
        );
        assert_eq!(
            compatibility(&CanvasType::Decimal, &CanvasType::Integer),
            Compatibility::None
        );
        assert_eq!(
            compatibility(&CanvasType::Decimal, &CanvasType::Money),
            Compatibility::None
        );
        assert_eq!(
            compatibility(&CanvasType::Money, &CanvasType::Decimal),
            Compatibility::None
        );
    }

    #[test]
    fn records_compare_structurally() {
        assert_eq!(
            compatibility(&time_and_sale_type(), &time_and_sale_type()),
            Compatibility::Equal
        );
        assert_eq!(
            compatibility(&time_and_sale_type(), &quote_type()),
            Compatibility::None
        );
        assert_eq!(
            compatibility(&quote_type(), &CanvasType::from_native(NativeType::Record)),
            Compatibility::Compatible
        );
    }

    #[test]
    fn union_membership() {
        let numeric = CanvasType::union(vec![CanvasType::Decimal, CanvasType::Money]);
        assert_eq!(
            compatibility(&CanvasType::Money, &numeric),
            Compatibility::Compatible
        );
        assert_eq!(
            compatibility(&CanvasType::Integer, &numeric),
            Compatibility::Compatible
        );
        assert_eq!(compatibility(&CanvasType::Side, &numeric), Compatibility::None);
        assert_eq!(compatibility(&numeric, &CanvasType::Money), Compatibility::None);
        assert!(!numeric.is_concrete());
    }

    #[test]
    fn sequences_follow_their_elements() {
        let integers = CanvasType::sequence(CanvasType::Integer);
        assert_eq!(compatibility(&integers, &integers), Compatibility::Equal);
        assert_eq!(
            compatibility(&integers, &CanvasType::sequence(CanvasType::Decimal)),
            Compatibility::Compatible
        );
        assert_eq!(
            compatibility(&integers, &CanvasType::sequence(CanvasType::Side)),
            Compatibility::None
        );
    }

    #[test]
    fn record_field_lookup() {
        let t = execution_report_type();
        let record = t.as_record().unwrap();
        assert_eq!(record.field_index("status"), Some(2));
        assert_eq!(record.field_type("last_price"), Some(&CanvasType::Money));
        assert_eq!(record.field_index("missing"), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(CanvasType::Money.to_string(), "Money");
        assert_eq!(
            CanvasType::union(vec![CanvasType::Bool, CanvasType::Text]).to_string(),
            "Union(Boolean | Text)"
        );
    }
}
