//! The node tree: immutable, value-like program elements.
//!
//! A node has a kind, a declared [`CanvasType`], named children whose number
//! and order is fixed by the kind, a cosmetic label and free-form metadata.
//! Mutators return a new node. During one compilation pass a node's storage
//! address is its identity.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::domain::error::CompileError;
use crate::domain::order::handle::OrderHandle;
use crate::domain::signatures::{self, Signature};
use crate::domain::types::{compatibility, CanvasType, Compatibility, NativeType, RecordType};
use crate::domain::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOperand {
    /// The accumulated value.
    Left,
    /// The element being folded in.
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Value(Value),
    None,
    Abs,
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Max,
    Min,
    Floor,
    Ceil,
    Round,
    Not,
    Equals,
    Unequal,
    Greater,
    GreaterOrEquals,
    Lesser,
    LesserOrEquals,
    If,
    Chain,
    When,
    Until,
    Filter,
    Distinct,
    Count,
    First,
    Last,
    Previous,
    Fold,
    FoldOperand(FoldOperand),
    Range,
    Aggregate,
    CurrentDateTime,
    CurrentDate,
    CurrentTime,
    Timer,
    Alarm,
    TimeAndSaleQuery,
    BboQuoteQuery,
    OrderImbalanceQuery,
    Record,
    Query { field: String },
    SingleOrder,
    OrderWrapper(OrderHandle),
    ExecutionReportMonitor,
    IsTerminal,
    Spawn,
    Reference { path: String },
    Script { path: PathBuf },
}

/// Child slot names of an order task, in order.
pub const ORDER_FIELDS: [&str; 8] = [
    "security",
    "currency",
    "order_type",
    "side",
    "destination",
    "quantity",
    "price",
    "time_in_force",
];

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Value(_) => "Value",
            NodeKind::None => "None",
            NodeKind::Abs => "Abs",
            NodeKind::Addition => "Addition",
            NodeKind::Subtraction => "Subtraction",
            NodeKind::Multiplication => "Multiplication",
            NodeKind::Division => "Division",
            NodeKind::Max => "Max",
            NodeKind::Min => "Min",
            NodeKind::Floor => "Floor",
            NodeKind::Ceil => "Ceil",
            NodeKind::Round => "Round",
            NodeKind::Not => "Not",
            NodeKind::Equals => "Equals",
            NodeKind::Unequal => "Unequal",
            NodeKind::Greater => "Greater",
            NodeKind::GreaterOrEquals => "GreaterOrEquals",
            NodeKind::Lesser => "Lesser",
            NodeKind::LesserOrEquals => "LesserOrEquals",
            NodeKind::If => "If",
            NodeKind::Chain => "Chain",
            NodeKind::When => "When",
            NodeKind::Until => "Until",
            NodeKind::Filter => "Filter",
            NodeKind::Distinct => "Distinct",
            NodeKind::Count => "Count",
            NodeKind::First => "First",
            NodeKind::Last => "Last",
            NodeKind::Previous => "Previous",
            NodeKind::Fold => "Fold",
            NodeKind::FoldOperand(_) => "FoldOperand",
            NodeKind::Range => "Range",
            NodeKind::Aggregate => "Aggregate",
            NodeKind::CurrentDateTime => "CurrentDateTime",
            NodeKind::CurrentDate => "CurrentDate",
            NodeKind::CurrentTime => "CurrentTime",
            NodeKind::Timer => "Timer",
            NodeKind::Alarm => "Alarm",
            NodeKind::TimeAndSaleQuery => "TimeAndSaleQuery",
            NodeKind::BboQuoteQuery => "BboQuoteQuery",
            NodeKind::OrderImbalanceQuery => "OrderImbalanceQuery",
            NodeKind::Record => "Record",
            NodeKind::Query { .. } => "Query",
            NodeKind::SingleOrder => "SingleOrder",
            NodeKind::OrderWrapper(_) => "OrderWrapper",
            NodeKind::ExecutionReportMonitor => "ExecutionReportMonitor",
            NodeKind::IsTerminal => "IsTerminal",
            NodeKind::Spawn => "Spawn",
            NodeKind::Reference { .. } => "Reference",
            NodeKind::Script { .. } => "Script",
        }
    }

    /// Names of the fixed child slots. Variadic kinds name children by index.
    pub fn slot_names(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Abs
            | NodeKind::Not
            | NodeKind::Distinct
            | NodeKind::Count
            | NodeKind::First
            | NodeKind::Last
            | NodeKind::Previous => &["source"],
            NodeKind::Addition
            | NodeKind::Subtraction
            | NodeKind::Multiplication
            | NodeKind::Division
            | NodeKind::Max
            | NodeKind::Min
            | NodeKind::Equals
            | NodeKind::Unequal
            | NodeKind::Greater
            | NodeKind::GreaterOrEquals
            | NodeKind::Lesser
            | NodeKind::LesserOrEquals => &["left", "right"],
            NodeKind::Floor | NodeKind::Ceil | NodeKind::Round => &["value", "multiple"],
            NodeKind::If => &["condition", "consequent", "default"],
            NodeKind::When | NodeKind::Until | NodeKind::Filter => &["condition", "series"],
            NodeKind::Fold => &["combiner", "series"],
            NodeKind::Range => &["lower", "upper"],
            NodeKind::Timer => &["period"],
            NodeKind::Alarm => &["expiry"],
            NodeKind::TimeAndSaleQuery => &["security"],
            NodeKind::BboQuoteQuery => &["security", "side"],
            NodeKind::OrderImbalanceQuery => &["venue"],
            NodeKind::Query { .. } => &["record"],
            NodeKind::SingleOrder | NodeKind::OrderWrapper(_) => &ORDER_FIELDS,
            NodeKind::ExecutionReportMonitor => &["orders"],
            NodeKind::IsTerminal => &["status"],
            NodeKind::Spawn => &["trigger", "order"],
            _ => &[],
        }
    }

    /// Kinds whose children are a homogeneous list.
    pub fn is_variadic(&self) -> bool {
        matches!(self, NodeKind::Chain | NodeKind::Aggregate)
    }

    /// Kinds typed by their structure rather than by a signature table.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            NodeKind::Value(_)
                | NodeKind::None
                | NodeKind::FoldOperand(_)
                | NodeKind::Record
                | NodeKind::Query { .. }
                | NodeKind::Reference { .. }
                | NodeKind::Script { .. }
        )
    }

    /// Kinds producing live orders.
    pub fn is_order_task(&self) -> bool {
        matches!(
            self,
            NodeKind::SingleOrder | NodeKind::OrderWrapper(_) | NodeKind::Spawn
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    label: String,
    kind: NodeKind,
    node_type: CanvasType,
    children: Vec<Node>,
    metadata: BTreeMap<String, String>,
}

impl Node {
    /// Builds a node, inferring its type from the kind's signatures.
    pub fn new(kind: NodeKind, children: Vec<Node>) -> Result<Node, CompileError> {
        let argument_types: Vec<CanvasType> =
            children.iter().map(|c| c.node_type.clone()).collect();
        let signatures = signatures::signatures(&kind);
        let signature = signatures::resolve(kind.name(), &signatures, &argument_types, None)?;
        let node_type = inferred_return(signature, &argument_types);
        Ok(Node::typed(kind, node_type, children))
    }

    /// Builds a node with an explicit declared type.
    pub fn typed(kind: NodeKind, node_type: CanvasType, children: Vec<Node>) -> Node {
        let label = kind.name().to_string();
        let children = name_children(&kind, children);
        Node {
            name: String::new(),
            label,
            kind,
            node_type,
            children,
            metadata: BTreeMap::new(),
        }
    }

    pub fn value(value: impl Into<Value>) -> Node {
        let value = value.into();
        let node_type = value.canvas_type();
        let mut node = Node::typed(NodeKind::Value(value.clone()), node_type, Vec::new());
        node.label = value.to_string();
        node
    }

    pub fn none(node_type: CanvasType) -> Node {
        Node::typed(NodeKind::None, node_type, Vec::new())
    }

    pub fn fold_operand(operand: FoldOperand, node_type: CanvasType) -> Node {
        Node::typed(NodeKind::FoldOperand(operand), node_type, Vec::new())
    }

    pub fn reference(path: &str, node_type: CanvasType) -> Node {
        Node::typed(
            NodeKind::Reference {
                path: path.to_string(),
            },
            node_type,
            Vec::new(),
        )
    }

    /// A record whose layout follows the named children.
    pub fn record(fields: Vec<(String, Node)>) -> Node {
        let layout = RecordType::new(
            fields
                .iter()
                .map(|(name, node)| (name.clone(), node.node_type.clone()))
                .collect(),
        );
        let children = fields
            .into_iter()
            .map(|(name, node)| node.with_name(&name))
            .collect();
        Node::typed(NodeKind::Record, CanvasType::record(layout), children)
    }

    pub fn query(record: Node, field: &str) -> Result<Node, CompileError> {
        let field_type = record
            .node_type
            .as_record()
            .and_then(|r| r.field_type(field))
            .cloned()
            .ok_or_else(|| CompileError::InvalidNode {
                node: "Query".into(),
                reason: format!("{} has no field '{field}'", record.node_type),
            })?;
        Ok(Node::typed(
            NodeKind::Query {
                field: field.to_string(),
            },
            field_type,
            vec![record],
        ))
    }

    pub fn script(path: PathBuf, node_type: CanvasType, parameters: Vec<(String, Node)>) -> Node {
        let children = parameters
            .into_iter()
            .map(|(name, node)| node.with_name(&name))
            .collect();
        Node::typed(NodeKind::Script { path }, node_type, children)
    }

    /// Wraps an already submitted order; children mirror its fields.
    pub fn order_wrapper(order: OrderHandle) -> Node {
        let fields = order.fields();
        let children = vec![
            Node::value(fields.security.clone()),
            Node::value(fields.currency.clone()),
            Node::value(fields.order_type),
            Node::value(fields.side),
            Node::value(fields.destination.clone()),
            Node::value(fields.quantity),
            Node::value(fields.price),
            Node::value(fields.time_in_force),
        ];
        Node::typed(NodeKind::OrderWrapper(order), CanvasType::Order, children)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> &CanvasType {
        &self.node_type
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn find_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn with_name(mut self, name: &str) -> Node {
        self.name = name.to_string();
        self
    }

    pub fn set_label(&self, label: &str) -> Node {
        let mut node = self.clone();
        node.label = label.to_string();
        node
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Node {
        let mut node = self.clone();
        node.metadata.insert(key.to_string(), value.to_string());
        node
    }

    /// Replaces the literal of a value node, keeping its name and metadata.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<Node, CompileError> {
        let value = value.into();
        if !matches!(self.kind, NodeKind::Value(_)) {
            return Err(CompileError::InvalidNode {
                node: self.label.clone(),
                reason: "only value nodes hold a literal".into(),
            });
        }
        let found = value.canvas_type();
        if compatibility(&found, &self.node_type) == Compatibility::None {
            return Err(CompileError::TypeRejected {
                slot: self.name.clone(),
                expected: self.node_type.clone(),
                found,
            });
        }
        let mut node = Node::value(value);
        node.name = self.name.clone();
        node.metadata = self.metadata.clone();
        Ok(node)
    }

    /// Type a child in the slot at `index` must be compatible with.
    pub fn slot_type(&self, index: usize) -> CanvasType {
        if matches!(self.kind, NodeKind::Record | NodeKind::Script { .. }) {
            return CanvasType::any();
        }
        if let NodeKind::Query { .. } = &self.kind {
            return CanvasType::from_native(NativeType::Record);
        }
        signatures::slot_type(&signatures::signatures(&self.kind), index)
    }

    /// Returns a copy of this node with `child` swapped for `new_child`.
    ///
    /// `child` is located by identity first, then by name and structure, then
    /// by structure alone, since an inserted child takes the slot's name.
    pub fn replace(&self, child: &Node, new_child: Node) -> Result<Node, CompileError> {
        let index = self
            .children
            .iter()
            .position(|c| std::ptr::eq(c, child))
            .or_else(|| {
                self.children
                    .iter()
                    .position(|c| c.name == child.name && c.structurally_equal(child))
            })
            .or_else(|| self.children.iter().position(|c| c.structurally_equal(child)))
            .ok_or_else(|| CompileError::InvalidChild {
                parent: self.label.clone(),
                child: child.label.clone(),
            })?;
        let slot = self.slot_type(index);
        if compatibility(&new_child.node_type, &slot) == Compatibility::None {
            return Err(CompileError::TypeRejected {
                slot: self.children[index].name.clone(),
                expected: slot,
                found: new_child.node_type.clone(),
            });
        }
        let mut node = self.clone();
        let name = node.children[index].name.clone();
        node.children[index] = new_child.with_name(&name);
        node.node_type = node.retype()?;
        Ok(node)
    }

    fn retype(&self) -> Result<CanvasType, CompileError> {
        match &self.kind {
            NodeKind::Record => Ok(CanvasType::record(RecordType::new(
                self.children
                    .iter()
                    .map(|c| (c.name.clone(), c.node_type.clone()))
                    .collect(),
            ))),
            kind if kind.is_structural() => Ok(self.node_type.clone()),
            kind => {
                let argument_types: Vec<CanvasType> =
                    self.children.iter().map(|c| c.node_type.clone()).collect();
                let signatures = signatures::signatures(kind);
                if signatures::resolve(
                    kind.name(),
                    &signatures,
                    &argument_types,
                    Some(&self.node_type),
                )
                .is_ok()
                {
                    return Ok(self.node_type.clone());
                }
                let signature =
                    signatures::resolve(kind.name(), &signatures, &argument_types, None)?;
                Ok(inferred_return(signature, &argument_types))
            }
        }
    }

    /// Compares kind, type and children, ignoring labels and metadata.
    pub fn structurally_equal(&self, other: &Node) -> bool {
        self.kind == other.kind
            && compatibility(&self.node_type, &other.node_type) == Compatibility::Equal
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| a.structurally_equal(b))
    }

    /// Resolves a dot-separated path of child names starting at this node.
    pub fn resolve(&self, path: &str) -> Result<&Node, CompileError> {
        let mut current = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = current
                .find_child(segment)
                .ok_or_else(|| CompileError::DanglingReference {
                    path: path.to_string(),
                })?;
        }
        Ok(current)
    }

    /// First fold operand of the given side, not descending into nested folds.
    pub fn find_fold_operand(&self, operand: FoldOperand) -> Option<&Node> {
        if self.kind == NodeKind::FoldOperand(operand) {
            return Some(self);
        }
        if self.kind == NodeKind::Fold {
            return None;
        }
        self.children
            .iter()
            .find_map(|c| c.find_fold_operand(operand))
    }
}

fn name_children(kind: &NodeKind, children: Vec<Node>) -> Vec<Node> {
    let slots = kind.slot_names();
    children
        .into_iter()
        .enumerate()
        .map(|(i, child)| {
            if kind.is_variadic() {
                child.with_name(&i.to_string())
            } else if let Some(slot) = slots.get(i) {
                child.with_name(slot)
            } else {
                child
            }
        })
        .collect()
}

/// Return type of a resolved signature. Generic record returns adopt the
/// layout of the last record argument.
fn inferred_return(signature: &Signature, arguments: &[CanvasType]) -> CanvasType {
    if let CanvasType::Record(record) = &signature.ret {
        if record.fields().is_empty() {
            if let Some(layout) = arguments.iter().rev().find(|a| a.as_record().is_some()) {
                return layout.clone();
            }
        }
    }
    signature.ret.clone()
}
