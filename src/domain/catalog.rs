//! Built-in node templates.
//!
//! Order templates pin some of their fields. Pinned children are marked with
//! the `read_only` and `visible` metadata keys so editors can hide them.

use crate::domain::error::CompileError;
use crate::domain::node::{Node, NodeKind};
use crate::domain::types::CanvasType;
use crate::domain::value::{
    Currency, Money, OrderType, Quantity, Security, Side, TimeInForce, Value, Venue,
};

pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Result<Node, CompileError>,
}

impl CatalogEntry {
    /// A fresh copy of the template, labeled with the entry name.
    pub fn instantiate(&self) -> Result<Node, CompileError> {
        Ok((self.build)()?.set_label(self.name))
    }
}

pub fn entries() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            name: "Bid Order",
            description: "order on the bid side",
            build: || pin(base_order(), "side", Side::Bid),
        },
        CatalogEntry {
            name: "Ask Order",
            description: "order on the ask side",
            build: || pin(base_order(), "side", Side::Ask),
        },
        CatalogEntry {
            name: "Limit Order",
            description: "limit order on either side",
            build: limit_order,
        },
        CatalogEntry {
            name: "Limit Bid Order",
            description: "limit order on the bid side",
            build: || pin(limit_order()?, "side", Side::Bid),
        },
        CatalogEntry {
            name: "Limit Ask Order",
            description: "limit order on the ask side",
            build: || pin(limit_order()?, "side", Side::Ask),
        },
        CatalogEntry {
            name: "Market Order",
            description: "market order, price ignored",
            build: market_order,
        },
        CatalogEntry {
            name: "Market Bid Order",
            description: "market order on the bid side",
            build: || pin(market_order()?, "side", Side::Bid),
        },
        CatalogEntry {
            name: "Market Ask Order",
            description: "market order on the ask side",
            build: || pin(market_order()?, "side", Side::Ask),
        },
        CatalogEntry {
            name: "Pegged Order",
            description: "order pegged to the market",
            build: || pin(base_order(), "order_type", OrderType::Pegged),
        },
        CatalogEntry {
            name: "Time and Sales",
            description: "time and sales of a security",
            build: || {
                Node::new(
                    NodeKind::TimeAndSaleQuery,
                    vec![Node::value(Security::new("", ""))],
                )
            },
        },
        CatalogEntry {
            name: "BBO Quote",
            description: "best bid or offer of a security",
            build: || {
                Node::new(
                    NodeKind::BboQuoteQuery,
                    vec![Node::value(Security::new("", "")), Node::value(Side::Bid)],
                )
            },
        },
    ]
}

/// Looks an entry up by name, ignoring case.
pub fn find(name: &str) -> Option<CatalogEntry> {
    entries()
        .into_iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

fn base_order() -> Node {
    Node::typed(
        NodeKind::SingleOrder,
        CanvasType::Order,
        vec![
            Node::value(Security::new("", "")),
            Node::value(Currency::default()),
            Node::value(OrderType::Limit),
            Node::value(Side::Bid),
            Node::value(Venue::default()),
            Node::value(100 as Quantity),
            Node::value(Money::ZERO),
            Node::value(TimeInForce::Day),
        ],
    )
}

fn limit_order() -> Result<Node, CompileError> {
    pin(base_order(), "order_type", OrderType::Limit)
}

fn market_order() -> Result<Node, CompileError> {
    let order = pin(base_order(), "order_type", OrderType::Market)?;
    hide(order, "price")
}

/// Replaces the slot's child with a read-only literal.
fn pin(node: Node, slot: &str, value: impl Into<Value>) -> Result<Node, CompileError> {
    let pinned = Node::value(value)
        .set_metadata("read_only", "true")
        .set_metadata("visible", "false");
    let child = child(&node, slot)?;
    node.replace(child, pinned)
}

fn hide(node: Node, slot: &str) -> Result<Node, CompileError> {
    let child = child(&node, slot)?;
    let hidden = child
        .set_metadata("read_only", "true")
        .set_metadata("visible", "false");
    node.replace(child, hidden)
}

fn child<'n>(node: &'n Node, slot: &str) -> Result<&'n Node, CompileError> {
    node.find_child(slot).ok_or_else(|| CompileError::MissingChild {
        kind: node.kind().name().to_string(),
        slot: slot.to_string(),
    })
}
