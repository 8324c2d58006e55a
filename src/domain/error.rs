//! Domain error types.

use crate::domain::types::CanvasType;

/// Errors raised while compiling a node tree into a reactive graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("no signature of {kind} accepts ({arguments})")]
    NoMatchingSignature { kind: String, arguments: String },

    #[error("{child} is not a child of {parent}")]
    InvalidChild { parent: String, child: String },

    #[error("slot {slot} requires {expected}, found {found}")]
    TypeRejected {
        slot: String,
        expected: CanvasType,
        found: CanvasType,
    },

    #[error("no node answers the reference path '{path}'")]
    DanglingReference { path: String },

    #[error("expected a translation of {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("{kind} is missing its {slot} child")]
    MissingChild { kind: String, slot: String },

    #[error("invalid node {node}: {reason}")]
    InvalidNode { node: String, reason: String },
}

/// A failure carried as the value of a series.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("Division by 0.")]
    DivisionByZero,

    #[error("script failed to load: {0}")]
    ScriptLoadFailure(String),

    #[error("script failed: {0}")]
    ScriptFailure(String),

    #[error("order submission failed: {0}")]
    OrderSubmission(String),

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("{0} disconnected")]
    Disconnected(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("value read before evaluation")]
    Unavailable,

    #[error("arithmetic overflow")]
    Overflow,
}

/// Top-level error type for tradeflow.
#[derive(Debug, thiserror::Error)]
pub enum TradeflowError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("run failed: {0}")]
    Runtime(Fault),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradeflowError> for std::process::ExitCode {
    fn from(err: &TradeflowError) -> Self {
        let code: u8 = match err {
            TradeflowError::Io(_) => 1,
            TradeflowError::ConfigParse { .. }
            | TradeflowError::ConfigMissing { .. }
            | TradeflowError::ConfigInvalid { .. } => 2,
            TradeflowError::Compile(_) => 3,
            TradeflowError::MarketData { .. }
            | TradeflowError::OrderRejected { .. }
            | TradeflowError::Runtime(_) => 4,
        };
        std::process::ExitCode::from(code)
    }
}
