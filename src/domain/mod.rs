//! Node trees, the reactive runtime, and the compiler between them.

pub mod catalog;
pub mod config_validation;
pub mod context;
pub mod error;
pub mod market;
pub mod node;
pub mod order;
pub mod reactor;
pub mod session;
pub mod signatures;
pub mod translation;
pub mod translator;
pub mod types;
pub mod value;
