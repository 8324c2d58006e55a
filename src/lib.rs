//! tradeflow: compiles trading node trees into reactive graphs.
//!
//! Hexagonal architecture: node trees, the compiler and the reactive runtime
//! in [`domain`], collaborator traits in [`ports`], concrete implementations
//! in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
