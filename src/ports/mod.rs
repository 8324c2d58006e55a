//! Port traits for the services a compiled graph talks to.

pub mod config_port;
pub mod market_data_port;
pub mod order_execution_port;
pub mod script_port;
pub mod time_port;
pub mod timer_port;
