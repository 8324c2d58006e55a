//! Concrete collaborators behind the port traits.

pub mod csv_market_data_adapter;
pub mod file_config_adapter;
pub mod simulated_order_adapter;
pub mod system_time_adapter;
pub mod thread_timer_adapter;
