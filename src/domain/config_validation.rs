//! Session configuration validation.
//!
//! Validates every config field before a simulation runs.

use std::str::FromStr;

use crate::domain::catalog;
use crate::domain::error::TradeflowError;
use crate::domain::value::{Money, Side, TimeInForce};
use crate::ports::config_port::ConfigPort;

pub fn validate_session_config(config: &dyn ConfigPort) -> Result<(), TradeflowError> {
    validate_account(config)?;
    validate_run_limits(config)?;
    validate_order_entry(config)?;
    validate_order_fields(config)?;
    validate_simulation(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> TradeflowError {
    TradeflowError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, TradeflowError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(TradeflowError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, TradeflowError>
where
    T::Err: std::fmt::Display,
{
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| invalid(section, key, e.to_string())),
        _ => Ok(None),
    }
}

fn validate_account(config: &dyn ConfigPort) -> Result<(), TradeflowError> {
    required(config, "session", "account").map(|_| ())
}

fn validate_run_limits(config: &dyn ConfigPort) -> Result<(), TradeflowError> {
    if config.get_int("session", "max_ticks", 10_000) < 1 {
        return Err(invalid(
            "session",
            "max_ticks",
            "max_ticks must be at least 1".to_string(),
        ));
    }
    if config.get_int("session", "idle_timeout_ms", 250) < 1 {
        return Err(invalid(
            "session",
            "idle_timeout_ms",
            "idle_timeout_ms must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_order_entry(config: &dyn ConfigPort) -> Result<(), TradeflowError> {
    let entry = required(config, "order", "entry")?;
    if catalog::find(&entry).is_none() {
        return Err(invalid(
            "order",
            "entry",
            format!("unknown catalog entry '{entry}'"),
        ));
    }
    Ok(())
}

fn validate_order_fields(config: &dyn ConfigPort) -> Result<(), TradeflowError> {
    required(config, "order", "symbol")?;
    required(config, "order", "venue")?;
    if config.get_int("order", "quantity", 0) < 1 {
        return Err(invalid(
            "order",
            "quantity",
            "quantity must be at least 1".to_string(),
        ));
    }
    if let Some(price) = parsed::<Money>(config, "order", "price")? {
        if price < Money::ZERO {
            return Err(invalid(
                "order",
                "price",
                "price must be non-negative".to_string(),
            ));
        }
    }
    parsed::<Side>(config, "order", "side")?;
    parsed::<TimeInForce>(config, "order", "time_in_force")?;
    if config.get_int("order", "cancel_after_ms", 0) < 0 {
        return Err(invalid(
            "order",
            "cancel_after_ms",
            "cancel_after_ms must be non-negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_simulation(config: &dyn ConfigPort) -> Result<(), TradeflowError> {
    if config.get_int("simulation", "reject_above", 0) < 0 {
        return Err(invalid(
            "simulation",
            "reject_above",
            "reject_above must be non-negative".to_string(),
        ));
    }
    Ok(())
}
