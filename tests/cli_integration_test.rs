//! CLI integration tests for session orchestration.
//!
//! Tests cover:
//! - Reading sessions from INI files on disk
//! - Compiling without a venue (validate)
//! - Full simulate runs with fills, cancels and time and sales replay
//! - Error exit paths

mod common;

use std::io::Write;
use std::process::ExitCode;

use tradeflow::adapters::file_config_adapter::FileConfigAdapter;
use tradeflow::cli::{self, Cli};
use tradeflow::domain::error::TradeflowError;
use tradeflow::domain::reactor::RunOutcome;
use tradeflow::domain::session::SessionSettings;
use tradeflow::domain::value::{OrderStatus, Side};

fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[session]
account = ACC-1
max_ticks = 200
idle_timeout_ms = 500

[order]
entry = Limit Order
symbol = BHP
venue = ASX
side = ask
quantity = 300
price = 45.10
time_in_force = GTC

[simulation]
auto_fill = true

[logging]
level = warn
"#;

fn settings(content: &str) -> SessionSettings {
    let adapter = FileConfigAdapter::from_string(content).unwrap();
    SessionSettings::from_config(&adapter).unwrap()
}

mod config_loading {
    use super::*;

    #[test]
    fn reads_session_from_disk() {
        let file = write_temp_file(VALID_INI);
        let adapter = cli::load_config(file.path()).unwrap();
        let settings = SessionSettings::from_config(&adapter).unwrap();
        assert_eq!(settings.account, "ACC-1");
        assert_eq!(settings.side, Some(Side::Ask));
        assert_eq!(settings.quantity, 300);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let code = cli::load_config(std::path::Path::new("/nonexistent/session.ini")).err();
        assert_eq!(code, Some(ExitCode::from(2)));
    }

    #[test]
    fn unknown_entry_is_rejected() {
        let adapter =
            FileConfigAdapter::from_string(&VALID_INI.replace("Limit Order", "Iceberg Order"))
                .unwrap();
        let err = SessionSettings::from_config(&adapter).unwrap_err();
        assert!(matches!(err, TradeflowError::ConfigInvalid { ref key, .. } if key == "entry"));
    }
}

mod validate {
    use super::*;

    #[test]
    fn program_compiles_without_a_venue() {
        let native = cli::compile_only(&settings(VALID_INI)).unwrap();
        assert_eq!(native, "Order");
    }

    #[test]
    fn cancel_after_still_compiles_to_orders() {
        let ini = VALID_INI.replace("time_in_force = GTC", "time_in_force = GTC\ncancel_after_ms = 100");
        let native = cli::compile_only(&settings(&ini)).unwrap();
        assert_eq!(native, "Order");
    }
}

mod simulate {
    use super::*;

    #[test]
    fn auto_fill_run_reports_the_fill() {
        let report = cli::simulate(&settings(VALID_INI)).unwrap();
        assert!(matches!(report.outcome, RunOutcome::Complete { .. }));
        assert_eq!(report.orders.len(), 1);
        assert_eq!(report.orders[0].status(), OrderStatus::Filled);
        assert_eq!(report.orders[0].fields().side, Side::Ask);
    }

    #[test]
    fn resting_order_is_canceled_on_schedule() {
        let ini = VALID_INI
            .replace("auto_fill = true", "auto_fill = false")
            .replace("time_in_force = GTC", "time_in_force = GTC\ncancel_after_ms = 30");
        let report = cli::simulate(&settings(&ini)).unwrap();
        assert!(matches!(report.outcome, RunOutcome::Complete { .. }));
        assert_eq!(report.orders[0].status(), OrderStatus::Canceled);
    }

    #[test]
    fn quantity_limit_rejects() {
        let ini = VALID_INI.replace("auto_fill = true", "auto_fill = true\nreject_above = 100");
        let err = cli::simulate(&settings(&ini)).unwrap_err();
        assert!(matches!(err, TradeflowError::OrderRejected { .. }));
        assert_eq!(ExitCode::from(&err), ExitCode::from(4));
    }

    #[test]
    fn missing_recording_is_a_market_data_error() {
        let ini = format!("{VALID_INI}\n[market_data]\ntime_and_sales = /nonexistent/tas.csv\n");
        let err = cli::simulate(&settings(&ini)).unwrap_err();
        assert!(matches!(err, TradeflowError::MarketData { .. }));
    }

    #[test]
    fn recording_is_loaded_when_configured() {
        let recording = write_temp_file(
            "timestamp,symbol,venue,price,size,market_center\n2024-03-01 10:00:00,BHP,ASX,45.10,100,ASX\n",
        );
        let ini = format!(
            "{VALID_INI}\n[market_data]\ntime_and_sales = {}\n",
            recording.path().display()
        );
        let report = cli::simulate(&settings(&ini)).unwrap();
        assert_eq!(report.orders.len(), 1);
    }
}

mod arguments {
    use super::*;
    use clap::Parser;

    #[test]
    fn validate_requires_a_config() {
        assert!(Cli::try_parse_from(["tradeflow", "validate"]).is_err());
        assert!(Cli::try_parse_from(["tradeflow", "validate", "-c", "s.ini"]).is_ok());
    }

    #[test]
    fn catalog_takes_no_arguments() {
        assert!(Cli::try_parse_from(["tradeflow", "catalog"]).is_ok());
    }
}
