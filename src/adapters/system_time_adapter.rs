//! Wall clock time client.

use chrono::{Local, NaiveDateTime};

use crate::ports::time_port::TimeClient;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeClient;

impl TimeClient for SystemTimeClient {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
