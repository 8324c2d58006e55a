//! Clock port trait.

use chrono::NaiveDateTime;

pub trait TimeClient {
    fn now(&self) -> NaiveDateTime;
}
