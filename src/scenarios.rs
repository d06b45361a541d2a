//! Whole-flow checks across table, recovery, windows and ledger.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::ledger::Author;
use crate::pin::Pin;

mod collisions;
mod concurrency;
mod end_to_end;

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn pins(values: &[i64]) -> Vec<Pin> {
    values.iter().map(|&v| Pin::new(v).unwrap()).collect()
}

fn author(id: u64, name: &str) -> Author {
    Author { id: id, name: name.to_string() }
}
