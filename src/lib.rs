#![allow(non_snake_case)]

extern crate rustc_serialize as serialize;

pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod mt19937;
pub mod oracle;
pub mod pin;
pub mod recovery;
pub mod table;
pub mod util;
pub mod window;

#[cfg(test)]
mod scenarios;

pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::ledger::{Author, Ledger, MemoryLedger};
pub use crate::mt19937::{MT19937Rng, Seeding};
pub use crate::oracle::{Oracle, Prediction, Reply};
pub use crate::pin::{decode, encode, Aggregate, Pin};
pub use crate::recovery::{find_seeds, find_seeds_with, Recovery, SeedTable};
pub use crate::table::{Bucket, LocalTable, RemoteTable, TableSource};
pub use crate::window::{Availability, Forecast, Schedule};
