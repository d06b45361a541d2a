use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A value outside the pin domain, or an aggregate no triple encodes to.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PinError {
    #[error("pin {value} is outside {min}..={max}")]
    OutOfRange { value: i64, min: u16, max: u16 },
    #[error("aggregate {value} is not below {limit}")]
    AggregateOutOfRange { value: u64, limit: u64 },
}

/// Integrity faults in a bucket buffer. Never transient.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("table of {len} bytes is not a whole number of 4-byte records (tail {tail})")]
    Malformed { len: usize, tail: String },
    #[error("record {index} sorts before its predecessor ({current} < {previous})")]
    OutOfOrder { index: usize, previous: u64, current: u64 },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no lookup table for bucket {bucket}")]
    UnknownBucket { bucket: u16 },
    #[error("reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("requesting {url}")]
    Http {
        url: String,
        #[source]
        source: hyper::Error,
    },
    #[error("reading body of {url}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("aggregate {aggregate} already has a recorded claim")]
    Duplicate { aggregate: u64 },
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing config file {}: {message}", path.display())]
    Json { path: PathBuf, message: String },
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
    #[error("unknown seeding scheme {0:?} (expected by_array or genrand)")]
    UnknownSeeding(String),
}

/// Everything a claim or recall can fail with. Outcomes such as "no match"
/// or "already claimed" are replies, not errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("lookup table temporarily unavailable")]
    Fetch(#[from] FetchError),
    #[error("lookup table is corrupt")]
    Table(#[from] TableError),
    #[error("ledger failure")]
    Ledger(#[from] LedgerError),
}

#[test]
fn test_messages() {
    let e = PinError::OutOfRange { value: 999, min: 1000, max: 10000 };
    assert_eq!(e.to_string(), "pin 999 is outside 1000..=10000");

    let e = TableError::Malformed { len: 6, tail: "beef".to_string() };
    assert!(e.to_string().contains("6 bytes"));

    let e: Error = LedgerError::Duplicate { aggregate: 7 }.into();
    match e {
        Error::Ledger(LedgerError::Duplicate { aggregate }) => assert_eq!(aggregate, 7),
        other => panic!("unexpected {:?}", other),
    }
}
