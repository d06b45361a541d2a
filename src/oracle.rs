//! Claim and recall flows around the pure core: validation, dedup against
//! the ledger, bucket fetch, seed recovery and window selection.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use tracing::{info, warn};

use crate::error::{Error, LedgerError};
use crate::ledger::{Author, Claim, Leaderboard, Ledger};
use crate::mt19937::Seeding;
use crate::pin::{encode, Pin};
use crate::recovery::{find_seeds_with, Recovery, SeedTable};
use crate::table::{Bucket, TableSource};
use crate::window::{Availability, Forecast, Schedule};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prediction {
    pub forecast: Forecast,
    /// Pins current at the last slot before the deadline, one per seed.
    pub final_pins: BTreeSet<Pin>,
    pub leaderboard: Option<Leaderboard>,
}

/// Everything the front-end may be asked to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    WrongPins,
    AlreadyClaimed,
    NotRecorded,
    TooEarly,
    TooLate,
    Prediction(Prediction),
}

fn join(pins: &BTreeSet<Pin>) -> String {
    pins.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Reply::WrongPins => write!(f, "Wrong pins"),
            Reply::AlreadyClaimed => write!(f, "Too late, these pins were already claimed"),
            Reply::NotRecorded => write!(f, "No prediction is currently available for these pins"),
            Reply::TooEarly => write!(f, "Too early, try again in a moment"),
            Reply::TooLate => write!(f, "Too late, these pins have expired"),
            Reply::Prediction(ref p) => {
                let columns = p.forecast.columns();
                if p.forecast.is_ambiguous() {
                    writeln!(f, "One of {} seeds is in play.", p.forecast.windows.len())?;
                    for (k, column) in columns.iter().enumerate() {
                        let label = if k == 0 { "Now".to_string() } else { format!("Then (+{})", k) };
                        writeln!(f, "{}: {}", label, join(column))?;
                    }
                    writeln!(f, "Last before the deadline: {}", join(&p.final_pins))?;
                } else {
                    let pins = columns.iter()
                        .map(|c| join(c))
                        .collect::<Vec<_>>()
                        .join(", ");
                    writeln!(f, "Now and next: {}", pins)?;
                    writeln!(f, "Last before the deadline: {}", join(&p.final_pins))?;
                }
                if let Some(ref board) = p.leaderboard {
                    write!(f, "\n{}", board)?;
                }
                Ok(())
            }
        }
    }
}

/// Claim and recall over a table source and a shared ledger.
///
/// Only the ledger is locked, and only around its own calls, so a slow
/// bucket fetch for one claim never holds up requests for other triples.
pub struct Oracle<S, L> {
    source: S,
    ledger: Mutex<L>,
    seeding: Seeding,
    schedule: Schedule,
}

impl<S: TableSource, L: Ledger> Oracle<S, L> {
    pub fn new(source: S, ledger: L, seeding: Seeding, schedule: Schedule) -> Oracle<S, L> {
        Oracle {
            source: source,
            ledger: Mutex::new(ledger),
            seeding: seeding,
            schedule: schedule,
        }
    }

    pub fn ledger(&self) -> Result<MutexGuard<L>, LedgerError> {
        self.ledger
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".to_string()))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn prediction(&self, seeds: &[u32], forecast: Forecast,
                  leaderboard: Option<Leaderboard>) -> Prediction {
        let final_pins = seeds.iter()
            .map(|&seed| self.schedule.final_pin(seed, self.seeding))
            .collect();
        Prediction {
            forecast: forecast,
            final_pins: final_pins,
            leaderboard: leaderboard,
        }
    }

    /// First report of a freshly observed triple.
    pub fn claim(&self, raw: [i64; 3], author: &Author, now: SystemTime) -> Result<Reply, Error> {
        let pins = match (Pin::new(raw[0]), Pin::new(raw[1]), Pin::new(raw[2])) {
            (Ok(p0), Ok(p1), Ok(p2)) => (p0, p1, p2),
            _ => {
                info!(author = author.id, ?raw, "rejected out-of-range pins");
                return Ok(Reply::WrongPins);
            }
        };
        let target = encode(pins.0, pins.1, pins.2);

        let seen = self.ledger()?.has_seen(target)?;
        if seen {
            info!(author = author.id, aggregate = target.value(), "aggregate already claimed");
            return Ok(Reply::AlreadyClaimed);
        }

        let data = self.source.fetch(&Bucket::for_pin(pins.0))?;
        let table = SeedTable::new(&data)?;
        let recovery = find_seeds_with(&table, target, self.seeding);

        info!(author = author.id, name = %author.name, aggregate = target.value(),
              seeds = ?recovery.seeds(), "recovered seeds");

        if recovery.is_missing() {
            return Ok(Reply::WrongPins);
        }
        if let Recovery::Ambiguous(ref seeds) = recovery {
            warn!(aggregate = target.value(), candidates = seeds.len(), "ambiguous recovery");
        }

        let seeds = recovery.seeds().to_vec();
        let board = {
            let mut ledger = self.ledger()?;
            let recorded = ledger.record_query(Claim {
                aggregate: target,
                seeds: seeds.clone(),
                author: author.id,
                at: now,
            });
            match recorded {
                Ok(()) => {}
                // another request recorded it while the bucket was loading
                Err(LedgerError::Duplicate { .. }) => {
                    info!(author = author.id, aggregate = target.value(), "lost claim race");
                    return Ok(Reply::AlreadyClaimed);
                }
                Err(e) => return Err(e.into()),
            }
            ledger.bump_score(author, now)?
        };

        match self.schedule.availability(&seeds, self.seeding, now, now) {
            Availability::Current(forecast) => {
                Ok(Reply::Prediction(self.prediction(&seeds, forecast, Some(board))))
            }
            // elapsed is zero and grace is at least one slot
            Availability::TooEarly | Availability::Expired => Ok(Reply::NotRecorded),
        }
    }

    /// Late report: what is current now for a triple claimed earlier.
    pub fn recall(&self, raw: [i64; 3], now: SystemTime) -> Result<Reply, Error> {
        let pins = match (Pin::new(raw[0]), Pin::new(raw[1]), Pin::new(raw[2])) {
            (Ok(p0), Ok(p1), Ok(p2)) => (p0, p1, p2),
            _ => return Ok(Reply::WrongPins),
        };
        let target = encode(pins.0, pins.1, pins.2);

        let claim = match self.ledger()?.lookup(target)? {
            Some(claim) => claim,
            None => return Ok(Reply::NotRecorded),
        };

        match self.schedule.availability(&claim.seeds, self.seeding, claim.at, now) {
            Availability::Current(forecast) => {
                Ok(Reply::Prediction(self.prediction(&claim.seeds, forecast, None)))
            }
            Availability::TooEarly => Ok(Reply::TooEarly),
            Availability::Expired => Ok(Reply::TooLate),
        }
    }
}

#[test]
fn test_render_single() {
    let p = |v: i64| Pin::new(v).unwrap();
    let reply = Reply::Prediction(Prediction {
        forecast: Forecast {
            start: 2,
            windows: vec![crate::window::Window { seed: 42, start: 2, pins: vec![p(5709), p(9659), p(5338)] }],
        },
        final_pins: vec![p(4728)].into_iter().collect(),
        leaderboard: None,
    });
    assert_eq!(reply.to_string(),
               "Now and next: 5709, 9659, 5338\nLast before the deadline: 4728\n");
}

#[test]
fn test_render_outcomes_are_distinct() {
    let texts = [
        Reply::WrongPins,
        Reply::AlreadyClaimed,
        Reply::NotRecorded,
        Reply::TooEarly,
        Reply::TooLate,
    ].iter()
        .map(|r| r.to_string())
        .collect::<BTreeSet<_>>();
    assert_eq!(texts.len(), 5);
}
