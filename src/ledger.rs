use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::LedgerError;
use crate::pin::Aggregate;

pub const DEFAULT_LEADERBOARD_SIZE: usize = 3;

const DAY_SECS: u64 = 86_400;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub id: u64,
    pub name: String,
}

/// A recovered aggregate and who claimed it first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Claim {
    pub aggregate: Aggregate,
    pub seeds: Vec<u32>,
    pub author: u64,
    pub at: SystemTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub name: String,
    pub score: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Leaderboard(pub Vec<Standing>);

impl fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "== LEADERBOARD ==")?;
        for s in self.0.iter() {
            writeln!(f, "=> {} ({} points)", s.name, s.score)?;
        }
        Ok(())
    }
}

/// Shared state across requests: claimed aggregates and weekly scores.
pub trait Ledger {
    fn has_seen(&self, aggregate: Aggregate) -> Result<bool, LedgerError>;

    fn lookup(&self, aggregate: Aggregate) -> Result<Option<Claim>, LedgerError>;

    fn record_query(&mut self, claim: Claim) -> Result<(), LedgerError>;

    /// One more point for `author`; returns the current top standings.
    fn bump_score(&mut self, author: &Author, at: SystemTime) -> Result<Leaderboard, LedgerError>;
}

/// Upcoming Sunday 00:00 UTC on or after `at`, as a unix timestamp.
pub fn week_mark(at: SystemTime) -> u64 {
    let secs = at.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();
    let day = secs / DAY_SECS;
    // 1970-01-01 was a Thursday; 0 is Sunday
    let weekday = (day + 4) % 7;
    (day + (7 - weekday) % 7) * DAY_SECS
}

struct Score {
    name: String,
    week: u64,
    score: u32,
}

pub struct MemoryLedger {
    claims: HashMap<Aggregate, Claim>,
    scores: HashMap<u64, Score>,
    top: usize,
}

impl MemoryLedger {
    pub fn new(top: usize) -> MemoryLedger {
        MemoryLedger {
            claims: HashMap::new(),
            scores: HashMap::new(),
            top: top,
        }
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl Default for MemoryLedger {
    fn default() -> MemoryLedger {
        MemoryLedger::new(DEFAULT_LEADERBOARD_SIZE)
    }
}

impl Ledger for MemoryLedger {
    fn has_seen(&self, aggregate: Aggregate) -> Result<bool, LedgerError> {
        Ok(self.claims.contains_key(&aggregate))
    }

    fn lookup(&self, aggregate: Aggregate) -> Result<Option<Claim>, LedgerError> {
        Ok(self.claims.get(&aggregate).cloned())
    }

    fn record_query(&mut self, claim: Claim) -> Result<(), LedgerError> {
        if self.claims.contains_key(&claim.aggregate) {
            return Err(LedgerError::Duplicate { aggregate: claim.aggregate.value() });
        }
        self.claims.insert(claim.aggregate, claim);
        Ok(())
    }

    fn bump_score(&mut self, author: &Author, at: SystemTime) -> Result<Leaderboard, LedgerError> {
        let week = week_mark(at);
        self.scores.retain(|_, s| s.week >= week);

        let entry = self.scores.entry(author.id).or_insert(Score {
            name: author.name.clone(),
            week: week,
            score: 0,
        });
        entry.name = author.name.clone();
        entry.score += 1;

        let mut standings = self.scores.values()
            .map(|s| Standing { name: s.name.clone(), score: s.score })
            .collect::<Vec<_>>();
        standings.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        standings.truncate(self.top);
        Ok(Leaderboard(standings))
    }
}

#[cfg(test)]
fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(test)]
fn author(id: u64, name: &str) -> Author {
    Author { id: id, name: name.to_string() }
}

#[test]
fn test_week_mark() {
    // Tue 2023-11-14 and Sun 2023-11-19 share a week; Mon 2023-11-20 starts the next
    assert_eq!(week_mark(at(1_700_000_000)), 1_700_352_000);
    assert_eq!(week_mark(at(1_700_400_000)), 1_700_352_000);
    assert_eq!(week_mark(at(1_700_438_400)), 1_700_956_800);
}

#[test]
fn test_claims_are_unique() {
    let mut ledger = MemoryLedger::default();
    let agg = Aggregate::from_value(256319022764).unwrap();
    assert!(!ledger.has_seen(agg).unwrap());

    let claim = Claim { aggregate: agg, seeds: vec![264507, 292228], author: 1, at: at(10) };
    ledger.record_query(claim.clone()).unwrap();
    assert!(ledger.has_seen(agg).unwrap());
    assert_eq!(ledger.lookup(agg).unwrap(), Some(claim.clone()));
    assert_eq!(ledger.record_query(claim),
               Err(LedgerError::Duplicate { aggregate: 256319022764 }));
    assert_eq!(ledger.len(), 1);
}

#[test]
fn test_leaderboard_orders_and_truncates() {
    let mut ledger = MemoryLedger::new(2);
    let t = at(1_700_000_000);
    ledger.bump_score(&author(1, "ana"), t).unwrap();
    ledger.bump_score(&author(2, "bo"), t).unwrap();
    ledger.bump_score(&author(2, "bo"), t).unwrap();
    let board = ledger.bump_score(&author(3, "cy"), t).unwrap();
    assert_eq!(board, Leaderboard(vec![
        Standing { name: "bo".to_string(), score: 2 },
        Standing { name: "ana".to_string(), score: 1 },
    ]));
    assert_eq!(board.to_string(), "== LEADERBOARD ==\n=> bo (2 points)\n=> ana (1 points)\n");
}

#[test]
fn test_leaderboard_resets_weekly() {
    let mut ledger = MemoryLedger::default();
    ledger.bump_score(&author(1, "ana"), at(1_700_000_000)).unwrap();
    ledger.bump_score(&author(1, "ana"), at(1_700_400_000)).unwrap();
    let board = ledger.bump_score(&author(2, "bo"), at(1_700_400_100)).unwrap();
    assert_eq!(board.0[0], Standing { name: "ana".to_string(), score: 2 });

    let board = ledger.bump_score(&author(2, "bo"), at(1_700_438_400)).unwrap();
    assert_eq!(board, Leaderboard(vec![Standing { name: "bo".to_string(), score: 1 }]));
}
