use std::time::Duration;

use super::{at, author, pins};
use crate::error::{Error, FetchError, TableError};
use crate::ledger::{Ledger, MemoryLedger, Standing};
use crate::logging::init_test_logging;
use crate::mt19937::Seeding;
use crate::oracle::{Oracle, Reply};
use crate::pin::{aggregate_of, Aggregate};
use crate::recovery::{find_seeds, sorted_table, Recovery, SeedTable};
use crate::table::{LocalTable, MemoryTable, TableSource};
use crate::window::Schedule;

const T0: u64 = 1_700_000_000;

fn oracle_with(seeds: &[u32], pin0: u16) -> Oracle<MemoryTable, MemoryLedger> {
    let mut table = MemoryTable::new();
    table.insert(pin0, sorted_table(seeds, Seeding::ByArray));
    Oracle::new(table, MemoryLedger::default(), Seeding::ByArray, Schedule::default())
}

#[test]
fn test_three_seed_table() {
    init_test_logging();
    let bytes = sorted_table(&[1, 42, 0], Seeding::ByArray);
    let table = SeedTable::new(&bytes).unwrap();
    table.verify_order(Seeding::ByArray).unwrap();

    assert_eq!(aggregate_of(42, Seeding::ByArray).value(), 197308729465);
    assert_eq!(find_seeds(&table, aggregate_of(42, Seeding::ByArray)), Recovery::Unique(42));
    assert_eq!(find_seeds(&table, aggregate_of(0, Seeding::ByArray)), Recovery::Unique(0));

    let near = Aggregate::from_value(aggregate_of(1, Seeding::ByArray).value() + 1).unwrap();
    assert_eq!(find_seeds(&table, near), Recovery::Missing);
}

#[test]
fn test_claim_then_recall() {
    init_test_logging();
    let oracle = oracle_with(&[1, 42, 0], 3435);
    let ana = author(7, "ana");

    let reply = oracle.claim([3435, 4321, 5709], &ana, at(T0)).unwrap();
    match reply {
        Reply::Prediction(ref p) => {
            assert_eq!(p.forecast.start, 2);
            assert!(!p.forecast.is_ambiguous());
            assert_eq!(p.forecast.windows[0].seed, 42);
            assert_eq!(p.forecast.windows[0].pins, pins(&[5709, 9659, 5338]));
            assert_eq!(p.final_pins.iter().cloned().collect::<Vec<_>>(), pins(&[4728]));
            let board = p.leaderboard.clone().unwrap();
            assert_eq!(board.0, vec![Standing { name: "ana".to_string(), score: 1 }]);
        }
        ref other => panic!("unexpected {:?}", other),
    }
    assert_eq!(oracle.source().fetches.get(), 1);
    assert_eq!(oracle.ledger().unwrap().len(), 1);

    // second report of the same triple never reaches the table
    let reply = oracle.claim([3435, 4321, 5709], &author(8, "bo"), at(T0 + 5)).unwrap();
    assert_eq!(reply, Reply::AlreadyClaimed);
    assert_eq!(oracle.source().fetches.get(), 1);

    match oracle.recall([3435, 4321, 5709], at(T0 + 85)).unwrap() {
        Reply::Prediction(p) => {
            assert_eq!(p.forecast.start, 4);
            assert_eq!(p.forecast.windows[0].pins, pins(&[5338, 7243, 7367]));
            assert_eq!(p.leaderboard, None);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(oracle.source().fetches.get(), 1);

    assert_eq!(oracle.recall([3435, 4321, 5709], at(T0 - 1)).unwrap(), Reply::TooEarly);
    assert_eq!(oracle.recall([3435, 4321, 5709], at(T0 + 1120)).unwrap(), Reply::TooLate);
    assert_eq!(oracle.recall([1000, 1000, 1000], at(T0)).unwrap(), Reply::NotRecorded);
}

#[test]
fn test_rejected_claims_leave_no_trace() {
    let oracle = oracle_with(&[1, 42, 0], 3435);
    let ana = author(7, "ana");

    assert_eq!(oracle.claim([999, 4321, 5709], &ana, at(T0)).unwrap(), Reply::WrongPins);
    assert_eq!(oracle.claim([3435, 4321, 10001], &ana, at(T0)).unwrap(), Reply::WrongPins);
    assert_eq!(oracle.source().fetches.get(), 0);

    assert_eq!(oracle.claim([3435, 4321, 5710], &ana, at(T0)).unwrap(), Reply::WrongPins);
    assert_eq!(oracle.source().fetches.get(), 1);
    assert!(oracle.ledger().unwrap().is_empty());
    assert!(!oracle.ledger().unwrap().has_seen(Aggregate::from_value(197308729466).unwrap()).unwrap());
}

#[test]
fn test_fetch_and_table_failures_surface_as_errors() {
    let mut table = MemoryTable::new();
    table.insert(5000, vec![0, 0, 0, 1, 2, 3]);
    let oracle = Oracle::new(table, MemoryLedger::default(), Seeding::ByArray, Schedule::default());
    let ana = author(7, "ana");

    match oracle.claim([4163, 7564, 4037], &ana, at(T0)) {
        Err(Error::Fetch(FetchError::UnknownBucket { bucket })) => assert_eq!(bucket, 4),
        other => panic!("unexpected {:?}", other),
    }
    match oracle.claim([5000, 1000, 1000], &ana, at(T0)) {
        Err(Error::Table(TableError::Malformed { len, .. })) => assert_eq!(len, 6),
        other => panic!("unexpected {:?}", other),
    }
    assert!(oracle.ledger().unwrap().is_empty());
}

#[test]
fn test_local_table_claim() {
    let mut root = std::env::temp_dir();
    root.push(format!("pin_oracle_scenario_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(root.join("3")).unwrap();
    std::fs::write(root.join("3").join("3435"), sorted_table(&[0, 1, 42], Seeding::ByArray)).unwrap();

    let source: Box<dyn TableSource + Send + Sync> = Box::new(LocalTable::new(&root));
    let oracle = Oracle::new(source, MemoryLedger::default(), Seeding::ByArray, Schedule::default());

    match oracle.claim([3435, 4321, 5709], &author(1, "cy"), at(T0)).unwrap() {
        Reply::Prediction(p) => assert_eq!(p.forecast.windows[0].seed, 42),
        other => panic!("unexpected {:?}", other),
    }

    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn test_custom_schedule() {
    let schedule = Schedule::new(Duration::from_secs(10), Duration::from_secs(30)).unwrap();
    let mut table = MemoryTable::new();
    table.insert(3435, sorted_table(&[42], Seeding::ByArray));
    let oracle = Oracle::new(table, MemoryLedger::default(), Seeding::ByArray, schedule);

    oracle.claim([3435, 4321, 5709], &author(1, "cy"), at(T0)).unwrap();
    match oracle.recall([3435, 4321, 5709], at(T0 + 25)).unwrap() {
        Reply::Prediction(p) => {
            // horizon is 6 so only positions 4 and 5 remain
            assert_eq!(p.forecast.start, 4);
            assert_eq!(p.forecast.windows[0].pins, pins(&[5338, 7243]));
            assert_eq!(p.final_pins.iter().cloned().collect::<Vec<_>>(), pins(&[5338]));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(oracle.recall([3435, 4321, 5709], at(T0 + 30)).unwrap(), Reply::TooLate);
}
