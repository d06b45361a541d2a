use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use super::{at, author, pins};
use crate::error::FetchError;
use crate::ledger::{Ledger, MemoryLedger};
use crate::mt19937::Seeding;
use crate::oracle::{Oracle, Reply};
use crate::pin::aggregate_of;
use crate::recovery::sorted_table;
use crate::table::{Bucket, TableSource};
use crate::window::Schedule;

const T0: u64 = 1_700_000_000;

/// Holds its first fetch until released; later fetches pass straight through.
struct GatedTable {
    buckets: HashMap<u16, Vec<u8>>,
    gated: AtomicBool,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl TableSource for GatedTable {
    fn fetch(&self, bucket: &Bucket) -> Result<Vec<u8>, FetchError> {
        if self.gated.swap(false, Ordering::SeqCst) {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
        self.buckets.get(&bucket.pin0.value())
            .cloned()
            .ok_or(FetchError::UnknownBucket { bucket: bucket.id })
    }
}

fn gated_oracle() -> (Arc<Oracle<GatedTable, MemoryLedger>>, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    let mut buckets = HashMap::new();
    buckets.insert(3435, sorted_table(&[0, 1, 42], Seeding::ByArray));
    buckets.insert(4163, sorted_table(&[264507, 292228], Seeding::ByArray));
    let table = GatedTable {
        buckets: buckets,
        gated: AtomicBool::new(true),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    let oracle = Oracle::new(table, MemoryLedger::default(), Seeding::ByArray, Schedule::default());
    (Arc::new(oracle), entered_rx, release_tx)
}

#[test]
fn test_slow_fetch_does_not_block_other_claims() {
    let (oracle, entered, release) = gated_oracle();

    let slow = {
        let oracle = oracle.clone();
        thread::spawn(move || oracle.claim([4163, 7564, 4037], &author(1, "ana"), at(T0)).unwrap())
    };
    entered.recv().unwrap();

    // the first claim is parked inside its fetch
    match oracle.claim([3435, 4321, 5709], &author(2, "bo"), at(T0)).unwrap() {
        Reply::Prediction(p) => assert_eq!(p.forecast.windows[0].pins, pins(&[5709, 9659, 5338])),
        other => panic!("unexpected {:?}", other),
    }
    assert!(oracle.recall([3435, 4321, 5709], at(T0 + 45)).unwrap() != Reply::NotRecorded);
    assert!(!oracle.ledger().unwrap().has_seen(aggregate_of(264507, Seeding::ByArray)).unwrap());

    release.send(()).unwrap();
    match slow.join().unwrap() {
        Reply::Prediction(p) => assert!(p.forecast.is_ambiguous()),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(oracle.ledger().unwrap().len(), 2);
}

#[test]
fn test_concurrent_duplicate_claim_is_already_claimed() {
    let (oracle, entered, release) = gated_oracle();

    let first = {
        let oracle = oracle.clone();
        thread::spawn(move || oracle.claim([3435, 4321, 5709], &author(1, "ana"), at(T0)).unwrap())
    };
    entered.recv().unwrap();

    // passes the seen check and records while the first request is still fetching
    match oracle.claim([3435, 4321, 5709], &author(2, "bo"), at(T0 + 1)).unwrap() {
        Reply::Prediction(p) => {
            let board = p.leaderboard.unwrap();
            assert_eq!(board.0.len(), 1);
            assert_eq!(board.0[0].name, "bo");
        }
        other => panic!("unexpected {:?}", other),
    }

    release.send(()).unwrap();
    assert_eq!(first.join().unwrap(), Reply::AlreadyClaimed);

    let ledger = oracle.ledger().unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.lookup(aggregate_of(42, Seeding::ByArray)).unwrap().map(|c| c.author), Some(2));
}
