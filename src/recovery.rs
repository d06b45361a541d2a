//! Seed recovery over a bucket of big-endian seed records sorted by the
//! aggregate of each seed's observed triple.

use tracing::debug;

use crate::error::TableError;
use crate::mt19937::Seeding;
use crate::pin::{aggregate_of, Aggregate};
use crate::util::{hex_tail, read_u32_be};

pub const RECORD_WIDTH: usize = 4;

// Below this many records the remaining window is scanned linearly.
const SCAN_WIDTH: usize = 16;
// Half-width of the window opened around an exact hit.
const WIDEN: usize = 8;

#[derive(Clone, Copy, Debug)]
pub struct SeedTable<'a> {
    bytes: &'a [u8],
}

impl<'a> SeedTable<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<SeedTable<'a>, TableError> {
        if bytes.len() % RECORD_WIDTH != 0 {
            return Err(TableError::Malformed {
                len: bytes.len(),
                tail: hex_tail(bytes, bytes.len() % RECORD_WIDTH),
            });
        }
        Ok(SeedTable { bytes: bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / RECORD_WIDTH
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn seed_at(&self, i: usize) -> u32 {
        read_u32_be(&self.bytes[i * RECORD_WIDTH..(i + 1) * RECORD_WIDTH])
    }

    pub fn seeds(&self) -> impl Iterator<Item = u32> + 'a {
        self.bytes.chunks(RECORD_WIDTH).map(read_u32_be)
    }

    /// Full linear check of the sort invariant. Costs one derivation per
    /// record, so it belongs in tests and tooling rather than lookups.
    pub fn verify_order_by<F>(&self, mut key: F) -> Result<(), TableError>
        where F: FnMut(u32) -> Aggregate
    {
        let mut previous: Option<Aggregate> = None;
        for (index, seed) in self.seeds().enumerate() {
            let current = key(seed);
            if let Some(p) = previous {
                if current < p {
                    return Err(TableError::OutOfOrder {
                        index: index,
                        previous: p.value(),
                        current: current.value(),
                    });
                }
            }
            previous = Some(current);
        }
        Ok(())
    }

    pub fn verify_order(&self, seeding: Seeding) -> Result<(), TableError> {
        self.verify_order_by(|seed| aggregate_of(seed, seeding))
    }
}

/// Outcome of a recovery. Every multiplicity is a legitimate answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recovery {
    Missing,
    Unique(u32),
    Ambiguous(Vec<u32>),
}

impl Recovery {
    /// Sorts and deduplicates `seeds`.
    pub fn from_seeds(mut seeds: Vec<u32>) -> Recovery {
        seeds.sort();
        seeds.dedup();
        match seeds.len() {
            0 => Recovery::Missing,
            1 => Recovery::Unique(seeds[0]),
            _ => Recovery::Ambiguous(seeds),
        }
    }

    pub fn seeds(&self) -> &[u32] {
        match *self {
            Recovery::Missing => &[],
            Recovery::Unique(ref seed) => std::slice::from_ref(seed),
            Recovery::Ambiguous(ref seeds) => seeds,
        }
    }

    pub fn is_missing(&self) -> bool {
        *self == Recovery::Missing
    }
}

/// Binary search for every record whose key equals `target`.
///
/// An exact hit at the midpoint does not stop the search: the window is
/// reset to the 16 records around it so neighbouring duplicates are scanned
/// too. Duplicate runs longer than that window can be partially reported.
pub fn find_seeds_by<F>(table: &SeedTable, target: Aggregate, mut key: F) -> Recovery
    where F: FnMut(u32) -> Aggregate
{
    let mut left = 0;
    let mut right = table.len();
    let mut probes = 0;

    while right - left > SCAN_WIDTH {
        probes += 1;

        let mid = left + (right - left) / 2;
        let agg = key(table.seed_at(mid));

        if agg < target {
            left = mid;
        } else if agg > target {
            right = mid;
        } else {
            left = mid - WIDEN;
            right = mid + WIDEN;
        }
    }

    let seeds = (left..right)
        .map(|i| table.seed_at(i))
        .filter(|&seed| key(seed) == target)
        .collect::<Vec<_>>();

    debug!(aggregate = target.value(), records = table.len(), probes, left, right,
           matches = seeds.len(), "seed search finished");

    Recovery::from_seeds(seeds)
}

pub fn find_seeds_with(table: &SeedTable, target: Aggregate, seeding: Seeding) -> Recovery {
    find_seeds_by(table, target, |seed| aggregate_of(seed, seeding))
}

pub fn find_seeds(table: &SeedTable, target: Aggregate) -> Recovery {
    find_seeds_with(table, target, Seeding::default())
}

/// Seeds laid out the way the table builder does: sorted by aggregate,
/// then written as big-endian records.
#[cfg(test)]
pub(crate) fn sorted_table(seeds: &[u32], seeding: Seeding) -> Vec<u8> {
    let mut keyed = seeds.iter()
        .map(|&s| (aggregate_of(s, seeding), s))
        .collect::<Vec<_>>();
    keyed.sort();
    let ordered = keyed.into_iter().map(|(_, s)| s).collect::<Vec<_>>();
    let mut bytes = vec![0_u8; ordered.len() * RECORD_WIDTH];
    crate::util::write_u32v_be(&mut bytes, &ordered);
    bytes
}

#[cfg(test)]
fn coarse(seed: u32) -> Aggregate {
    Aggregate::from_value(seed as u64 / 5).unwrap()
}

#[cfg(test)]
fn ascending(n: u32) -> Vec<u8> {
    let seeds = (0..n).collect::<Vec<_>>();
    let mut bytes = vec![0_u8; seeds.len() * RECORD_WIDTH];
    crate::util::write_u32v_be(&mut bytes, &seeds);
    bytes
}

#[test]
fn test_malformed_length() {
    let bytes = [0_u8, 0, 0, 1, 0xbe, 0xef];
    assert_eq!(
        SeedTable::new(&bytes).unwrap_err(),
        TableError::Malformed { len: 6, tail: "beef".to_string() }
    );
}

#[test]
fn test_records_are_big_endian() {
    let bytes = [0x00_u8, 0x04, 0x09, 0x3b, 0xde, 0xad, 0xbe, 0xef];
    let table = SeedTable::new(&bytes).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.seed_at(0), 264507);
    assert_eq!(table.seeds().collect::<Vec<_>>(), vec![264507, 0xdeadbeef]);
}

#[test]
fn test_empty_table() {
    let table = SeedTable::new(&[]).unwrap();
    assert!(table.is_empty());
    assert_eq!(find_seeds(&table, Aggregate::from_value(5).unwrap()), Recovery::Missing);
}

#[test]
fn test_finds_known_seed() {
    let seeds = (1000..1400).collect::<Vec<u32>>();
    let bytes = sorted_table(&seeds, Seeding::ByArray);
    let table = SeedTable::new(&bytes).unwrap();
    table.verify_order(Seeding::ByArray).unwrap();

    for &known in [1000_u32, 1117, 1250, 1399].iter() {
        let target = aggregate_of(known, Seeding::ByArray);
        assert_eq!(find_seeds(&table, target), Recovery::Unique(known));
    }
}

#[test]
fn test_absent_target_is_missing() {
    let seeds = (0..300).collect::<Vec<u32>>();
    let bytes = sorted_table(&seeds, Seeding::ByArray);
    let table = SeedTable::new(&bytes).unwrap();

    let present = aggregate_of(150, Seeding::ByArray);
    let absent = Aggregate::from_value(present.value() + 1).unwrap();
    assert!(table.seeds().all(|s| aggregate_of(s, Seeding::ByArray) != absent));
    assert!(find_seeds(&table, absent).is_missing());
}

#[test]
fn test_duplicate_run_is_fully_reported() {
    let bytes = ascending(1000);
    let table = SeedTable::new(&bytes).unwrap();
    for &k in [0_u64, 37, 100, 199].iter() {
        let target = Aggregate::from_value(k).unwrap();
        let expected = (k as u32 * 5..k as u32 * 5 + 5).collect::<Vec<_>>();
        assert_eq!(find_seeds_by(&table, target, coarse), Recovery::Ambiguous(expected));
    }
}

#[test]
fn test_long_duplicate_run_reports_only_matches() {
    // runs of 40 exceed the widened window
    let bytes = ascending(4000);
    let table = SeedTable::new(&bytes).unwrap();
    let key = |seed: u32| Aggregate::from_value(seed as u64 / 40).unwrap();
    let target = Aggregate::from_value(33).unwrap();
    let found = find_seeds_by(&table, target, key);
    assert!(!found.seeds().is_empty());
    assert!(found.seeds().iter().all(|&s| s / 40 == 33));
}

#[test]
fn test_verify_order_detects_inversion() {
    let mut seeds = (0..40).collect::<Vec<u32>>();
    seeds.swap(10, 30);
    let mut bytes = vec![0_u8; seeds.len() * RECORD_WIDTH];
    crate::util::write_u32v_be(&mut bytes, &seeds);
    let table = SeedTable::new(&bytes).unwrap();
    assert_eq!(
        table.verify_order_by(coarse),
        Err(TableError::OutOfOrder { index: 11, previous: 6, current: 2 })
    );
}

#[test]
fn test_recovery_from_seeds() {
    assert_eq!(Recovery::from_seeds(vec![]), Recovery::Missing);
    assert_eq!(Recovery::from_seeds(vec![9, 9]), Recovery::Unique(9));
    assert_eq!(Recovery::from_seeds(vec![7, 3, 7]), Recovery::Ambiguous(vec![3, 7]));
    assert_eq!(Recovery::Unique(4).seeds(), &[4]);
}
