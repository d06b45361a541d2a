use super::{at, author, pins};
use crate::ledger::MemoryLedger;
use crate::logging::init_test_logging;
use crate::mt19937::Seeding;
use crate::oracle::{Oracle, Reply};
use crate::pin::{aggregate_of, observed_triple};
use crate::recovery::{find_seeds_with, sorted_table, Recovery, SeedTable};
use crate::table::MemoryTable;
use crate::window::Schedule;

const T0: u64 = 1_700_000_000;

fn with_filler(colliding: &[u32]) -> Vec<u32> {
    let mut seeds = (0..200).collect::<Vec<u32>>();
    seeds.extend_from_slice(colliding);
    seeds
}

#[test]
fn test_by_array_collision_is_ambiguous() {
    init_test_logging();
    assert_eq!(observed_triple(264507, Seeding::ByArray), observed_triple(292228, Seeding::ByArray));
    assert_eq!(aggregate_of(292228, Seeding::ByArray).value(), 256319022764);

    let bytes = sorted_table(&with_filler(&[292228, 264507]), Seeding::ByArray);
    let table = SeedTable::new(&bytes).unwrap();
    assert_eq!(
        find_seeds_with(&table, aggregate_of(264507, Seeding::ByArray), Seeding::ByArray),
        Recovery::Ambiguous(vec![264507, 292228])
    );
}

#[test]
fn test_by_array_collision_forecast() {
    let mut table = MemoryTable::new();
    table.insert(4163, sorted_table(&with_filler(&[264507, 292228]), Seeding::ByArray));
    let oracle = Oracle::new(table, MemoryLedger::default(), Seeding::ByArray, Schedule::default());

    let reply = oracle.claim([4163, 7564, 4037], &author(3, "dee"), at(T0)).unwrap();
    let text = reply.to_string();
    match reply {
        Reply::Prediction(p) => {
            assert!(p.forecast.is_ambiguous());
            let columns = p.forecast.columns();
            assert_eq!(columns[0].iter().cloned().collect::<Vec<_>>(), pins(&[4037]));
            assert_eq!(columns[1].iter().cloned().collect::<Vec<_>>(), pins(&[7999, 9944]));
            assert_eq!(columns[2].iter().cloned().collect::<Vec<_>>(), pins(&[4352, 8599]));
            assert_eq!(p.final_pins.iter().cloned().collect::<Vec<_>>(), pins(&[5281, 9111]));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(text.starts_with("One of 2 seeds is in play.\nNow: 4037\nThen (+1): 7999 or 9944\n"));
    assert!(text.contains("Last before the deadline: 5281 or 9111"));
    assert!(text.contains("=> dee (1 points)"));

    // both candidates narrow together at the last slot
    match oracle.recall([4163, 7564, 4037], at(T0 + 40 * 27)).unwrap() {
        Reply::Prediction(p) => {
            assert_eq!(p.forecast.start, 29);
            assert_eq!(p.forecast.windows.len(), 2);
            assert!(p.forecast.windows.iter().all(|w| w.pins.len() == 2));
            let first = p.forecast.columns()[0].iter().cloned().collect::<Vec<_>>();
            assert_eq!(first, pins(&[5281, 9111]));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_genrand_collision_forecast() {
    assert_eq!(aggregate_of(1100278, Seeding::Genrand).value(), 304352375192);

    let mut table = MemoryTable::new();
    table.insert(4756, sorted_table(&with_filler(&[1329275, 1100278]), Seeding::Genrand));
    let oracle = Oracle::new(table, MemoryLedger::default(), Seeding::Genrand, Schedule::default());

    match oracle.claim([4756, 6417, 6019], &author(4, "eve"), at(T0)).unwrap() {
        Reply::Prediction(p) => {
            assert_eq!(p.forecast.windows.iter().map(|w| w.seed).collect::<Vec<_>>(),
                       vec![1100278, 1329275]);
            let columns = p.forecast.columns();
            assert_eq!(columns[1].iter().cloned().collect::<Vec<_>>(), pins(&[1897, 6114]));
            assert_eq!(columns[2].iter().cloned().collect::<Vec<_>>(), pins(&[3632, 6004]));
            assert_eq!(p.final_pins.iter().cloned().collect::<Vec<_>>(), pins(&[1080, 7540]));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_seeding_mismatch_finds_nothing() {
    let bytes = sorted_table(&[42], Seeding::ByArray);
    let table = SeedTable::new(&bytes).unwrap();
    let target = aggregate_of(42, Seeding::ByArray);
    assert_eq!(find_seeds_with(&table, target, Seeding::Genrand), Recovery::Missing);
    assert_eq!(find_seeds_with(&table, target, Seeding::ByArray), Recovery::Unique(42));
}
