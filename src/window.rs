use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

use crate::mt19937::Seeding;
use crate::pin::{derive_pins_with, Pin};

/// Position of the pin current at the moment the triple is reported. The
/// observed triple occupies positions 0..3, so this is also its last pin.
pub const FIRST_NEXT: usize = 2;
pub const WINDOW_WIDTH: usize = 3;

pub const DEFAULT_SLOT: Duration = Duration::from_secs(40);
pub const DEFAULT_GRACE: Duration = Duration::from_secs(1120);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    slot: Duration,
    grace: Duration,
}

impl Default for Schedule {
    fn default() -> Schedule {
        Schedule {
            slot: DEFAULT_SLOT,
            grace: DEFAULT_GRACE,
        }
    }
}

impl Schedule {
    /// `None` unless `0 < slot <= grace`.
    pub fn new(slot: Duration, grace: Duration) -> Option<Schedule> {
        if slot == Duration::from_secs(0) || slot > grace {
            return None;
        }
        Some(Schedule { slot: slot, grace: grace })
    }

    pub fn slot(&self) -> Duration {
        self.slot
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Stream position current after `elapsed`.
    pub fn index_at(&self, elapsed: Duration) -> usize {
        (elapsed.as_nanos() / self.slot.as_nanos()) as usize + FIRST_NEXT
    }

    /// The position current during the last instant before the deadline.
    /// The grace period need not be a whole number of slots.
    pub fn final_index(&self) -> usize {
        self.index_at(self.grace - Duration::from_nanos(1))
    }

    /// One past the last position a window may show. A window opened in
    /// the final slot still shows the position after it.
    pub fn horizon(&self) -> usize {
        self.final_index() + 2
    }

    pub fn window(&self, seed: u32, seeding: Seeding, elapsed: Duration) -> Option<Window> {
        if elapsed >= self.grace {
            return None;
        }
        let start = self.index_at(elapsed);
        let end = (start + WINDOW_WIDTH).min(self.horizon());
        let pins = derive_pins_with(seed, seeding)
            .skip(start)
            .take(end - start)
            .collect();
        Some(Window { seed: seed, start: start, pins: pins })
    }

    pub fn final_pin(&self, seed: u32, seeding: Seeding) -> Pin {
        let mut pins = derive_pins_with(seed, seeding);
        for _ in 0..self.final_index() {
            pins.next_pin();
        }
        pins.next_pin()
    }

    /// Windows for every candidate seed of one claim first seen at
    /// `first_seen`.
    pub fn availability(&self, seeds: &[u32], seeding: Seeding,
                        first_seen: SystemTime, now: SystemTime) -> Availability {
        let elapsed = match now.duration_since(first_seen) {
            Ok(elapsed) => elapsed,
            Err(_) => return Availability::TooEarly,
        };
        let windows = seeds.iter()
            .filter_map(|&seed| self.window(seed, seeding, elapsed))
            .collect::<Vec<_>>();
        if windows.is_empty() {
            return Availability::Expired;
        }
        Availability::Current(Forecast {
            start: self.index_at(elapsed),
            windows: windows,
        })
    }
}

/// The slice of one seed's stream valid right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub seed: u32,
    pub start: usize,
    pub pins: Vec<Pin>,
}

/// Windows for all seeds still in the running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Forecast {
    pub start: usize,
    pub windows: Vec<Window>,
}

impl Forecast {
    pub fn is_ambiguous(&self) -> bool {
        self.windows.len() > 1
    }

    /// Possible pins per offset from `start`.
    pub fn columns(&self) -> Vec<BTreeSet<Pin>> {
        let width = self.windows.iter()
            .map(|w| w.pins.len())
            .max()
            .unwrap_or(0);
        (0..width)
            .map(|k| {
                self.windows.iter()
                    .filter_map(|w| w.pins.get(k).cloned())
                    .collect()
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    Current(Forecast),
    TooEarly,
    Expired,
}

#[cfg(test)]
fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[test]
fn test_index_at_slot_boundaries() {
    let schedule = Schedule::default();
    assert_eq!(schedule.index_at(secs(0)), 2);
    assert_eq!(schedule.index_at(secs(39)), 2);
    assert_eq!(schedule.index_at(secs(40)), 3);
    assert_eq!(schedule.index_at(Duration::from_millis(79_999)), 3);
    for k in 0..28 {
        assert_eq!(schedule.index_at(secs(40 * k)), 2 + k as usize);
    }
}

#[test]
fn test_immediate_window() {
    let schedule = Schedule::default();
    let w = schedule.window(42, Seeding::ByArray, secs(0)).unwrap();
    let expected = derive_pins_with(42, Seeding::ByArray)
        .skip(2)
        .take(3)
        .collect::<Vec<_>>();
    assert_eq!(w.start, 2);
    assert_eq!(w.pins, expected);
}

#[test]
fn test_late_window_narrows_at_horizon() {
    let schedule = Schedule::default();
    assert_eq!(schedule.horizon(), 31);

    let w = schedule.window(42, Seeding::ByArray, secs(40 * 27)).unwrap();
    assert_eq!((w.start, w.pins.len()), (29, 2));

    let w = schedule.window(42, Seeding::ByArray, secs(40 * 26 + 5)).unwrap();
    assert_eq!((w.start, w.pins.len()), (28, 3));

    assert!(schedule.window(42, Seeding::ByArray, secs(1119)).is_some());
    assert!(schedule.window(42, Seeding::ByArray, secs(1120)).is_none());
}

#[test]
fn test_final_pin_matches_position_29() {
    let schedule = Schedule::default();
    assert_eq!(schedule.final_index(), 29);
    assert_eq!(schedule.final_pin(42, Seeding::ByArray).value(), 4728);
    assert_eq!(schedule.final_pin(5489, Seeding::Genrand).value(), 5627);
}

#[test]
fn test_grace_off_slot_boundary() {
    // 1130 s leaves a 10 s tail after position 30 becomes current at 1120 s
    let schedule = Schedule::new(secs(40), secs(1130)).unwrap();
    assert_eq!(schedule.final_index(), 30);
    assert_eq!(schedule.horizon(), 32);

    let w = schedule.window(42, Seeding::ByArray, secs(1125)).unwrap();
    assert_eq!((w.start, w.pins.len()), (30, 2));
    let w = schedule.window(42, Seeding::ByArray, secs(1119)).unwrap();
    assert_eq!((w.start, w.pins.len()), (29, 3));
    assert!(schedule.window(42, Seeding::ByArray, secs(1130)).is_none());

    let expected = derive_pins_with(42, Seeding::ByArray).nth(30).unwrap();
    assert_eq!(schedule.final_pin(42, Seeding::ByArray), expected);
    assert_eq!(w.pins[1], expected);
}

#[test]
fn test_sub_millisecond_slot() {
    let schedule = Schedule::new(Duration::from_micros(500), secs(1)).unwrap();
    assert_eq!(schedule.index_at(secs(0)), 2);
    assert_eq!(schedule.index_at(Duration::from_micros(499)), 2);
    assert_eq!(schedule.index_at(Duration::from_millis(1)), 4);
    assert_eq!(schedule.final_index(), 2001);
    let w = schedule.window(42, Seeding::ByArray, Duration::from_micros(999_800)).unwrap();
    assert_eq!((w.start, w.pins.len()), (2001, 2));
}

#[test]
fn test_schedule_validation() {
    assert!(Schedule::new(secs(0), secs(10)).is_none());
    assert!(Schedule::new(secs(20), secs(10)).is_none());
    let s = Schedule::new(secs(10), secs(30)).unwrap();
    assert_eq!(s.horizon(), 2 + 3 + 1);
}

#[test]
fn test_availability_edges() {
    let schedule = Schedule::default();
    let t0 = SystemTime::UNIX_EPOCH + secs(1_700_000_000);

    assert_eq!(
        schedule.availability(&[42], Seeding::ByArray, t0, t0 - secs(1)),
        Availability::TooEarly
    );
    assert_eq!(
        schedule.availability(&[42], Seeding::ByArray, t0, t0 + secs(2000)),
        Availability::Expired
    );
    match schedule.availability(&[42], Seeding::ByArray, t0, t0 + secs(85)) {
        Availability::Current(f) => {
            assert_eq!(f.start, 4);
            assert!(!f.is_ambiguous());
            assert_eq!(f.windows[0].pins.len(), 3);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_columns_merge_candidates() {
    let a = |v: i64| Pin::new(v).unwrap();
    let forecast = Forecast {
        start: 2,
        windows: vec![
            Window { seed: 1, start: 2, pins: vec![a(4037), a(9944), a(8599)] },
            Window { seed: 2, start: 2, pins: vec![a(4037), a(7999), a(4352)] },
        ],
    };
    let columns = forecast.columns();
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[0].iter().cloned().collect::<Vec<_>>(), vec![a(4037)]);
    assert_eq!(columns[1].iter().cloned().collect::<Vec<_>>(), vec![a(7999), a(9944)]);
    assert!(forecast.is_ambiguous());
}
