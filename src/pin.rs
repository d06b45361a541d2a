use std::fmt;

use num::Integer;
use rand::Rng;

use crate::error::PinError;
use crate::mt19937::{MT19937Rng, Seeding};

pub const MIN_PIN: u16 = 1000;
pub const MAX_PIN: u16 = 10000;
pub const RADIX: u64 = (MAX_PIN - MIN_PIN) as u64 + 1;
pub const AGGREGATE_LIMIT: u64 = RADIX * RADIX * RADIX;

// The table builder burns two draws after seeding before any pin is derived.
pub const DISCARDED_DRAWS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pin(u16);

impl Pin {
    pub fn new(value: i64) -> Result<Pin, PinError> {
        if value < MIN_PIN as i64 || value > MAX_PIN as i64 {
            return Err(PinError::OutOfRange {
                value: value,
                min: MIN_PIN,
                max: MAX_PIN,
            });
        }
        Ok(Pin(value as u16))
    }

    pub fn from_draw(r: u32) -> Pin {
        Pin((r as u64 % RADIX) as u16 + MIN_PIN)
    }

    pub fn value(self) -> u16 {
        self.0
    }

    fn digit(self) -> u64 {
        (self.0 - MIN_PIN) as u64
    }

    fn from_digit(d: u64) -> Pin {
        debug_assert!(d < RADIX);
        Pin(d as u16 + MIN_PIN)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Three pins packed base 9001, most significant first. Ordering matches
/// lexicographic ordering of the triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Aggregate(u64);

impl Aggregate {
    pub fn from_value(value: u64) -> Result<Aggregate, PinError> {
        if value >= AGGREGATE_LIMIT {
            return Err(PinError::AggregateOutOfRange {
                value: value,
                limit: AGGREGATE_LIMIT,
            });
        }
        Ok(Aggregate(value))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn encode(p0: Pin, p1: Pin, p2: Pin) -> Aggregate {
    Aggregate((p0.digit() * RADIX + p1.digit()) * RADIX + p2.digit())
}

pub fn decode(agg: Aggregate) -> (Pin, Pin, Pin) {
    let (rest, d2) = agg.0.div_rem(&RADIX);
    let (d0, d1) = rest.div_rem(&RADIX);
    (Pin::from_digit(d0), Pin::from_digit(d1), Pin::from_digit(d2))
}

/// Validates raw user input and encodes it.
pub fn encode_raw(raw: [i64; 3]) -> Result<Aggregate, PinError> {
    let p0 = Pin::new(raw[0])?;
    let p1 = Pin::new(raw[1])?;
    let p2 = Pin::new(raw[2])?;
    Ok(encode(p0, p1, p2))
}

/// Endless pins derived from a generator, after the discarded draws.
pub struct PinStream<R> {
    rng: R,
}

impl<R: Rng> PinStream<R> {
    pub fn from_rng(mut rng: R) -> PinStream<R> {
        for _ in 0..DISCARDED_DRAWS {
            rng.next_u32();
        }
        PinStream { rng: rng }
    }

    pub fn next_pin(&mut self) -> Pin {
        Pin::from_draw(self.rng.next_u32())
    }
}

impl<R: Rng> Iterator for PinStream<R> {
    type Item = Pin;

    fn next(&mut self) -> Option<Pin> {
        Some(self.next_pin())
    }
}

pub fn derive_pins(seed: u32) -> PinStream<MT19937Rng> {
    derive_pins_with(seed, Seeding::default())
}

pub fn derive_pins_with(seed: u32, seeding: Seeding) -> PinStream<MT19937Rng> {
    PinStream::from_rng(seeding.rng(seed))
}

/// Positions 0..3 of the derived stream: what a matching seed shows first.
pub fn observed_triple(seed: u32, seeding: Seeding) -> (Pin, Pin, Pin) {
    let mut pins = derive_pins_with(seed, seeding);
    let p0 = pins.next_pin();
    let p1 = pins.next_pin();
    let p2 = pins.next_pin();
    (p0, p1, p2)
}

pub fn aggregate_of(seed: u32, seeding: Seeding) -> Aggregate {
    let (p0, p1, p2) = observed_triple(seed, seeding);
    encode(p0, p1, p2)
}

#[cfg(test)]
fn pins(values: &[i64]) -> Vec<Pin> {
    values.iter().map(|&v| Pin::new(v).unwrap()).collect()
}

#[test]
fn test_pin_bounds() {
    assert!(Pin::new(1000).is_ok());
    assert!(Pin::new(10000).is_ok());
    assert_eq!(
        Pin::new(999),
        Err(PinError::OutOfRange { value: 999, min: 1000, max: 10000 })
    );
    assert!(Pin::new(10001).is_err());
    assert!(Pin::new(-5).is_err());
}

#[test]
fn test_encode_extremes() {
    let lo = Pin::new(1000).unwrap();
    let hi = Pin::new(10000).unwrap();
    assert_eq!(encode(lo, lo, lo).value(), 0);
    assert_eq!(encode(hi, hi, hi).value(), AGGREGATE_LIMIT - 1);
    assert_eq!(AGGREGATE_LIMIT, 729243027001);
    assert_eq!(encode_raw([1234, 5678, 9012]).unwrap().value(), 19000326924);
}

#[test]
fn test_decode_inverts_encode() {
    let samples = [1000, 1001, 4999, 5000, 8999, 9999, 10000];
    for &a in samples.iter() {
        for &b in samples.iter() {
            for &c in samples.iter() {
                let agg = encode_raw([a, b, c]).unwrap();
                let (p0, p1, p2) = decode(agg);
                assert_eq!((p0.value(), p1.value(), p2.value()), (a as u16, b as u16, c as u16));
            }
        }
    }
}

#[test]
fn test_encode_is_lexicographic() {
    let triples = [
        [1000, 1000, 10000],
        [1000, 1001, 1000],
        [1000, 10000, 10000],
        [1001, 1000, 1000],
        [5000, 2000, 3000],
        [5000, 2000, 3001],
        [10000, 1000, 1000],
    ];
    let aggs = triples.iter()
        .map(|t| encode_raw(*t).unwrap())
        .collect::<Vec<_>>();
    for pair in aggs.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn test_decode_rejects_out_of_domain() {
    assert!(Aggregate::from_value(AGGREGATE_LIMIT - 1).is_ok());
    assert_eq!(
        Aggregate::from_value(AGGREGATE_LIMIT),
        Err(PinError::AggregateOutOfRange { value: AGGREGATE_LIMIT, limit: AGGREGATE_LIMIT })
    );
}

#[test]
fn test_encode_raw_rejects_any_bad_pin() {
    assert!(encode_raw([1000, 1000, 10001]).is_err());
    assert!(encode_raw([999, 5000, 5000]).is_err());
}

#[test]
fn test_derive_pins_skips_two_draws() {
    // seed_state(42) draws 2746317213, 478163327, 107420369, 3184935163, ...
    let first = derive_pins(42).next().unwrap();
    assert_eq!(first, Pin::from_draw(107420369));
    assert_eq!(derive_pins(42).take(8).collect::<Vec<_>>(),
               pins(&[3435, 4321, 5709, 9659, 5338, 7243, 7367, 2508]));
}

#[test]
fn test_next_pin_follows_iterator() {
    let mut stream = derive_pins(42);
    assert_eq!(stream.next_pin().value(), 3435);
    assert_eq!(stream.next().map(|p| p.value()), Some(4321));
    assert_eq!(stream.next_pin().value(), 5709);
    assert_eq!(observed_triple(42, Seeding::ByArray),
               (Pin(3435), Pin(4321), Pin(5709)));
}

#[test]
fn test_derive_pins_genrand() {
    assert_eq!(derive_pins_with(5489, Seeding::Genrand).take(5).collect::<Vec<_>>(),
               pins(&[7522, 4148, 7611, 4081, 5598]));
}

#[test]
fn test_derive_pins_crosses_regeneration() {
    let long = derive_pins(3).take(1300).collect::<Vec<_>>();
    let again = derive_pins(3).take(1300).collect::<Vec<_>>();
    assert_eq!(long, again);
    assert!(long.iter().all(|p| p.value() >= MIN_PIN && p.value() <= MAX_PIN));
}

#[test]
fn test_aggregate_of() {
    assert_eq!(aggregate_of(0, Seeding::ByArray).value(), 541827870931);
    assert_eq!(aggregate_of(1, Seeding::ByArray).value(), 147879273770);
    assert_eq!(aggregate_of(42, Seeding::Genrand).value(), 99552088858);
    let (p0, p1, p2) = observed_triple(264507, Seeding::ByArray);
    assert_eq!((p0.value(), p1.value(), p2.value()), (4163, 7564, 4037));
}
