use std::cmp;
use std::num::Wrapping as w;

use rand::{Rand, Rng, SeedableRng};

#[allow(bad_style)]
pub type w32 = w<u32>;

// Mersenne Twister 19937 Constants
const MW: usize = 32;
const MU: usize = 11;
const MS: usize = 7;
const ML: usize = 18;
const MT: usize = 15;
pub const MN: usize = 624;
const MM: usize = 397;
const M1: w32 = w(0x1_u32);
const MA: w32 = w(0x9908B0DF_u32);
const MB: w32 = w(0x9D2C5680_u32);
const MC: w32 = w(0xEFC60000_u32);
const MF: w32 = w(0x6C078965_u32);
const MPU: w32 = w(0x80000000_u32);
const MPL: w32 = w(0x7fffffff_u32);

// init_by_array constants
const ARRAY_BASE_SEED: u32 = 19650218;
const MK1: w32 = w(1664525_u32);
const MK2: w32 = w(1566083941_u32);

#[allow(bad_style)]
#[derive(Clone)]
pub struct MT19937Rng {
    i: usize,
    X: [w32; MN],
}

impl MT19937Rng {
    pub fn new_unseeded() -> MT19937Rng {
        MT19937Rng::genrand(5489)
    }

    /// Classic single-value seeding (`init_genrand`).
    pub fn genrand(seed: u32) -> MT19937Rng {
        let mut rng = MT19937Rng {
            i: MN,
            X: [w(0_u32); MN],
        };
        rng.seed_genrand(seed);
        rng
    }

    /// Classic array seeding (`init_by_array`): `init_genrand(19650218)`
    /// re-mixed with `key`. An empty key behaves like `[0]`.
    pub fn by_array(key: &[u32]) -> MT19937Rng {
        let mut rng = MT19937Rng {
            i: MN,
            X: [w(0_u32); MN],
        };
        rng.seed_by_array(key);
        rng
    }

    /// Position within the current block of 624 words. `MN` means the next
    /// draw regenerates the whole block.
    pub fn index(&self) -> usize {
        self.i
    }

    fn seed_genrand(&mut self, seed: u32) {
        self.i = MN;
        self.X[0] = w(seed);
        for j in 1..MN {
            let x_p = self.X[j - 1];
            self.X[j] = MF * (x_p ^ (x_p >> (MW - 2))) + w(j as u32);
        }
    }

    fn seed_by_array(&mut self, key: &[u32]) {
        let key = if key.is_empty() { &[0_u32][..] } else { key };

        self.seed_genrand(ARRAY_BASE_SEED);

        let mut i = 1;
        let mut j = 0;
        for _ in 0..cmp::max(MN, key.len()) {
            let x_p = self.X[i - 1];
            self.X[i] = (self.X[i] ^ ((x_p ^ (x_p >> (MW - 2))) * MK1))
                + w(key[j])
                + w(j as u32);
            i += 1;
            j += 1;
            if i >= MN {
                self.X[0] = self.X[MN - 1];
                i = 1;
            }
            if j >= key.len() {
                j = 0;
            }
        }
        for _ in 0..MN - 1 {
            let x_p = self.X[i - 1];
            self.X[i] = (self.X[i] ^ ((x_p ^ (x_p >> (MW - 2))) * MK2)) - w(i as u32);
            i += 1;
            if i >= MN {
                self.X[0] = self.X[MN - 1];
                i = 1;
            }
        }

        // MSB is 1, assuring a non-zero initial array
        self.X[0] = MPU;
        self.i = MN;
    }

    #[allow(bad_style)]
    fn twist(&mut self) {
        for j in 0..MN {
            let x = (self.X[j] & MPU) | (self.X[(j + 1) % MN] & MPL);
            let xA = (x >> 1) ^ (MA * (x & M1));
            self.X[j] = self.X[(j + MM) % MN] ^ xA;
        }
        self.i = 0;
    }
}

impl SeedableRng<u32> for MT19937Rng {
    fn reseed(&mut self, seed: u32) {
        self.seed_genrand(seed);
    }

    fn from_seed(seed: u32) -> MT19937Rng {
        MT19937Rng::genrand(seed)
    }
}

impl<'a> SeedableRng<&'a [u32]> for MT19937Rng {
    fn reseed(&mut self, key: &'a [u32]) {
        self.seed_by_array(key);
    }

    fn from_seed(key: &'a [u32]) -> MT19937Rng {
        MT19937Rng::by_array(key)
    }
}

impl Rng for MT19937Rng {
    fn next_u32(&mut self) -> u32 {
        if self.i >= MN {
            self.twist();
        }

        let mut y = self.X[self.i];
        y = y ^ (y >> MU);
        y = y ^ ((y << MS) & MB);
        y = y ^ ((y << MT) & MC);
        y = y ^ (y >> ML);

        self.i += 1;
        y.0
    }
}

impl Rand for MT19937Rng {
    fn rand<R: Rng>(rng: &mut R) -> MT19937Rng {
        MT19937Rng::by_array(&[rng.next_u32()])
    }
}

/// Which seeding transform turns a 32-bit table seed into generator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Seeding {
    /// `init_by_array(&[seed])`.
    ByArray,
    /// `init_genrand(seed)`, the legacy single-value transform.
    Genrand,
}

impl Default for Seeding {
    fn default() -> Seeding {
        Seeding::ByArray
    }
}

impl Seeding {
    pub fn rng(self, seed: u32) -> MT19937Rng {
        match self {
            Seeding::ByArray => MT19937Rng::by_array(&[seed]),
            Seeding::Genrand => MT19937Rng::genrand(seed),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Seeding::ByArray => "by_array",
            Seeding::Genrand => "genrand",
        }
    }
}

/// Fresh generator state for `seed`, ready for its first draw.
pub fn seed_state(seed: u32) -> MT19937Rng {
    Seeding::ByArray.rng(seed)
}

/// One draw: the tempered output and the advanced state.
pub fn draw(mut state: MT19937Rng) -> (u32, MT19937Rng) {
    let out = state.next_u32();
    (out, state)
}

#[cfg(test)]
fn take(rng: &mut MT19937Rng, n: usize) -> Vec<u32> {
    (0..n).map(|_| rng.next_u32()).collect()
}

#[test]
fn test_genrand_reference_vector() {
    let mut rng = MT19937Rng::genrand(5489);
    assert_eq!(
        take(&mut rng, 5),
        vec![3499211612, 581869302, 3890346734, 3586334585, 545404204]
    );
}

#[test]
fn test_new_unseeded_is_default_seed() {
    let mut a = MT19937Rng::new_unseeded();
    let mut b = MT19937Rng::genrand(5489);
    assert_eq!(take(&mut a, 10), take(&mut b, 10));
}

#[test]
fn test_by_array_reference_vector() {
    // mt19937ar.c test key
    let mut rng = MT19937Rng::by_array(&[0x123, 0x234, 0x345, 0x456]);
    assert_eq!(
        take(&mut rng, 5),
        vec![1067595299, 955945823, 477289528, 4107218783, 4228976476]
    );
}

#[test]
fn test_seed_state_single_key() {
    let cases: [(u32, [u32; 5]); 4] = [
        (0, [3626764237, 1654615998, 3255389356, 3823568514, 1806341205]),
        (1, [577090037, 2444712010, 3639700191, 3445702192, 3280387012]),
        (42, [2746317213, 478163327, 107420369, 3184935163, 1181241943]),
        (0xdeadbeef, [82178386, 1831771319, 2017055984, 3864962434, 2573907513]),
    ];
    for &(seed, expected) in cases.iter() {
        let mut rng = seed_state(seed);
        assert_eq!(take(&mut rng, 5), expected.to_vec(), "seed {}", seed);
    }
}

#[test]
fn test_empty_key_matches_zero_key() {
    let mut a = MT19937Rng::by_array(&[]);
    let mut b = MT19937Rng::by_array(&[0]);
    assert_eq!(take(&mut a, 8), take(&mut b, 8));
}

#[test]
fn test_regeneration_boundary() {
    let mut rng = MT19937Rng::genrand(5489);
    let outs = take(&mut rng, 628);
    assert_eq!(&outs[624..], &[4178893912, 610818241, 2787397224, 2762441380]);

    let mut rng = seed_state(1);
    let outs = take(&mut rng, 628);
    assert_eq!(&outs[624..], &[1360367077, 3404757168, 3638416111, 2486814534]);
}

#[test]
fn test_index_forces_regeneration() {
    let mut rng = seed_state(7);
    assert_eq!(rng.index(), MN);
    rng.next_u32();
    assert_eq!(rng.index(), 1);
    for _ in 1..MN {
        rng.next_u32();
    }
    assert_eq!(rng.index(), MN);
    rng.next_u32();
    assert_eq!(rng.index(), 1);
}

#[test]
fn test_draw_is_pure_step() {
    let state = seed_state(42);
    let (first, state) = draw(state);
    let (second, _) = draw(state);
    assert_eq!((first, second), (2746317213, 478163327));
}

#[test]
fn test_replays_are_independent() {
    let seed: u32 = rand::weak_rng().gen();
    let mut a = seed_state(seed);
    let mut interleaved = seed_state(seed.wrapping_add(1));
    let mut b = seed_state(seed);

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for _ in 0..1500 {
        xs.push(a.next_u32());
        interleaved.next_u32();
        ys.push(b.next_u32());
    }
    assert_eq!(xs, ys);
}

#[test]
fn test_reseed_restarts_stream() {
    let mut rng = seed_state(99);
    let first = take(&mut rng, 700);
    rng.reseed(&[99_u32][..]);
    assert_eq!(take(&mut rng, 700), first);

    rng.reseed(5489_u32);
    assert_eq!(rng.next_u32(), 3499211612);
}

#[test]
fn test_seeding_selects_transform() {
    let mut a = Seeding::Genrand.rng(5489);
    assert_eq!(a.next_u32(), 3499211612);
    let mut b = Seeding::ByArray.rng(42);
    assert_eq!(b.next_u32(), 2746317213);
    assert_eq!(Seeding::default(), Seeding::ByArray);
}

#[test]
fn test_rand_builds_array_seeded_rng() {
    let mut src = MT19937Rng::genrand(5489);
    let mut rng: MT19937Rng = src.gen();
    // gen() consumed 3499211612 as the key
    let mut expected = MT19937Rng::by_array(&[3499211612]);
    assert_eq!(take(&mut rng, 4), take(&mut expected, 4));
}
