// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It is only used to shuffle trial order in randomized phases, where a fixed
// seed must reproduce the same Monte-Carlo run.

/// Source of randomness for trial-order shuffling.
///
/// Callers pass one explicitly; there is no global generator.
pub trait RandomSource {
    fn next_u64(&mut self) -> u64;

    #[inline]
    fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        let v = self.next_u64() % span;
        low + v as usize
    }

    /// Fisher-Yates shuffle.
    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.gen_range_usize(0, i + 1);
            items.swap(i, j);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    /// Seeded from the wall clock; for runs that did not ask for reproducibility.
    pub fn from_entropy() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(nanos ^ 0xD1B54A32D192ED03)
    }
}

impl RandomSource for Prng {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        // Marsaglia / Vigna family. Simple, fast, decent for simulation noise.
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

/// A source that never reorders anything.
///
/// Running a randomized phase with it is equivalent to running the phase in
/// written order, which is what tests compare against.
#[derive(Debug, Clone, Copy, Default)]
pub struct InOrder;

impl RandomSource for InOrder {
    fn next_u64(&mut self) -> u64 {
        0
    }

    fn shuffle<T>(&mut self, _items: &mut [T]) {}
}
