//! Thread-local RNG for the prefetch thread.
//!
//! Random transforms (crop offsets, mirroring) draw from this generator so a
//! fixed seed reproduces the same augmentations. Threads that never seed it
//! (e.g. a consumer calling a transform directly) fall back to the process RNG.

use rand::rngs::StdRng;
use rand::Rng as _;
use rand::SeedableRng;
use std::cell::RefCell;

thread_local! {
    /// Seeded once when the prefetch thread starts.
    pub static TRANSFORM_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// Seeds the calling thread's transform RNG.
/// Seed formula: base_seed + 1, keeping it distinct from the cursor's shuffle stream.
pub fn init_transform_rng(base_seed: u64) {
    TRANSFORM_RNG.with(|rng| {
        *rng.borrow_mut() = Some(StdRng::seed_from_u64(base_seed.wrapping_add(1)));
    })
}

/// Random bool with probability `p`.
pub fn transform_gen_bool(p: f64) -> bool {
    TRANSFORM_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_bool(p),
        None => rand::rng().random_bool(p),
    })
}

/// Uniform integer in `[0, upper)`; returns 0 when `upper` is 0 or 1.
pub fn transform_gen_below(upper: u32) -> u32 {
    if upper <= 1 {
        return 0;
    }
    TRANSFORM_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_range(0..upper),
        None => rand::rng().random_range(0..upper),
    })
}
