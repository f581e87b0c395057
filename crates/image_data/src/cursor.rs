use crate::dataset::Entry;
use crate::error::ConfigError;
use anyhow::Result;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info};

/// ============================================================================
/// Endless read position over the manifest entries.
///
/// The cursor owns the entry list and hands entries out in order, wrapping
/// back to the first one after the last. With `shuffle` enabled, the whole
/// list is permuted at setup and again on every wraparound.
///
/// # Seed Handling
/// - The generator is created once, either from an explicit seed or from the
///   process-level RNG, and is owned by the cursor.
/// - Wraparound reshuffles keep advancing the same generator (no reseeding),
///   so a fixed seed reproduces the whole sequence of epochs.
///
/// # Example
/// ```ignore
/// let mut cursor = DatasetCursor::init(entries, true, 0, Some(42))?;
/// let first: Entry = cursor.next().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DatasetCursor {
    entries: Vec<Entry>,
    position: usize,
    shuffle: bool,
    rng: StdRng,
    wraparounds: usize,
}

impl DatasetCursor {
    /// Creates a cursor at position 0 without touching the entry order.
    pub fn new(entries: Vec<Entry>, shuffle: bool, rng: StdRng) -> Self {
        Self {
            entries,
            position: 0,
            shuffle,
            rng,
            wraparounds: 0,
        }
    }

    /// Creates a cursor, shuffles it if requested, then skips a random number
    /// of entries in `[0, rand_skip)`.
    ///
    /// # Errors
    /// `ConfigError::NotEnoughPointsToSkip` if `rand_skip` is non-zero and not
    /// smaller than the number of entries.
    pub fn init(
        entries: Vec<Entry>,
        shuffle: bool,
        rand_skip: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        let mut cursor = Self::new(entries, shuffle, StdRng::seed_from_u64(seed));

        if shuffle {
            info!("Shuffling data");
            cursor.shuffle_entries();
        }

        if rand_skip > 0 {
            if rand_skip >= cursor.len() {
                return Err(ConfigError::NotEnoughPointsToSkip {
                    rand_skip,
                    dataset_size: cursor.len(),
                }
                .into());
            }
            let skip = cursor.rng.random_range(0..rand_skip);
            info!("Skipping first {} data points", skip);
            cursor.position = skip;
        }

        Ok(cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry [`current`](Self::current) returns.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of times the cursor has wrapped back to the start.
    pub fn wraparounds(&self) -> usize {
        self.wraparounds
    }

    /// Entries in their current (possibly shuffled) order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn current(&self) -> Option<&Entry> {
        self.entries.get(self.position)
    }

    /// Entry `offset` steps ahead of the current one, wrapping around.
    /// Does not move the cursor.
    pub fn peek_ahead(&self, offset: usize) -> Option<&Entry> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get((self.position + offset) % self.entries.len())
    }

    /// Moves to the next entry, restarting (and reshuffling) at the end.
    pub fn advance(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.position += 1;
        if self.position >= self.entries.len() {
            debug!("Restarting data prefetching from start.");
            self.position = 0;
            self.wraparounds += 1;
            if self.shuffle {
                self.shuffle_entries();
            }
        }
    }

    fn shuffle_entries(&mut self) {
        self.entries.shuffle(&mut self.rng);
    }
}

/// Never ends for a non-empty dataset; yields `None` only when there are no entries.
impl Iterator for DatasetCursor {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let entry = self.current()?.clone();
        self.advance();
        Some(entry)
    }
}
