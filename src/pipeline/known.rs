//! Snapshot and known-set containers.
//!
//! Both containers are keyed by [`media_key`], so "the same item" always
//! means "the same numeric id", whatever its title or availability says.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::IteratorRandom;

use crate::models::{Media, MediaId, media_key};

/// Items seen in one poll cycle, deduplicated by id.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    items: HashMap<MediaId, Media>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item unless one with the same id is already present.
    /// Returns `true` when the item was added.
    pub fn insert(&mut self, media: Media) -> bool {
        let key = media_key(&media);
        if self.items.contains_key(&key) {
            return false;
        }
        self.items.insert(key, media);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Media> {
        self.items.values()
    }
}

impl Extend<Media> for Snapshot {
    fn extend<I: IntoIterator<Item = Media>>(&mut self, iter: I) {
        for media in iter {
            self.insert(media);
        }
    }
}

impl FromIterator<Media> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Media>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        snapshot.extend(iter);
        snapshot
    }
}

impl IntoIterator for Snapshot {
    type Item = Media;
    type IntoIter = std::collections::hash_map::IntoValues<MediaId, Media>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}

/// Items observed in earlier cycles; the baseline for finding new arrivals.
#[derive(Debug, Default)]
pub struct KnownSet {
    items: HashMap<MediaId, Media>,
    primed: bool,
}

impl KnownSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the first snapshot has been recorded.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Replace the contents with the first snapshot of the process.
    pub fn prime(&mut self, snapshot: Snapshot) {
        self.items = snapshot.items;
        self.primed = true;
    }

    /// Items of `current` whose id is not known yet.
    ///
    /// Does not modify the set; call [`KnownSet::absorb`] afterwards.
    pub fn diff(&self, current: &Snapshot) -> Vec<Media> {
        current
            .items
            .iter()
            .filter(|(key, _)| !self.items.contains_key(*key))
            .map(|(_, media)| media.clone())
            .collect()
    }

    /// Add newly seen items.
    pub fn absorb<I: IntoIterator<Item = Media>>(&mut self, new: I) {
        for media in new {
            self.items.entry(media_key(&media)).or_insert(media);
        }
    }

    /// Drop one random item so the next cycle reports it as new.
    pub fn forget_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Media> {
        let key = *self.items.keys().choose(rng)?;
        self.items.remove(&key)
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
