// # Play Queue
//
// Local ordering of track URIs, the current position in it, and the
// pre-shuffle snapshot. Lookups by URI always take the first match, so a
// queue holding the same track twice resolves to its earliest occurrence.

use crate::playback::remote::{PlayOffset, PlayRequest};
use rand::Rng;

/// Largest number of URIs submitted in one play request
pub const MAX_PLAY_WINDOW: usize = 50;

const WINDOW_HALF: usize = MAX_PLAY_WINDOW / 2;

/// Slice of the queue submitted to the remote play endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayWindow {
    /// Queue index of `uris[0]`
    pub start: usize,
    pub uris: Vec<String>,
    /// Position of the target track inside `uris`
    pub offset: usize,
}

impl PlayWindow {
    pub fn target(&self) -> &str {
        &self.uris[self.offset]
    }

    pub fn into_request(self) -> PlayRequest {
        PlayRequest {
            uris: self.uris,
            offset: Some(PlayOffset {
                position: self.offset,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayQueue {
    tracks: Vec<String>,
    current_index: Option<usize>,
    original: Option<Vec<String>>,
    shuffle: bool,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_uri(&self) -> Option<&str> {
        self.current_index
            .and_then(|index| self.tracks.get(index))
            .map(String::as_str)
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    /// Replace the tracks wholesale.
    ///
    /// The current index survives only if it still points inside the new
    /// queue. Any pre-shuffle snapshot is discarded since it no longer
    /// describes these tracks.
    pub fn replace(&mut self, tracks: Vec<String>) {
        self.tracks = tracks;
        self.original = None;
        self.current_index = self.current_index.filter(|&index| index < self.tracks.len());
    }

    /// Collapse the queue to a single track and select it
    pub fn collapse_to(&mut self, uri: impl Into<String>) {
        self.replace(vec![uri.into()]);
        self.current_index = Some(0);
    }

    /// Select `index`; returns false (and changes nothing) when out of range
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.current_index = Some(index);
        true
    }

    pub fn locate(&self, uri: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track == uri)
    }

    /// Point the current index at `uri` if it is queued; returns the new index
    pub fn resync(&mut self, uri: &str) -> Option<usize> {
        let index = self.locate(uri)?;
        self.current_index = Some(index);
        Some(index)
    }

    /// Window of at most `MAX_PLAY_WINDOW` consecutive tracks around `index`
    pub fn window(&self, index: usize) -> Option<PlayWindow> {
        if index >= self.tracks.len() {
            return None;
        }
        let start = index.saturating_sub(WINDOW_HALF);
        let end = (index + WINDOW_HALF).min(self.tracks.len());
        Some(PlayWindow {
            start,
            uris: self.tracks[start..end].to_vec(),
            offset: index - start,
        })
    }

    /// Index after the current one, when the queue gives explicit context
    pub fn next_index(&self) -> Option<usize> {
        let current = self.current_index?;
        (self.tracks.len() > 1 && current + 1 < self.tracks.len()).then_some(current + 1)
    }

    /// Index before the current one, when the queue gives explicit context
    pub fn previous_index(&self) -> Option<usize> {
        let current = self.current_index?;
        (self.tracks.len() > 1 && current > 0).then(|| current - 1)
    }

    /// Flip shuffle and reorder accordingly; returns the new flag.
    ///
    /// `current_uri` is the track that should stay first when shuffling and
    /// be re-selected when unshuffling.
    pub fn toggle_shuffle<R: Rng + ?Sized>(&mut self, current_uri: Option<&str>, rng: &mut R) -> bool {
        self.shuffle = !self.shuffle;
        if self.shuffle {
            self.enable_shuffle(current_uri, rng);
        } else {
            self.disable_shuffle(current_uri);
        }
        self.shuffle
    }

    fn enable_shuffle<R: Rng + ?Sized>(&mut self, current_uri: Option<&str>, rng: &mut R) {
        if self.tracks.len() <= 1 {
            return;
        }

        self.original = Some(self.tracks.clone());

        let mut rest = std::mem::take(&mut self.tracks);
        let lead = current_uri
            .and_then(|uri| rest.iter().position(|track| track == uri))
            .map(|pos| rest.remove(pos));
        fisher_yates(&mut rest, rng);

        self.tracks = lead.into_iter().chain(rest).collect();
        self.current_index = Some(0);
    }

    fn disable_shuffle(&mut self, current_uri: Option<&str>) {
        let Some(original) = self.original.take() else {
            return;
        };
        self.tracks = original;
        self.current_index = if self.tracks.is_empty() {
            None
        } else {
            Some(current_uri.and_then(|uri| self.locate(uri)).unwrap_or(0))
        };
    }
}

/// Uniform in-place permutation
fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}
