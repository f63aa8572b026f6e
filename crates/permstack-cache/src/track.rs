//! Track membership lookups used by track-scoped stack elements

#![allow(missing_docs)]

use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

/// Live view of tracks (ordered group lists).
pub trait TrackProvider: Send + Sync {
    /// Groups on `track` in order, or None if the track does not resolve.
    fn track_groups(&self, track: &str) -> Option<Vec<String>>;

    /// Whether `group` is currently on `track`. None if the track does not resolve.
    fn track_contains(&self, track: &str, group: &str) -> Option<bool> {
        self.track_groups(track)
            .map(|groups| groups.iter().any(|g| g.eq_ignore_ascii_case(group)))
    }
}

/// In-memory track registry. Updates are visible to the next lookup.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: RwLock<HashMap<String, Vec<String>>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a track. Names are stored lowercase.
    pub fn set_track<I, S>(&self, track: &str, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups = groups
            .into_iter()
            .map(|g| g.as_ref().to_lowercase())
            .collect();
        self.tracks.write().insert(track.to_lowercase(), groups);
    }

    pub fn remove_track(&self, track: &str) -> bool {
        self.tracks.write().remove(&track.to_lowercase()).is_some()
    }
}

impl TrackProvider for TrackRegistry {
    fn track_groups(&self, track: &str) -> Option<Vec<String>> {
        self.tracks.read().get(&track.to_lowercase()).cloned()
    }
}

/// Memoizes one track's membership for the lifetime of a resolution pass.
///
/// Other tracks are delegated to the live provider.
pub(crate) struct PassTrackSnapshot {
    live: Arc<dyn TrackProvider>,
    track: String,
    members: OnceLock<Option<Vec<String>>>,
}

impl PassTrackSnapshot {
    pub(crate) fn new(live: Arc<dyn TrackProvider>, track: impl Into<String>) -> Self {
        Self {
            live,
            track: track.into(),
            members: OnceLock::new(),
        }
    }
}

impl TrackProvider for PassTrackSnapshot {
    fn track_groups(&self, track: &str) -> Option<Vec<String>> {
        if track.eq_ignore_ascii_case(&self.track) {
            self.members
                .get_or_init(|| self.live.track_groups(track))
                .clone()
        } else {
            self.live.track_groups(track)
        }
    }

    fn track_contains(&self, track: &str, group: &str) -> Option<bool> {
        if track.eq_ignore_ascii_case(&self.track) {
            self.members
                .get_or_init(|| self.live.track_groups(track))
                .as_ref()
                .map(|groups| groups.iter().any(|g| g.eq_ignore_ascii_case(group)))
        } else {
            self.live.track_contains(track, group)
        }
    }
}
