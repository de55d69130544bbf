use serde::{Deserialize, Serialize};

use crate::media::ContentType;

/// Streaming protocol, inferred from the manifest filename suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Hls,
    Dash,
    #[default]
    Unknown,
}

/// A closed bandwidth window in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitrate {
    pub min: i32,
    pub max: i32,
}

impl Default for Bitrate {
    fn default() -> Self {
        Self {
            min: 0,
            max: i32::MAX,
        }
    }
}

impl Bitrate {
    /// True when `bandwidth` falls inside the window, endpoints included.
    pub fn contains(&self, bandwidth: u64) -> bool {
        bandwidth >= self.min as u64 && bandwidth <= self.max as u64
    }

    /// Intersection of two windows. The result may be empty (`min > max`),
    /// in which case nothing passes `contains`.
    pub fn intersect(&self, other: &Bitrate) -> Bitrate {
        Bitrate {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Bitrate::default()
    }
}

/// A wall-clock trim window in Unix seconds, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trim {
    pub start: i64,
    pub end: i64,
}

/// Per-track-type constraints nested under `v(...)`, `a(...)` or `c(...)`.
///
/// `codecs` distinguishes unset (`None`, no opinion) from empty
/// (`Some(vec![])`, drop every variant carrying this track type). Codec
/// entries are already expanded to manifest codec string prefixes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NestedFilters {
    pub codecs: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub bitrate: Option<Bitrate>,
}

impl NestedFilters {
    pub fn is_empty(&self) -> bool {
        self.codecs.is_none() && self.languages.is_none() && self.bitrate.is_none()
    }
}

/// The parsed request: every constraint encoded in the URL, immutable once
/// built. One value flows through origin resolution and both filter engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFilters {
    pub protocol: Protocol,
    pub bitrate: Bitrate,
    pub video: NestedFilters,
    pub audio: NestedFilters,
    pub captions: NestedFilters,
    pub content_types: Option<Vec<ContentType>>,
    pub trim: Option<Trim>,
    pub plugins: Vec<String>,
    pub i_frame: bool,
}

impl MediaFilters {
    /// True when the overall bandwidth window deviates from the default.
    pub fn defines_bitrate_filter(&self) -> bool {
        !self.bitrate.is_default()
    }

    /// The effective window for one track category: the overall window
    /// intersected with the category's nested window when present.
    pub fn effective_window(&self, nested: &NestedFilters) -> Bitrate {
        match &nested.bitrate {
            Some(b) => self.bitrate.intersect(b),
            None => self.bitrate,
        }
    }

    /// True when any DASH pruning filter is present, which is what makes
    /// the MPD reindexing pass run.
    pub fn prunes_dash(&self) -> bool {
        self.content_types.is_some()
            || self.video.codecs.is_some()
            || self.audio.codecs.is_some()
            || self.captions.codecs.is_some()
            || self.video.languages.is_some()
            || self.audio.languages.is_some()
            || self.captions.languages.is_some()
    }
}
