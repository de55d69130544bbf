//! Codec family tables shared by the HLS and DASH filter engines.
//!
//! A codec family identifier (the value a caller puts in a `co(...)` filter)
//! maps to one or more prefixes of RFC 6381 codec strings. The same table
//! drives two operations: classifying a codec string found in a manifest
//! into a track category, and testing membership of a codec string in a
//! filter's codec set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Codec string prefixes that identify a video track.
const VIDEO_PREFIXES: &[&str] = &["avc1", "avc3", "hev1", "hvc1", "dvh1", "dvhe"];

/// Codec string prefixes that identify an audio track.
const AUDIO_PREFIXES: &[&str] = &["mp4a", "ac-3", "ec-3"];

/// Codec string prefixes that identify a caption track.
const CAPTION_PREFIXES: &[&str] = &["stpp", "wvtt"];

/// Track category of a single codec string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecCategory {
    Video,
    Audio,
    Caption,
}

/// Classify a manifest codec string (e.g. `avc1.64001f`) by prefix.
///
/// Returns `None` for codec strings outside the table, which the filter
/// engines treat as having no opinion.
pub fn categorize(codec: &str) -> Option<CodecCategory> {
    let codec = codec.trim();
    if VIDEO_PREFIXES.iter().any(|p| codec.starts_with(p)) {
        return Some(CodecCategory::Video);
    }
    if AUDIO_PREFIXES.iter().any(|p| codec.starts_with(p)) {
        return Some(CodecCategory::Audio);
    }
    if CAPTION_PREFIXES.iter().any(|p| codec.starts_with(p)) {
        return Some(CodecCategory::Caption);
    }
    None
}

/// Expand a codec family identifier into the manifest codec string prefixes
/// it matches. Identifiers outside the table pass through unchanged so the
/// legacy bare-prefix form (`a(mp4a.40.2)`) keeps working.
pub fn expand_family(id: &str) -> Vec<String> {
    let prefixes: &[&str] = match id {
        "avc" => &["avc1", "avc3"],
        "hvc" | "hevc" => &["hev1", "hvc1"],
        "dvh" => &["dvh1", "dvhe"],
        "hdr10" => &["hev1.2", "hvc1.2"],
        "aac" => &["mp4a.40"],
        _ => return vec![id.to_string()],
    };
    prefixes.iter().map(|p| p.to_string()).collect()
}

/// True when `codec` matches at least one prefix in the expanded set.
pub fn matches_any(codec: &str, prefixes: &[String]) -> bool {
    let codec = codec.trim();
    prefixes.iter().any(|p| codec.starts_with(p.as_str()))
}

/// Whole-track-type selector used by the `ct(...)` filter and matched
/// against the DASH `contentType` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Audio,
    Text,
    Image,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Text => "text",
            ContentType::Image => "image",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(ContentType::Video),
            "audio" => Ok(ContentType::Audio),
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            other => Err(format!("unknown content type {other:?}")),
        }
    }
}
