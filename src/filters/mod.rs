//! Manifest filter engines and the protocol dispatcher.
//!
//! Both engines consume the same [`MediaFilters`] value but work at
//! different granularities: HLS prunes variants inside a master playlist,
//! DASH prunes adaptation sets inside an MPD. They share only the codec
//! classification tables in [`crate::media`].

pub mod dash;
pub mod hls;
mod xml;

use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::parser::{MediaFilters, Protocol};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("decoding manifest: {0}")]
    ParseManifest(String),

    #[error("serializing manifest: {0}")]
    Serialize(String),

    #[error("parsing manifest url {url:?}: {reason}")]
    ManifestUrl { url: String, reason: String },

    #[error("trimming media playlist: segment {uri:?} has no program-date-time")]
    NoPdt { uri: String },

    #[error("unsupported protocol")]
    UnsupportedProtocol,
}

/// A filtered manifest plus the response metadata the handler needs.
#[derive(Debug)]
pub struct FilteredManifest {
    pub body: String,
    /// Cache advisory in seconds; only media playlists carry one.
    pub max_age: Option<u64>,
    pub content_type: &'static str,
}

/// Dispatch on the request protocol and run the matching engine.
pub fn filter_manifest(
    config: &Config,
    playback_url: &Url,
    body: &str,
    filters: &MediaFilters,
) -> Result<FilteredManifest, FilterError> {
    match filters.protocol {
        Protocol::Hls => {
            let filter = hls::HlsFilter::new(playback_url, body, config);
            let (body, max_age) = filter.filter_manifest(filters)?;
            Ok(FilteredManifest {
                body,
                max_age,
                content_type: "application/x-mpegURL",
            })
        }
        Protocol::Dash => {
            let filter = dash::DashFilter::new(playback_url, body);
            let body = filter.filter_manifest(filters)?;
            Ok(FilteredManifest {
                body,
                max_age: None,
                content_type: "application/dash+xml",
            })
        }
        Protocol::Unknown => Err(FilterError::UnsupportedProtocol),
    }
}
