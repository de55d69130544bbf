//! Origin resolution: classify the origin sub-path produced by the URL
//! parser, resolve it to a playback URL, and fetch the manifest.
//!
//! Three origin kinds share the same two-operation surface (`playback_url`,
//! `fetch_manifest`): a relative path under the configured origin host, a
//! base64-encoded variant URL, and a Propeller channel/clip lookup. Modeled
//! as a tagged enum rather than trait objects.

pub mod propeller;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::propeller::{PropellerApi, PropellerError};
use propeller::Getter;

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("propeller origin: request format is not `/propeller/orgID/channelID.m3u8`")]
    PropellerShape,

    #[error("propeller origin: propeller is not configured")]
    PropellerNotConfigured,

    #[error("propeller origin: fetching channel: {0}")]
    Channel(#[source] PropellerError),

    #[error("propeller origin: fetching clip: {0}")]
    Clip(#[source] PropellerError),

    #[error("propeller origin: parsing channel url: {0}")]
    ChannelUrl(#[source] url::ParseError),

    #[error("propeller origin: parsing clip url: {0}")]
    ClipUrl(#[source] url::ParseError),

    #[error("propeller origin: clip status: not ready")]
    ClipNotReady,

    #[error("decoding variant manifest url {token:?}: {reason}")]
    BadVariantEncoding { token: String, reason: String },

    #[error("parsing origin url {url:?}: {source}")]
    Url {
        url: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetching manifest: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetching manifest: returning http status of {0}")]
    Status(u16),

    #[error("parsing last-modified header {value:?}: {source}")]
    BadHeader {
        value: String,
        source: chrono::ParseError,
    },
}

/// Raw manifest response from the origin.
#[derive(Debug, Clone)]
pub struct ManifestInfo {
    pub manifest: String,
    pub last_modified: Option<DateTime<FixedOffset>>,
    pub status: u16,
}

/// A resolved origin. Every variant carries its playback URL; the variant
/// itself records how the request was classified.
#[derive(Debug, Clone)]
pub enum Origin {
    Default(DefaultOrigin),
    Propeller(PropellerOrigin),
}

#[derive(Debug, Clone)]
pub struct DefaultOrigin {
    playback_url: Url,
}

#[derive(Debug, Clone)]
pub struct PropellerOrigin {
    pub getter: Getter,
    playback_url: Url,
}

impl Origin {
    /// Classify `path` and resolve it to a fetchable origin.
    ///
    /// Classification is ordered: Propeller paths first, then single-segment
    /// base64 variant URLs, then relative paths under the configured origin
    /// host (absolute URLs pass through untouched).
    pub async fn configure(
        config: &Config,
        api: Option<&dyn PropellerApi>,
        path: &str,
    ) -> Result<Origin, OriginError> {
        if path.starts_with("/propeller/") {
            let getter = propeller::parse_path(path)?;
            let api = api.ok_or(OriginError::PropellerNotConfigured)?;
            let playback_url = propeller::resolve(api, &getter).await?;
            return Ok(Origin::Propeller(PropellerOrigin {
                getter,
                playback_url,
            }));
        }

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() == 2 && parts[0].is_empty() && parts[1].ends_with(".m3u8") {
            let playback_url = decode_variant_url(parts[1])?;
            return Ok(Origin::Default(DefaultOrigin { playback_url }));
        }

        let playback_url = match Url::parse(path) {
            Ok(absolute) => absolute,
            Err(_) => {
                let joined = format!("{}{}", config.origin_host.trim_end_matches('/'), path);
                Url::parse(&joined).map_err(|source| OriginError::Url {
                    url: joined,
                    source,
                })?
            }
        };

        Ok(Origin::Default(DefaultOrigin { playback_url }))
    }

    pub fn playback_url(&self) -> &Url {
        match self {
            Origin::Default(o) => &o.playback_url,
            Origin::Propeller(o) => &o.playback_url,
        }
    }

    /// One GET against the playback URL. The shared client carries the
    /// configured timeout; cancellation propagates by dropping the future.
    pub async fn fetch_manifest(&self, client: &reqwest::Client) -> Result<ManifestInfo, FetchError> {
        let response = client.get(self.playback_url().clone()).send().await?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Status(status));
        }

        let last_modified = match response.headers().get(reqwest::header::LAST_MODIFIED) {
            Some(value) => {
                let value = value.to_str().unwrap_or_default().to_string();
                let parsed = DateTime::parse_from_rfc2822(&value)
                    .map_err(|source| FetchError::BadHeader { value, source })?;
                Some(parsed)
            }
            None => None,
        };

        let manifest = response.text().await?;

        Ok(ManifestInfo {
            manifest,
            last_modified,
            status,
        })
    }
}

/// A single-segment path `<token>.m3u8` is the URL-safe unpadded base64 of
/// an absolute variant URL emitted by the trim rewriter.
fn decode_variant_url(segment: &str) -> Result<Url, OriginError> {
    let token = segment.trim_end_matches(".m3u8");
    let bad = |reason: String| OriginError::BadVariantEncoding {
        token: token.to_string(),
        reason,
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| bad(e.to_string()))?;
    let decoded = String::from_utf8(bytes).map_err(|e| bad(e.to_string()))?;
    Url::parse(&decoded).map_err(|e| bad(e.to_string()))
}
