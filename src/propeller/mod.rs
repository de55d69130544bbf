//! REST client for the Propeller live-channel service.
//!
//! The gateway consumes exactly two endpoints: channel lookup and clip
//! lookup. Calls authenticate with the basic-auth credentials from
//! `PROPELLER_CREDS`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum PropellerError {
    #[error("propeller api returned http status {0}")]
    Status(u16),

    #[error("calling propeller api: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parsing propeller host url: {0}")]
    Host(url::ParseError),

    #[error("propeller creds must be `user:pass`")]
    Creds,

    #[error("parsing channel url: {0}")]
    PlaybackUrl(url::ParseError),
}

impl PropellerError {
    /// True when the upstream lookup missed, which drives the
    /// channel-to-archive-clip fallback.
    pub fn not_found(&self) -> bool {
        matches!(self, PropellerError::Status(404))
    }
}

/// A live channel as returned by the channel endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub ads: bool,
    #[serde(default)]
    pub ads_url: String,
    #[serde(default)]
    pub captions: bool,
    #[serde(default)]
    pub captions_url: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub playback_url: String,
}

impl Channel {
    pub fn url(&self) -> Result<Url, PropellerError> {
        Url::parse(&self.playback_url).map_err(PropellerError::PlaybackUrl)
    }
}

/// An archived clip as returned by the clip endpoint. `playback_url` stays
/// empty until the clip has finished processing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Clip {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_description: String,
    #[serde(default)]
    pub playback_url: String,
}

/// The two lookups the origin resolver needs. Split out as a trait so unit
/// tests can substitute recorded responses.
#[async_trait]
pub trait PropellerApi: Send + Sync {
    async fn get_channel(&self, org_id: &str, channel_id: &str) -> Result<Channel, PropellerError>;

    async fn get_clip(&self, org_id: &str, clip_id: &str) -> Result<Clip, PropellerError>;
}

pub struct PropellerClient {
    client: Client,
    host: Url,
    user: String,
    pass: String,
}

impl PropellerClient {
    pub fn new(host: &str, creds: &str, timeout: Duration) -> Result<Self, PropellerError> {
        let host = Url::parse(host).map_err(PropellerError::Host)?;
        let (user, pass) = creds.split_once(':').ok_or(PropellerError::Creds)?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("failed to build propeller client with timeout: {}", e);
                Client::new()
            });

        Ok(Self {
            client,
            host,
            user: user.to_string(),
            pass: pass.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.host.as_str().trim_end_matches('/'), path)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, PropellerError> {
        let response = self
            .client
            .get(self.endpoint(path))
            .basic_auth(&self.user, Some(&self.pass))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PropellerError::Status(status.as_u16()));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PropellerApi for PropellerClient {
    async fn get_channel(&self, org_id: &str, channel_id: &str) -> Result<Channel, PropellerError> {
        self.get(&format!("/v1/organization/{org_id}/channel/{channel_id}"))
            .await
    }

    async fn get_clip(&self, org_id: &str, clip_id: &str) -> Result<Clip, PropellerError> {
        self.get(&format!("/v1/organization/{org_id}/clip/{clip_id}"))
            .await
    }
}
