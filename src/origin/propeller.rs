//! Propeller path patterns and channel/clip resolution.
//!
//! A channel that has gone away is retried as its archive clip
//! (`{channelID}-archive`), so recently-ended live events keep playing.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::OriginError;
use crate::propeller::{Channel, Clip, PropellerApi};

// Ordered: the clip pattern must win over the channel pattern, which would
// otherwise swallow `clip/{id}` as a channel id.
static CLIP_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/propeller/(?P<orgID>[^/]+)/clip/(?P<clipID>[^/]+)\.m3u8$").unwrap()
});
static CHANNEL_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/propeller/(?P<orgID>[^/]+)/(?P<channelID>[^/]+)\.m3u8$").unwrap()
});

/// Which Propeller lookup a request maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Getter {
    Channel { org_id: String, id: String },
    Clip { org_id: String, id: String },
}

/// Match `path` against the allowed Propeller path forms, first match wins.
pub fn parse_path(path: &str) -> Result<Getter, OriginError> {
    if let Some(captures) = CLIP_PATH.captures(path) {
        return Ok(Getter::Clip {
            org_id: captures["orgID"].to_string(),
            id: captures["clipID"].to_string(),
        });
    }

    if let Some(captures) = CHANNEL_PATH.captures(path) {
        return Ok(Getter::Channel {
            org_id: captures["orgID"].to_string(),
            id: captures["channelID"].to_string(),
        });
    }

    Err(OriginError::PropellerShape)
}

/// Resolve a getter to a playback URL via the Propeller API.
pub async fn resolve(api: &dyn PropellerApi, getter: &Getter) -> Result<Url, OriginError> {
    match getter {
        Getter::Channel { org_id, id } => match api.get_channel(org_id, id).await {
            Ok(channel) => channel_playback_url(&channel),
            // a missing channel may have been archived already
            Err(e) if e.not_found() => fetch_clip(api, org_id, &format!("{id}-archive")).await,
            Err(e) => Err(OriginError::Channel(e)),
        },
        Getter::Clip { org_id, id } => fetch_clip(api, org_id, id).await,
    }
}

async fn fetch_clip(api: &dyn PropellerApi, org_id: &str, clip_id: &str) -> Result<Url, OriginError> {
    let clip = api
        .get_clip(org_id, clip_id)
        .await
        .map_err(OriginError::Clip)?;
    clip_playback_url(&clip)
}

/// Playback URL precedence for a channel: the ad-stitched URL while the
/// channel is running with ads, then the captioned URL, then the plain one.
/// A stopped channel's DAI playlist carries an ENDLIST tag and 404s, which
/// is why `status` gates the ads URL.
fn channel_playback_url(channel: &Channel) -> Result<Url, OriginError> {
    if channel.ads && channel.status == "running" {
        return Url::parse(&channel.ads_url).map_err(OriginError::ChannelUrl);
    }

    if channel.captions {
        return Url::parse(&channel.captions_url).map_err(OriginError::ChannelUrl);
    }

    channel.url().map_err(|e| match e {
        crate::propeller::PropellerError::PlaybackUrl(source) => OriginError::ChannelUrl(source),
        other => OriginError::Channel(other),
    })
}

fn clip_playback_url(clip: &Clip) -> Result<Url, OriginError> {
    if clip.playback_url.is_empty() {
        return Err(OriginError::ClipNotReady);
    }

    Url::parse(&clip.playback_url).map_err(OriginError::ClipUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propeller::PropellerError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FakePropeller {
        channels: HashMap<String, Channel>,
        clips: HashMap<String, Clip>,
    }

    #[async_trait]
    impl PropellerApi for FakePropeller {
        async fn get_channel(&self, org_id: &str, id: &str) -> Result<Channel, PropellerError> {
            self.channels
                .get(&format!("{org_id}/{id}"))
                .cloned()
                .ok_or(PropellerError::Status(404))
        }

        async fn get_clip(&self, org_id: &str, id: &str) -> Result<Clip, PropellerError> {
            self.clips
                .get(&format!("{org_id}/{id}"))
                .cloned()
                .ok_or(PropellerError::Status(404))
        }
    }

    fn channel(ads: bool, captions: bool, status: &str, playback: &str) -> Channel {
        Channel {
            ads,
            ads_url: "https://ads.test/master.m3u8".to_string(),
            captions,
            captions_url: "https://captions.test/master.m3u8".to_string(),
            status: status.to_string(),
            playback_url: playback.to_string(),
        }
    }

    #[test]
    fn clip_pattern_wins_over_channel_pattern() {
        assert_eq!(
            parse_path("/propeller/org1/clip/clip1.m3u8").unwrap(),
            Getter::Clip {
                org_id: "org1".to_string(),
                id: "clip1".to_string(),
            }
        );
        assert_eq!(
            parse_path("/propeller/org1/ch1.m3u8").unwrap(),
            Getter::Channel {
                org_id: "org1".to_string(),
                id: "ch1".to_string(),
            }
        );
        assert!(parse_path("/propeller/org1/too/many/parts/x.m3u8").is_err());
        assert!(parse_path("/propeller/org1").is_err());
    }

    #[test]
    fn ads_url_wins_only_while_running() {
        let running = channel(true, true, "running", "https://play.test/master.m3u8");
        assert_eq!(
            channel_playback_url(&running).unwrap().as_str(),
            "https://ads.test/master.m3u8"
        );

        let stopped = channel(true, true, "stopped", "https://play.test/master.m3u8");
        assert_eq!(
            channel_playback_url(&stopped).unwrap().as_str(),
            "https://captions.test/master.m3u8"
        );
    }

    #[test]
    fn captions_url_wins_over_playback_url() {
        let c = channel(false, true, "running", "https://play.test/master.m3u8");
        assert_eq!(
            channel_playback_url(&c).unwrap().as_str(),
            "https://captions.test/master.m3u8"
        );
    }

    #[test]
    fn plain_channel_uses_playback_url() {
        let c = channel(false, false, "running", "https://play.test/master.m3u8");
        assert_eq!(
            channel_playback_url(&c).unwrap().as_str(),
            "https://play.test/master.m3u8"
        );
    }

    #[test]
    fn channel_without_any_url_fails() {
        let c = channel(false, false, "running", "");
        assert!(channel_playback_url(&c).is_err());
    }

    #[test]
    fn clip_without_playback_url_is_not_ready() {
        let clip = Clip {
            status: "pending".to_string(),
            ..Clip::default()
        };
        assert!(matches!(
            clip_playback_url(&clip),
            Err(OriginError::ClipNotReady)
        ));
    }

    #[tokio::test]
    async fn missing_channel_falls_back_to_archive_clip() {
        let mut clips = HashMap::new();
        clips.insert(
            "org/ch-archive".to_string(),
            Clip {
                status: "created".to_string(),
                playback_url: "https://archive.test/clip.m3u8".to_string(),
                ..Clip::default()
            },
        );
        let api = FakePropeller {
            channels: HashMap::new(),
            clips,
        };

        let getter = Getter::Channel {
            org_id: "org".to_string(),
            id: "ch".to_string(),
        };
        let url = resolve(&api, &getter).await.unwrap();
        assert_eq!(url.as_str(), "https://archive.test/clip.m3u8");
    }

    #[tokio::test]
    async fn missing_channel_and_archive_surface_clip_error() {
        let api = FakePropeller {
            channels: HashMap::new(),
            clips: HashMap::new(),
        };
        let getter = Getter::Channel {
            org_id: "org".to_string(),
            id: "ch".to_string(),
        };
        assert!(matches!(
            resolve(&api, &getter).await,
            Err(OriginError::Clip(_))
        ));
    }
}
