//! HLS filter engine: master playlist pruning and media playlist trimming.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use m3u8_rs::{
    AlternativeMedia, AlternativeMediaType, MasterPlaylist, MediaPlaylist, Playlist, VariantStream,
};
use url::Url;

use super::FilterError;
use crate::config::Config;
use crate::media::{self, CodecCategory};
use crate::parser::{MediaFilters, NestedFilters, Trim};

pub struct HlsFilter<'a> {
    manifest_url: &'a Url,
    content: &'a str,
    config: &'a Config,
}

impl<'a> HlsFilter<'a> {
    pub fn new(manifest_url: &'a Url, content: &'a str, config: &'a Config) -> Self {
        Self {
            manifest_url,
            content,
            config,
        }
    }

    /// Apply `filters` and serialize the result. The second element is the
    /// cache advisory in seconds, present only for media playlists.
    pub fn filter_manifest(
        &self,
        filters: &MediaFilters,
    ) -> Result<(String, Option<u64>), FilterError> {
        match m3u8_rs::parse_playlist_res(self.content.as_bytes()) {
            Ok(Playlist::MasterPlaylist(master)) => self
                .filter_master(master, filters)
                .map(|body| (body, None)),
            Ok(Playlist::MediaPlaylist(media)) => self.filter_media(media, filters),
            Err(e) => Err(FilterError::ParseManifest(e.to_string())),
        }
    }

    fn filter_master(
        &self,
        master: MasterPlaylist,
        filters: &MediaFilters,
    ) -> Result<String, FilterError> {
        let mut out = master.clone();

        let mut variants = Vec::with_capacity(master.variants.len());
        for mut variant in master.variants {
            if filters.i_frame && !variant.is_i_frame {
                continue;
            }
            if !validate_variant(filters, &variant) {
                continue;
            }

            let absolute = self.absolutize(&variant.uri)?;
            variant.uri = match &filters.trim {
                Some(trim) => self.trim_uri(trim, &absolute),
                None => absolute.into(),
            };
            variants.push(variant);
        }
        out.variants = variants;

        let mut alternatives = Vec::with_capacity(master.alternatives.len());
        for mut alternative in master.alternatives {
            if !keep_alternative(filters, &alternative) {
                continue;
            }
            if let Some(uri) = &alternative.uri {
                alternative.uri = Some(self.absolutize(uri)?.into());
            }
            alternatives.push(alternative);
        }
        out.alternatives = alternatives;

        write_playlist(|w| out.write_to(w))
    }

    /// Media playlists are served for variant-level requests: trim when a
    /// window is present, otherwise pass through with absolute URIs.
    fn filter_media(
        &self,
        mut media: MediaPlaylist,
        filters: &MediaFilters,
    ) -> Result<(String, Option<u64>), FilterError> {
        match &filters.trim {
            Some(trim) => self.trim_media(&mut media, trim)?,
            None => {
                for segment in &mut media.segments {
                    segment.uri = self.absolutize(&segment.uri)?.into();
                }
            }
        }

        let max_age = media.target_duration as u64;
        let body = write_playlist(|w| media.write_to(w))?;
        Ok((body, Some(max_age)))
    }

    /// Keep segments whose program-date-time falls in `[start, end)`,
    /// reset the media sequence, and close the playlist.
    fn trim_media(&self, media: &mut MediaPlaylist, trim: &Trim) -> Result<(), FilterError> {
        let mut kept = Vec::new();
        for mut segment in std::mem::take(&mut media.segments) {
            let pdt = segment.program_date_time.ok_or_else(|| FilterError::NoPdt {
                uri: segment.uri.clone(),
            })?;

            let at = pdt.timestamp();
            if at >= trim.start && at < trim.end {
                segment.uri = self.absolutize(&segment.uri)?.into();
                kept.push(segment);
            }
        }

        media.segments = kept;
        media.media_sequence = 0;
        media.end_list = true;
        Ok(())
    }

    /// Resolve a possibly-relative URI against the manifest location.
    fn absolutize(&self, uri: &str) -> Result<Url, FilterError> {
        self.manifest_url
            .join(uri)
            .map_err(|e| FilterError::ManifestUrl {
                url: uri.to_string(),
                reason: e.to_string(),
            })
    }

    /// Rewrite a variant URI into a gateway request that carries the trim
    /// window forward: `https://{host}/t(start,end)/{base64url(uri)}.m3u8`.
    fn trim_uri(&self, trim: &Trim, absolute: &Url) -> String {
        format!(
            "https://{}/t({},{})/{}.m3u8",
            self.config.hostname,
            trim.start,
            trim.end,
            URL_SAFE_NO_PAD.encode(absolute.as_str())
        )
    }
}

fn write_playlist(
    write: impl FnOnce(&mut Vec<u8>) -> std::io::Result<()>,
) -> Result<String, FilterError> {
    let mut buffer = Vec::new();
    write(&mut buffer).map_err(|e| FilterError::Serialize(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| FilterError::Serialize(e.to_string()))
}

/// True when the variant survives every applicable predicate.
fn validate_variant(filters: &MediaFilters, variant: &VariantStream) -> bool {
    if !validate_bandwidth(filters, variant.bandwidth) {
        return false;
    }

    let codecs: Vec<&str> = variant
        .codecs
        .as_deref()
        .map(|c| c.split(',').collect())
        .unwrap_or_default();

    validate_codecs(&codecs, CodecCategory::Audio, &filters.audio)
        && validate_codecs(&codecs, CodecCategory::Video, &filters.video)
        && validate_codecs(&codecs, CodecCategory::Caption, &filters.captions)
}

/// The overall window applies always; a nested per-category window narrows
/// it further via intersection.
fn validate_bandwidth(filters: &MediaFilters, bandwidth: u64) -> bool {
    if !filters.bitrate.contains(bandwidth) {
        return false;
    }

    for nested in [&filters.video, &filters.audio] {
        if let Some(window) = &nested.bitrate {
            if !filters.bitrate.intersect(window).contains(bandwidth) {
                return false;
            }
        }
    }

    true
}

/// All-must-match: every codec of the filtered category present in the
/// variant has to match the allowed set. A variant without codecs of the
/// category passes; an empty allowed set therefore drops any variant that
/// carries the category at all.
fn validate_codecs(codecs: &[&str], category: CodecCategory, nested: &NestedFilters) -> bool {
    let Some(allowed) = &nested.codecs else {
        return true;
    };

    let mut in_variant = 0;
    let mut matched = 0;
    for codec in codecs {
        if media::categorize(codec) == Some(category) {
            in_variant += 1;
            if media::matches_any(codec, allowed) {
                matched += 1;
            }
        }
    }

    in_variant == matched
}

/// Language pruning of `EXT-X-MEDIA` entries, per track category.
fn keep_alternative(filters: &MediaFilters, alternative: &AlternativeMedia) -> bool {
    let languages = match alternative.media_type {
        AlternativeMediaType::Audio => filters.audio.languages.as_ref(),
        AlternativeMediaType::Video => filters.video.languages.as_ref(),
        AlternativeMediaType::Subtitles | AlternativeMediaType::ClosedCaptions => {
            filters.captions.languages.as_ref()
        }
        _ => None,
    };

    match languages {
        Some(allowed) => alternative
            .language
            .as_deref()
            .is_some_and(|lang| allowed.iter().any(|l| l == lang)),
        None => true,
    }
}
