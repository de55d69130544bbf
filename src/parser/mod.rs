//! URL filter grammar: turns a request path into the origin sub-path plus a
//! [`MediaFilters`] value.
//!
//! The grammar is a compact prefix-notation DSL. Each path segment before
//! the origin sub-path is either a `key(args)` filter token (nested to
//! arbitrary depth) or a `[name,...]` plugin chain. The first segment that
//! does not match the grammar ends filter parsing; the remainder is the
//! origin sub-path.

mod lexer;
mod types;

pub use types::{Bitrate, MediaFilters, NestedFilters, Protocol, Trim};

use lexer::{parse_segment, Arg};
use thiserror::Error;

use crate::media::{self, ContentType};

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// A bandwidth or trim range that is inverted, collapsed or out of
    /// `[0, i32::MAX]`.
    #[error("invalid range for filter {key:?}: ({min},{max})")]
    InvalidRange {
        key: String,
        min: String,
        max: String,
    },

    #[error("parsing filter {key:?}: {reason}")]
    InvalidFilter { key: String, reason: String },

    #[error("parsing filter segment {segment:?}: {reason}")]
    Syntax { segment: String, reason: String },
}

/// Track categories a nested filter block can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Video,
    Audio,
    Captions,
}

const TOP_LEVEL_KEYS: &[&str] = &["b", "v", "a", "c", "ct", "t", "l"];

/// Parse a request path into `(origin_sub_path, MediaFilters)`.
///
/// Deterministic and side-effect free; the input is never mutated.
pub fn parse_path(path: &str) -> Result<(String, MediaFilters), ParseError> {
    let mut filters = MediaFilters::default();

    let segments: Vec<&str> = path.split('/').collect();
    let mut origin_start = segments.len();

    for (i, segment) in segments.iter().enumerate() {
        if i == 0 && segment.is_empty() {
            // leading slash
            continue;
        }

        if let Some(plugins) = parse_plugin_chain(segment)? {
            filters.plugins = plugins;
            continue;
        }

        if is_filter_segment(segment) {
            let (key, args) = parse_segment(segment)?;
            apply_top_level(&mut filters, &key, args)?;
            continue;
        }

        origin_start = i;
        break;
    }

    let origin = if origin_start >= segments.len() {
        "/".to_string()
    } else {
        format!("/{}", segments[origin_start..].join("/"))
    };

    filters.protocol = infer_protocol(&origin);

    Ok((origin, filters))
}

fn infer_protocol(origin: &str) -> Protocol {
    if origin.ends_with(".m3u8") {
        Protocol::Hls
    } else if origin.ends_with(".mpd") {
        Protocol::Dash
    } else {
        Protocol::Unknown
    }
}

/// A segment is a filter token when it is `key(...)` for a recognized
/// top-level key. Everything else starts the origin sub-path.
fn is_filter_segment(segment: &str) -> bool {
    match segment.split_once('(') {
        Some((key, rest)) => TOP_LEVEL_KEYS.contains(&key) && rest.ends_with(')'),
        None => false,
    }
}

/// `[name1,name2,...]` anywhere before the origin sub-path.
fn parse_plugin_chain(segment: &str) -> Result<Option<Vec<String>>, ParseError> {
    let Some(inner) = segment
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    else {
        return Ok(None);
    };

    let mut plugins = Vec::new();
    for name in inner.split(',') {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ParseError::Syntax {
                segment: segment.to_string(),
                reason: format!("invalid plugin name {name:?}"),
            });
        }
        plugins.push(name.to_string());
    }
    Ok(Some(plugins))
}

fn apply_top_level(
    filters: &mut MediaFilters,
    key: &str,
    args: Vec<Arg>,
) -> Result<(), ParseError> {
    match key {
        "b" => {
            filters.bitrate = parse_range("b", &args)?;
        }
        "t" => {
            filters.trim = Some(parse_trim(&args)?);
        }
        "ct" => {
            filters.content_types = Some(parse_content_types(&args)?);
        }
        // a top-level language list applies to every track type that
        // carries language metadata
        "l" => {
            let languages = parse_names("l", &args)?;
            filters.audio.languages = Some(languages.clone());
            filters.captions.languages = Some(languages);
        }
        "v" => apply_nested(filters, Category::Video, args)?,
        "a" => apply_nested(filters, Category::Audio, args)?,
        "c" => apply_nested(filters, Category::Captions, args)?,
        other => {
            return Err(ParseError::InvalidFilter {
                key: other.to_string(),
                reason: "unknown filter key".to_string(),
            })
        }
    }
    Ok(())
}

fn apply_nested(
    filters: &mut MediaFilters,
    category: Category,
    args: Vec<Arg>,
) -> Result<(), ParseError> {
    let mut i_frame = false;
    {
        let nested = match category {
            Category::Video => &mut filters.video,
            Category::Audio => &mut filters.audio,
            Category::Captions => &mut filters.captions,
        };

        for arg in args {
            if arg.is_nested() {
                let inner = arg.args.unwrap_or_default();
                match arg.name.as_str() {
                    "b" => nested.bitrate = Some(parse_range("b", &inner)?),
                    "l" => nested.languages = Some(parse_names("l", &inner)?),
                    "co" | "codec" => {
                        let codecs = nested.codecs.get_or_insert_with(Vec::new);
                        for name in parse_names(&arg.name, &inner)? {
                            codecs.extend(media::expand_family(&name));
                        }
                    }
                    other => {
                        return Err(ParseError::InvalidFilter {
                            key: other.to_string(),
                            reason: "unknown nested filter key".to_string(),
                        })
                    }
                }
                continue;
            }

            if arg.name.is_empty() {
                continue;
            }

            if arg.name == "i-frame" && category == Category::Video {
                i_frame = true;
                continue;
            }

            // a bare identifier is the legacy form of co(...)
            nested
                .codecs
                .get_or_insert_with(Vec::new)
                .extend(media::expand_family(&arg.name));
        }
    }

    if i_frame {
        filters.i_frame = true;
    }
    Ok(())
}

/// Flat identifier list; nested calls are rejected.
fn parse_names(key: &str, args: &[Arg]) -> Result<Vec<String>, ParseError> {
    let mut names = Vec::new();
    for arg in args {
        if arg.is_nested() {
            return Err(ParseError::InvalidFilter {
                key: key.to_string(),
                reason: format!("unexpected nested filter {:?}", arg.name),
            });
        }
        if !arg.name.is_empty() {
            names.push(arg.name.clone());
        }
    }
    Ok(names)
}

fn parse_content_types(args: &[Arg]) -> Result<Vec<ContentType>, ParseError> {
    parse_names("ct", args)?
        .iter()
        .map(|name| {
            name.parse::<ContentType>()
                .map_err(|reason| ParseError::InvalidFilter {
                    key: "ct".to_string(),
                    reason,
                })
        })
        .collect()
}

fn parse_range(key: &str, args: &[Arg]) -> Result<Bitrate, ParseError> {
    let (min_lit, max_lit) = range_literals(key, args)?;

    let invalid = || ParseError::InvalidRange {
        key: key.to_string(),
        min: min_lit.to_string(),
        max: max_lit.to_string(),
    };

    let min = match min_lit {
        "" => 0,
        lit => parse_bound(lit).ok_or_else(invalid)?,
    };
    let max = match max_lit {
        "" => i32::MAX,
        lit => parse_bound(lit).ok_or_else(invalid)?,
    };

    if min >= max {
        return Err(invalid());
    }

    Ok(Bitrate { min, max })
}

fn parse_trim(args: &[Arg]) -> Result<Trim, ParseError> {
    let (start_lit, end_lit) = range_literals("t", args)?;

    let invalid = || ParseError::InvalidRange {
        key: "t".to_string(),
        min: start_lit.to_string(),
        max: end_lit.to_string(),
    };

    let start = start_lit.parse::<i64>().ok().filter(|v| *v > 0).ok_or_else(invalid)?;
    let end = end_lit.parse::<i64>().ok().filter(|v| *v > 0).ok_or_else(invalid)?;

    if start >= end {
        return Err(invalid());
    }

    Ok(Trim { start, end })
}

/// Extract the two sides of a range token, either of which may be omitted.
fn range_literals<'a>(key: &str, args: &'a [Arg]) -> Result<(&'a str, &'a str), ParseError> {
    if args.len() > 2 || args.iter().any(Arg::is_nested) {
        return Err(ParseError::InvalidFilter {
            key: key.to_string(),
            reason: "expected (min,max)".to_string(),
        });
    }

    let min = args.first().map(|a| a.name.as_str()).unwrap_or("");
    let max = args.get(1).map(|a| a.name.as_str()).unwrap_or("");
    Ok((min, max))
}

fn parse_bound(lit: &str) -> Option<i32> {
    lit.parse::<i64>()
        .ok()
        .filter(|v| (0..=i32::MAX as i64).contains(v))
        .map(|v| v as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str) -> (String, MediaFilters) {
        parse_path(path).expect("path should parse")
    }

    #[test]
    fn content_type_list() {
        let (origin, filters) = parse("/ct(audio,video)/");
        assert_eq!(origin, "/");
        assert_eq!(
            filters.content_types,
            Some(vec![ContentType::Audio, ContentType::Video])
        );
    }

    #[test]
    fn video_codec_families_expand() {
        let (_, filters) = parse("/v(hdr10)/");
        assert_eq!(
            filters.video.codecs,
            Some(vec!["hev1.2".to_string(), "hvc1.2".to_string()])
        );

        let (_, filters) = parse("/v(hdr10,hevc)/");
        assert_eq!(
            filters.video.codecs,
            Some(vec![
                "hev1.2".to_string(),
                "hvc1.2".to_string(),
                "hev1".to_string(),
                "hvc1".to_string(),
            ])
        );
    }

    #[test]
    fn nested_filters_with_overall_bitrate() {
        let (origin, filters) = parse("/v(hdr10,hevc)/a(aac,l(pt-BR,en),b(10,20))/b(100,4000)/");
        assert_eq!(origin, "/");
        assert_eq!(filters.bitrate, Bitrate { min: 100, max: 4000 });
        assert_eq!(
            filters.audio.codecs,
            Some(vec!["mp4a.40".to_string()])
        );
        assert_eq!(
            filters.audio.languages,
            Some(vec!["pt-BR".to_string(), "en".to_string()])
        );
        assert_eq!(filters.audio.bitrate, Some(Bitrate { min: 10, max: 20 }));
        assert!(filters.video.bitrate.is_none());
    }

    #[test]
    fn overall_range_does_not_override_nested_ranges() {
        let (_, filters) = parse("/v(b(100,500))/a(b(10,20))/b(100,4000)/");
        assert_eq!(filters.video.bitrate, Some(Bitrate { min: 100, max: 500 }));
        assert_eq!(filters.audio.bitrate, Some(Bitrate { min: 10, max: 20 }));
        assert_eq!(filters.bitrate, Bitrate { min: 100, max: 4000 });
    }

    #[test]
    fn open_ended_ranges() {
        let (_, filters) = parse("/b(100,)/");
        assert_eq!(filters.bitrate, Bitrate { min: 100, max: i32::MAX });

        let (_, filters) = parse("/b(,3000)/");
        assert_eq!(filters.bitrate, Bitrate { min: 0, max: 3000 });

        let (_, filters) = parse("/a(b(100,))/v(b(,5000))/");
        assert_eq!(filters.audio.bitrate, Some(Bitrate { min: 100, max: i32::MAX }));
        assert_eq!(filters.video.bitrate, Some(Bitrate { min: 0, max: 5000 }));
    }

    #[test]
    fn inverted_or_collapsed_ranges_fail() {
        for path in [
            "/b(30000,3000)/",
            "/b(3000,3000)/",
            "/a(b(1000,1000))/",
            "/v(b(2000,1000))/",
        ] {
            let err = parse_path(path).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidRange { .. }),
                "{path} should be an invalid range, got {err:?}"
            );
        }
    }

    #[test]
    fn out_of_bounds_ranges_fail() {
        for path in [
            "/a(b(-100,1000))/",
            "/v(b(2147483648))/",
            "/a(b(10,2147483648))/",
            "/v(b(10,-100))/",
        ] {
            assert!(
                matches!(parse_path(path), Err(ParseError::InvalidRange { .. })),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn invalid_range_names_key_and_literals() {
        let err = parse_path("/b(30000,3000)/").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidRange {
                key: "b".to_string(),
                min: "30000".to_string(),
                max: "3000".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "invalid range for filter \"b\": (30000,3000)"
        );
    }

    #[test]
    fn trim_window() {
        let (origin, filters) = parse("/t(100,1000)/path/to/test.m3u8");
        assert_eq!(origin, "/path/to/test.m3u8");
        assert_eq!(filters.protocol, Protocol::Hls);
        assert_eq!(filters.trim, Some(Trim { start: 100, end: 1000 }));
    }

    #[test]
    fn inverted_or_collapsed_trim_fails() {
        assert!(parse_path("/t(10000,1000)/path/to/test.m3u8").is_err());
        assert!(parse_path("/t(1000,1000)/path/to/test.m3u8").is_err());
        assert!(parse_path("/t(0,1000)/path/to/test.m3u8").is_err());
    }

    #[test]
    fn plugin_chain() {
        let (origin, filters) = parse("[plugin1]/some/path/master.m3u8");
        assert_eq!(origin, "/some/path/master.m3u8");
        assert_eq!(filters.plugins, vec!["plugin1"]);

        let (origin, filters) = parse("/v(hdr10)/[plugin1,plugin2,plugin3]/some/path/master.m3u8");
        assert_eq!(origin, "/some/path/master.m3u8");
        assert_eq!(filters.plugins, vec!["plugin1", "plugin2", "plugin3"]);
    }

    #[test]
    fn legacy_bare_codecs_mix_with_nested_calls() {
        let (_, filters) = parse("/a(mp4a,ac-3,b(0,10))/");
        assert_eq!(
            filters.audio.codecs,
            Some(vec!["mp4a".to_string(), "ac-3".to_string()])
        );
        assert_eq!(filters.audio.bitrate, Some(Bitrate { min: 0, max: 10 }));

        let (_, filters) = parse("/a(b(100,200),co(ac-3,aac))/");
        assert_eq!(
            filters.audio.codecs,
            Some(vec!["ac-3".to_string(), "mp4a.40".to_string()])
        );
    }

    #[test]
    fn i_frame_flag() {
        let (origin, filters) = parse("v(i-frame)/path/here/with/master.m3u8");
        assert_eq!(origin, "/path/here/with/master.m3u8");
        assert!(filters.i_frame);
        assert!(filters.video.codecs.is_none());

        let (_, filters) = parse("v(i-frame,avc,l(en))/path/here/with/master.m3u8");
        assert!(filters.i_frame);
        assert_eq!(
            filters.video.codecs,
            Some(vec!["avc1".to_string(), "avc3".to_string()])
        );
        assert_eq!(filters.video.languages, Some(vec!["en".to_string()]));
    }

    #[test]
    fn top_level_language_applies_to_audio_and_captions() {
        let (origin, filters) = parse("v(avc)/a(mp4a)/l(es)/path/here/with/master.m3u8");
        assert_eq!(origin, "/path/here/with/master.m3u8");
        assert_eq!(filters.audio.languages, Some(vec!["es".to_string()]));
        assert_eq!(filters.captions.languages, Some(vec!["es".to_string()]));
        assert_eq!(filters.audio.codecs, Some(vec!["mp4a".to_string()]));
    }

    #[test]
    fn protocol_from_extension() {
        let (_, filters) = parse("/path/here/with/master.m3u8");
        assert_eq!(filters.protocol, Protocol::Hls);

        let (_, filters) = parse("/path/here/with/manifest.mpd");
        assert_eq!(filters.protocol, Protocol::Dash);

        let (_, filters) = parse("/path/here/with/master.txt");
        assert_eq!(filters.protocol, Protocol::Unknown);
    }

    #[test]
    fn propeller_paths_pass_through() {
        let (origin, filters) = parse("/v(avc)/a(aac)/propeller/orgID/master.m3u8");
        assert_eq!(origin, "/propeller/orgID/master.m3u8");
        assert_eq!(filters.protocol, Protocol::Hls);

        let (origin, _) = parse("/propeller/orgID/master.m3u8");
        assert_eq!(origin, "/propeller/orgID/master.m3u8");
    }

    #[test]
    fn parser_is_deterministic() {
        let path = "/v(hdr10,hevc)/a(aac,l(pt-BR,en),b(10,20))/b(100,4000)/x/master.m3u8";
        let first = parse(path);
        for _ in 0..3 {
            assert_eq!(parse(path), first);
        }
    }

    #[test]
    fn empty_codec_set_is_preserved() {
        let (_, filters) = parse("/a(co())/");
        assert_eq!(filters.audio.codecs, Some(vec![]));
    }
}
