//! DASH filter engine: MPD tree pruning, BaseURL normalization and
//! reindexing.
//!
//! The MPD is held as a generic element tree so everything the engine does
//! not understand (SegmentTemplates, ContentProtection, vendor extensions)
//! rides through untouched.

use url::Url;

use super::xml::{Document, Element, Node};
use super::{xml, FilterError};
use crate::media::{self, CodecCategory, ContentType};
use crate::parser::{MediaFilters, NestedFilters};

pub struct DashFilter<'a> {
    manifest_url: &'a Url,
    content: &'a str,
}

impl<'a> DashFilter<'a> {
    pub fn new(manifest_url: &'a Url, content: &'a str) -> Self {
        Self {
            manifest_url,
            content,
        }
    }

    pub fn filter_manifest(&self, filters: &MediaFilters) -> Result<String, FilterError> {
        let mut doc: Document = xml::parse(self.content)?;
        if doc.root.name != "MPD" {
            return Err(FilterError::ParseManifest(format!(
                "root element is {:?}, expected MPD",
                doc.root.name
            )));
        }

        self.normalize_base_url(&mut doc.root)?;

        for node in &mut doc.root.children {
            if let Node::Element(period) = node {
                if period.name == "Period" {
                    filter_period(period, filters);
                }
            }
        }

        if filters.prunes_dash() {
            reindex(&mut doc.root);
        }

        xml::serialize(&doc)
    }

    /// Absent BaseURL becomes the manifest directory; a relative one is
    /// joined to it. Either way the result carries a trailing slash.
    fn normalize_base_url(&self, root: &mut Element) -> Result<(), FilterError> {
        let manifest_dir = self.join(".")?;

        if let Some(base) = root.first_element_mut("BaseURL") {
            let current = base.text();
            if !current.starts_with("http") {
                let mut joined = self.join(&current)?.to_string();
                if !joined.ends_with('/') {
                    joined.push('/');
                }
                base.set_text(&joined);
            }
            return Ok(());
        }

        let mut base = Element::new("BaseURL");
        base.set_text(manifest_dir.as_str());
        root.children.insert(0, Node::Element(base));
        Ok(())
    }

    fn join(&self, reference: &str) -> Result<Url, FilterError> {
        self.manifest_url
            .join(reference)
            .map_err(|e| FilterError::ManifestUrl {
                url: reference.to_string(),
                reason: e.to_string(),
            })
    }
}

fn filter_period(period: &mut Element, filters: &MediaFilters) {
    period.children.retain(|node| match node {
        Node::Element(set) if set.name == "AdaptationSet" => keep_adaptation_set(set, filters),
        _ => true,
    });

    for node in &mut period.children {
        if let Node::Element(set) = node {
            if set.name == "AdaptationSet" {
                prune_representations(set, filters);
            }
        }
    }
}

/// Content-type and language pruning of one adaptation set.
fn keep_adaptation_set(set: &Element, filters: &MediaFilters) -> bool {
    let content_type = set.attr("contentType");

    if let Some(allowed) = &filters.content_types {
        let matches = content_type
            .is_some_and(|ct| allowed.iter().any(|a| a.as_str() == ct));
        if !matches {
            return false;
        }
    }

    for (nested, category_type) in category_filters(filters) {
        let Some(languages) = &nested.languages else {
            continue;
        };
        if content_type != Some(category_type.as_str()) {
            continue;
        }
        let matches = set
            .attr("lang")
            .is_some_and(|lang| languages.iter().any(|l| l == lang));
        if !matches {
            return false;
        }
    }

    true
}

/// Codec pruning of the representations inside one adaptation set. A
/// representation without a codecs attribute has no opinion and stays.
fn prune_representations(set: &mut Element, filters: &MediaFilters) {
    let Some(content_type) = set.attr("contentType") else {
        return;
    };

    let (nested, category) = match content_type {
        "video" => (&filters.video, CodecCategory::Video),
        "audio" => (&filters.audio, CodecCategory::Audio),
        "text" => (&filters.captions, CodecCategory::Caption),
        _ => return,
    };
    let Some(allowed) = &nested.codecs else {
        return;
    };

    set.children.retain(|node| match node {
        Node::Element(rep) if rep.name == "Representation" => match rep.attr("codecs") {
            None => true,
            Some(codecs) => codecs
                .split(',')
                .filter(|c| media::categorize(c) == Some(category))
                .all(|c| media::matches_any(c, allowed)),
        },
        _ => true,
    });
}

fn category_filters(filters: &MediaFilters) -> [(&NestedFilters, ContentType); 3] {
    [
        (&filters.video, ContentType::Video),
        (&filters.audio, ContentType::Audio),
        (&filters.captions, ContentType::Text),
    ]
}

/// Post-prune reindexing: adaptation sets count `0..` within each kept
/// period, periods without adaptation sets vanish, kept periods count `0..`.
fn reindex(root: &mut Element) {
    let mut period_index = 0;
    root.children.retain_mut(|node| {
        let Node::Element(period) = node else {
            return true;
        };
        if period.name != "Period" {
            return true;
        }

        let mut set_index = 0;
        for child in &mut period.children {
            if let Node::Element(set) = child {
                if set.name == "AdaptationSet" {
                    set.set_attr("id", &set_index.to_string());
                    set_index += 1;
                }
            }
        }

        if set_index == 0 {
            return false;
        }

        period.set_attr("id", &period_index.to_string());
        period_index += 1;
        true
    });
}
