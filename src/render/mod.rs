/*!
 * Fragment rendering.
 *
 * The renderer turns a fragment into an ordered sequence of fragment
 * objects (text runs and tag events) that a writer serializes with its own
 * tag syntax:
 * - `overlap`: assigns each marker a nested, split or isolated form
 * - `xliff`: XLIFF 2 inline serialization of the objects
 */

pub mod overlap;
pub mod xliff;

use log::warn;
use serde::Serialize;

pub use overlap::{Conflict, Resolution, SpanFamily, SpanForm, SpanMarker, resolve_spans};
pub use xliff::XliffWriter;

use crate::errors::FragmentError;
use crate::model::fragment::Fragment;
use crate::model::markers::{MarkerClass, TagKey, is_marker_unit};
use crate::model::store::{Store, Tags};
use crate::model::tag::{ProtectedContent, Tag, TagType};

/// A tag marker with its resolved form
#[derive(Debug, Clone, PartialEq)]
pub struct TagEvent<'a> {
    pub key: TagKey,
    pub tag: &'a Tag,
    pub form: SpanForm,
    /// Coded-text position of the marker (of the enclosing protected marker for expanded content)
    pub position: usize,
    /// Other half of the pair when both halves are in the fragment
    pub partner: Option<&'a Tag>,
    /// Code half whose other half is in another fragment of the same side
    pub paired_in_unit: bool,
}

impl<'a> TagEvent<'a> {
    pub fn id(&self) -> &'a str {
        self.tag.id()
    }

    pub fn data(&self) -> Option<&'a str> {
        self.tag.data()
    }

    pub fn disp(&self) -> Option<&'a str> {
        self.tag.disp()
    }

    pub fn equiv(&self) -> &'a str {
        self.tag.equiv()
    }

    /// False for split spans whatever the tag says
    pub fn can_overlap(&self) -> bool {
        self.form != SpanForm::Split && self.tag.can_overlap()
    }

    /// True when the other half is nowhere to be paired with; split spans always are
    pub fn isolated(&self) -> bool {
        match self.form {
            SpanForm::Nested => false,
            SpanForm::Split => true,
            SpanForm::Isolated => !self.paired_in_unit,
        }
    }

    pub fn is_code(&self) -> bool {
        self.tag.is_code()
    }

    pub fn is_annotation(&self) -> bool {
        self.tag.is_annotation()
    }
}

/// One item of a rendered fragment, in coded-text order
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentObject<'a> {
    Text(&'a str),
    Opening(TagEvent<'a>),
    Closing(TagEvent<'a>),
    Standalone(TagEvent<'a>),
    /// Hidden content left opaque
    Protected {
        key: TagKey,
        position: usize,
        content: &'a ProtectedContent,
    },
}

impl<'a> FragmentObject<'a> {
    pub fn event(&self) -> Option<&TagEvent<'a>> {
        match self {
            Self::Opening(e) | Self::Closing(e) | Self::Standalone(e) => Some(e),
            Self::Text(_) | Self::Protected { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&'a str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Serializable description, used for JSON output
    pub fn summary(&self) -> ObjectSummary {
        match self {
            Self::Text(t) => ObjectSummary {
                object: "text",
                text: Some(t.to_string()),
                ..Default::default()
            },
            Self::Protected { content, .. } => ObjectSummary {
                object: "protected",
                text: Some(content.coded_text.clone()),
                ..Default::default()
            },
            Self::Opening(e) | Self::Closing(e) | Self::Standalone(e) => ObjectSummary {
                object: match self {
                    Self::Opening(_) => "opening",
                    Self::Closing(_) => "closing",
                    _ => "standalone",
                },
                family: Some(if e.is_code() { SpanFamily::Code } else { SpanFamily::Annotation }),
                id: Some(e.id().to_string()),
                data: e.data().map(str::to_string),
                form: Some(e.form),
                isolated: e.isolated(),
                can_overlap: Some(e.can_overlap()),
                text: None,
            },
        }
    }
}

/// Flat description of a fragment object
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectSummary {
    pub object: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<SpanFamily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<SpanForm>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub isolated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_overlap: Option<bool>,
}

/// Flattened content before resolution
enum Item<'a> {
    Text(&'a str),
    Tag {
        key: TagKey,
        position: usize,
        tag: &'a Tag,
    },
    Protected {
        key: TagKey,
        position: usize,
        content: &'a ProtectedContent,
    },
}

fn flatten<'a>(
    coded: &'a str,
    tags: Option<&'a Tags>,
    outer_position: Option<usize>,
    expand: bool,
    out: &mut Vec<Item<'a>>,
) -> Result<(), FragmentError> {
    let mut run_start = 0;
    let mut chars = coded.char_indices().enumerate();
    while let Some((pos, (byte, c))) = chars.next() {
        if !is_marker_unit(c) {
            continue;
        }
        if byte > run_start {
            out.push(Item::Text(&coded[run_start..byte]));
        }
        let position = outer_position.unwrap_or(pos);
        let corrupted = FragmentError::InvalidPosition {
            position,
            reason: "truncated or malformed marker".to_string(),
        };
        let (key_byte, key_char) = match chars.next() {
            Some((_, (b, k))) => (b, k),
            None => return Err(corrupted),
        };
        let key = TagKey::from_chars(c, key_char).ok_or(corrupted)?;
        run_start = key_byte + key_char.len_utf8();
        let tags = tags.ok_or(FragmentError::UnknownTagReference {
            key,
            position: Some(position),
        })?;
        if key.class == MarkerClass::ProtectedContent {
            let content = tags.protected(key).map_err(|e| e.at_position(position))?;
            if expand {
                flatten(&content.coded_text, Some(tags), Some(position), true, out)?;
            } else {
                out.push(Item::Protected { key, position, content });
            }
        } else {
            let tag = tags.get(key).map_err(|e| e.at_position(position))?;
            out.push(Item::Tag { key, position, tag });
        }
    }
    if run_start < coded.len() {
        out.push(Item::Text(&coded[run_start..]));
    }
    Ok(())
}

/// Whether a code half missing its counterpart in the fragment has one elsewhere on its side
fn has_unit_counterpart(tags: Option<&Tags>, tag: &Tag) -> bool {
    let Some(tags) = tags.filter(|_| tag.is_code()) else {
        return false;
    };
    match tag.tag_type() {
        TagType::Opening => tags.closing_key(tag.id()).is_some(),
        TagType::Closing => tags.opening_key(tag.id()).is_some(),
        TagType::Standalone => false,
    }
}

fn family_of(tag: &Tag) -> SpanFamily {
    if tag.is_code() {
        SpanFamily::Code
    } else {
        SpanFamily::Annotation
    }
}

/// Ordered fragment objects with overlaps resolved.
///
/// Construction fails only with `UnknownTagReference` (or a malformed
/// marker), when the fragment references tags missing from the store.
#[derive(Debug, Clone)]
pub struct Renderer<'a> {
    objects: Vec<FragmentObject<'a>>,
    split_count: usize,
}

impl<'a> Renderer<'a> {
    /// Render with protected content left as opaque objects
    pub fn new(fragment: &'a Fragment, store: &'a Store) -> Result<Self, FragmentError> {
        Self::build(fragment, store, false)
    }

    /// Render with protected content expanded in place
    pub fn with_protected_content(fragment: &'a Fragment, store: &'a Store) -> Result<Self, FragmentError> {
        Self::build(fragment, store, true)
    }

    fn build(fragment: &'a Fragment, store: &'a Store, expand: bool) -> Result<Self, FragmentError> {
        let mut items = Vec::new();
        let tags = store.tags(fragment.side());
        flatten(fragment.coded_text(), tags, None, expand, &mut items)?;

        let tag_items: Vec<(usize, &'a Tag)> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Item::Tag { tag, .. } => Some((i, *tag)),
                _ => None,
            })
            .collect();
        let markers: Vec<SpanMarker<'a>> = tag_items
            .iter()
            .map(|(_, tag)| SpanMarker::new(family_of(tag), tag.tag_type(), tag.id()))
            .collect();
        let resolution = resolve_spans(&markers);

        let mut objects = Vec::with_capacity(items.len());
        let mut marker_index = 0;
        for item in items {
            match item {
                Item::Text(text) => objects.push(FragmentObject::Text(text)),
                Item::Protected { key, position, content } => {
                    objects.push(FragmentObject::Protected { key, position, content })
                }
                Item::Tag { key, position, tag } => {
                    let i = marker_index;
                    marker_index += 1;
                    let form = resolution.form(i);
                    let event = TagEvent {
                        key,
                        tag,
                        form,
                        position,
                        partner: resolution.partner(i).map(|p| tag_items[p].1),
                        paired_in_unit: form == SpanForm::Isolated && has_unit_counterpart(tags, tag),
                    };
                    objects.push(match tag.tag_type() {
                        TagType::Opening => FragmentObject::Opening(event),
                        TagType::Closing => FragmentObject::Closing(event),
                        TagType::Standalone => FragmentObject::Standalone(event),
                    });
                }
            }
        }

        if resolution.split_count() > 0 {
            warn!("Split {} crossing span(s) while rendering", resolution.split_count());
        }
        Ok(Self {
            objects,
            split_count: resolution.split_count(),
        })
    }

    pub fn objects(&self) -> &[FragmentObject<'a>] {
        &self.objects
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FragmentObject<'a>> {
        self.objects.iter()
    }

    /// Number of spans forced out of the nesting
    pub fn split_count(&self) -> usize {
        self.split_count
    }

    /// Concatenated text runs
    pub fn plain_text(&self) -> String {
        self.objects.iter().filter_map(FragmentObject::text).collect()
    }
}

impl<'a> IntoIterator for Renderer<'a> {
    type Item = FragmentObject<'a>;
    type IntoIter = std::vec::IntoIter<FragmentObject<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

impl<'r, 'a> IntoIterator for &'r Renderer<'a> {
    type Item = &'r FragmentObject<'a>;
    type IntoIter = std::slice::Iter<'r, FragmentObject<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}
