/*!
 * The coded-text buffer and the operations that mutate it.
 *
 * A fragment holds literal text interleaved with two-char markers. The tags
 * behind the markers live in the store table of the fragment's side, so
 * every operation that reads or writes tags takes the store explicitly.
 * Positions are char positions in the coded text.
 */

use log::{debug, warn};

use crate::errors::FragmentError;
use crate::model::markers::{
    self, MARKER_WIDTH, MarkerClass, PCONT_STANDALONE, TagKey, is_marker_unit, scan_markers,
    strip_markers,
};
use crate::model::metadata::{AnnotationKind, Metadata};
use crate::model::store::{Side, Store, Tags};
use crate::model::tag::{CTag, Directionality, MTag, ProtectedContent, Tag, TagType};
use crate::render::overlap::{Resolution, SpanFamily, SpanMarker, resolve_spans};

/// A marker of this fragment with what the overlap resolver needs to know
#[derive(Debug, Clone, Copy)]
struct Located<'s> {
    position: usize,
    key: TagKey,
    marker: SpanMarker<'s>,
}

/// Owned copy of a fragment's content, used to clone across stores
#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text(String),
    Tag(Tag),
    Protected(Vec<Piece>),
}

fn corrupted(position: usize) -> FragmentError {
    FragmentError::InvalidPosition {
        position,
        reason: "truncated or malformed marker".to_string(),
    }
}

fn span_family(class: MarkerClass) -> SpanFamily {
    if class.is_code() {
        SpanFamily::Code
    } else if class.is_annotation() {
        SpanFamily::Annotation
    } else {
        SpanFamily::Protected
    }
}

/// Decode the markers of a coded text against a tag table
fn locate<'s>(coded: &str, tags: Option<&'s Tags>) -> Result<Vec<Located<'s>>, FragmentError> {
    let mut located = Vec::new();
    for found in scan_markers(coded) {
        let found = found.map_err(corrupted)?;
        let missing = || FragmentError::UnknownTagReference {
            key: found.key,
            position: Some(found.position),
        };
        let tags = tags.ok_or_else(missing)?;
        let marker = if found.key.class == MarkerClass::ProtectedContent {
            tags.protected(found.key).map_err(|_| missing())?;
            SpanMarker::new(SpanFamily::Protected, TagType::Standalone, "")
        } else {
            let tag = tags.get(found.key).map_err(|e| e.at_position(found.position))?;
            SpanMarker::new(span_family(found.key.class), tag.tag_type(), tag.id())
        };
        located.push(Located {
            position: found.position,
            key: found.key,
            marker,
        });
    }
    Ok(located)
}

fn resolve(located: &[Located<'_>]) -> Resolution {
    let markers: Vec<SpanMarker<'_>> = located.iter().map(|l| l.marker).collect();
    resolve_spans(&markers)
}

/// Release the tags referenced in a coded text, including those hidden in protected content
fn release_in(tags: &mut Tags, coded: &str) -> Result<usize, FragmentError> {
    let mut count = 0;
    for found in scan_markers(coded) {
        let found = found.map_err(corrupted)?;
        if found.key.class == MarkerClass::ProtectedContent {
            let content = tags
                .release_protected(found.key)
                .map_err(|e| e.at_position(found.position))?;
            count += release_in(tags, &content.coded_text)?;
        } else {
            tags.release(found.key).map_err(|e| e.at_position(found.position))?;
            count += 1;
        }
    }
    Ok(count)
}

fn snapshot_text(coded: &str, tags: Option<&Tags>) -> Result<Vec<Piece>, FragmentError> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut chars = coded.chars().enumerate();
    while let Some((pos, c)) = chars.next() {
        if !is_marker_unit(c) {
            text.push(c);
            continue;
        }
        let key = chars
            .next()
            .and_then(|(_, k)| TagKey::from_chars(c, k))
            .ok_or_else(|| corrupted(pos))?;
        let tags = tags.ok_or(FragmentError::UnknownTagReference {
            key,
            position: Some(pos),
        })?;
        if !text.is_empty() {
            pieces.push(Piece::Text(std::mem::take(&mut text)));
        }
        if key.class == MarkerClass::ProtectedContent {
            let content = tags.protected(key).map_err(|e| e.at_position(pos))?;
            pieces.push(Piece::Protected(snapshot_text(&content.coded_text, Some(tags))?));
        } else {
            pieces.push(Piece::Tag(tags.get(key).map_err(|e| e.at_position(pos))?.clone()));
        }
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    Ok(pieces)
}

fn materialize(pieces: Vec<Piece>, tags: &mut Tags) -> Result<String, FragmentError> {
    let mut coded = String::new();
    for piece in pieces {
        match piece {
            Piece::Text(text) => coded.push_str(&text),
            Piece::Tag(tag) => coded.push_str(&tags.register(tag)?.to_ref()),
            Piece::Protected(inner) => {
                let inner = materialize(inner, tags)?;
                let key = tags.register_protected(ProtectedContent { coded_text: inner })?;
                coded.push_str(&key.to_ref());
            }
        }
    }
    Ok(coded)
}

/// One item of a fragment's content as stored, before any overlap resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Content<'a> {
    Text(&'a str),
    Tag(TagKey, &'a Tag),
    Protected(TagKey, &'a ProtectedContent),
}

/// Coded text plus the side of the unit it belongs to.
///
/// Not `Clone`: a copy must deep-copy its tags, see [`Fragment::clone_into`].
#[derive(Debug, PartialEq, Eq)]
pub struct Fragment {
    coded: String,
    side: Side,
    dir: Directionality,
}

impl Fragment {
    pub fn new(side: Side) -> Self {
        Self {
            coded: String::new(),
            side,
            dir: Directionality::Inherited,
        }
    }

    pub fn source() -> Self {
        Self::new(Side::Source)
    }

    pub fn target(locale: &str) -> Self {
        Self::new(Side::target(locale))
    }

    pub fn side(&self) -> &Side {
        &self.side
    }

    pub fn is_target(&self) -> bool {
        self.side.is_target()
    }

    pub fn dir(&self) -> Directionality {
        self.dir
    }

    pub fn set_dir(&mut self, dir: Directionality) {
        self.dir = dir;
    }

    /// Own directionality, or the one declared on the store for this side
    pub fn resolved_dir(&self, store: &Store) -> Directionality {
        match self.dir {
            Directionality::Inherited => store.dir(&self.side),
            dir => dir,
        }
    }

    pub fn coded_text(&self) -> &str {
        &self.coded
    }

    /// Text with all markers removed
    pub fn text(&self) -> String {
        strip_markers(&self.coded)
    }

    /// Length of the coded text in chars
    pub fn len(&self) -> usize {
        self.coded.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.coded.is_empty()
    }

    pub fn has_tag(&self) -> bool {
        self.coded.chars().any(is_marker_unit)
    }

    /// True when some literal text is not whitespace
    pub fn has_text(&self) -> bool {
        let mut chars = self.coded.chars();
        while let Some(c) = chars.next() {
            if is_marker_unit(c) {
                chars.next();
            } else if !c.is_whitespace() {
                return true;
            }
        }
        false
    }

    pub fn is_marker_unit(c: char) -> bool {
        is_marker_unit(c)
    }

    fn tags<'s>(&self, store: &'s Store) -> Option<&'s Tags> {
        store.tags(&self.side)
    }

    fn byte_at(&self, pos: usize) -> usize {
        self.coded
            .char_indices()
            .nth(pos)
            .map(|(b, _)| b)
            .unwrap_or(self.coded.len())
    }

    fn is_inside_marker(&self, pos: usize) -> bool {
        pos > 0 && self.coded.chars().nth(pos - 1).is_some_and(is_marker_unit)
    }

    /// Reject positions past the end or between the two chars of a marker.
    pub fn check_position(&self, pos: usize) -> Result<(), FragmentError> {
        let len = self.len();
        if pos > len {
            return Err(FragmentError::InvalidPosition {
                position: pos,
                reason: format!("past the end of the coded text ({} chars)", len),
            });
        }
        if self.is_inside_marker(pos) {
            return Err(FragmentError::InvalidPosition {
                position: pos,
                reason: "inside a marker".to_string(),
            });
        }
        Ok(())
    }

    fn sanitized(text: &str) -> String {
        let (clean, replaced) = markers::sanitize_text(text);
        if replaced > 0 {
            warn!("Replaced {} marker char(s) found in literal text", replaced);
        }
        clean
    }

    /// Append literal text.
    pub fn append(&mut self, text: &str) -> &mut Self {
        let clean = Self::sanitized(text);
        self.coded.push_str(&clean);
        self
    }

    pub fn append_char(&mut self, c: char) -> &mut Self {
        if is_marker_unit(c) {
            warn!("Replaced marker char U+{:04X} found in literal text", c as u32);
            self.coded.push(markers::REPLACEMENT);
        } else {
            self.coded.push(c);
        }
        self
    }

    /// Register a prepared tag and append its marker, without pairing checks.
    pub fn append_tag(&mut self, store: &mut Store, tag: Tag) -> Result<TagKey, FragmentError> {
        let key = store.tags_mut(&self.side)?.register(tag)?;
        self.coded.push_str(&key.to_ref());
        Ok(key)
    }

    pub fn open_code<'d>(
        &mut self,
        store: &mut Store,
        id: &str,
        data: impl Into<Option<&'d str>>,
    ) -> Result<TagKey, FragmentError> {
        let key = self.append_tag(store, CTag::new(TagType::Opening, id, data.into()).into())?;
        debug!("Opened code '{}' as {}", id, key);
        Ok(key)
    }

    /// Append the closing code of the most recent unclosed opening with this id.
    pub fn close_code<'d>(
        &mut self,
        store: &mut Store,
        id: &str,
        data: impl Into<Option<&'d str>>,
    ) -> Result<TagKey, FragmentError> {
        let closing = {
            let opener = self
                .unclosed_opening(store, SpanFamily::Code, id)?
                .ok_or_else(|| FragmentError::UnmatchedCloseTag {
                    id: id.to_string(),
                    position: self.len(),
                })?;
            let tags = self.tags(store).ok_or(FragmentError::UnknownTagReference {
                key: opener,
                position: None,
            })?;
            CTag::closing_for(tags.code(opener)?, data.into())
        };
        self.append_tag(store, closing.into())
    }

    pub fn append_standalone_code<'d>(
        &mut self,
        store: &mut Store,
        id: &str,
        data: impl Into<Option<&'d str>>,
    ) -> Result<TagKey, FragmentError> {
        self.append_tag(store, CTag::new(TagType::Standalone, id, data.into()).into())
    }

    /// Append an annotation opening; an id is suggested by the store when none is given.
    pub fn open_annotation(
        &mut self,
        store: &mut Store,
        id: Option<&str>,
        kind: AnnotationKind,
    ) -> Result<TagKey, FragmentError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => store.suggest_id(false),
        };
        self.append_tag(store, MTag::opening(&id, kind).into())
    }

    pub fn close_annotation(&mut self, store: &mut Store, id: &str) -> Result<TagKey, FragmentError> {
        let closing = {
            let opener = self
                .unclosed_opening(store, SpanFamily::Annotation, id)?
                .ok_or_else(|| FragmentError::UnmatchedCloseTag {
                    id: id.to_string(),
                    position: self.len(),
                })?;
            let tags = self.tags(store).ok_or(FragmentError::UnknownTagReference {
                key: opener,
                position: None,
            })?;
            MTag::closing_for(tags.annotation(opener)?)
        };
        self.append_tag(store, closing.into())
    }

    /// Most recent opening of this family and id without a closing in this fragment
    fn unclosed_opening(
        &self,
        store: &Store,
        family: SpanFamily,
        id: &str,
    ) -> Result<Option<TagKey>, FragmentError> {
        let located = locate(&self.coded, self.tags(store))?;
        let resolution = resolve(&located);
        Ok(located
            .iter()
            .enumerate()
            .rev()
            .find(|(i, l)| {
                l.marker.family == family
                    && l.marker.tag_type == TagType::Opening
                    && l.marker.id == id
                    && resolution.partner(*i).is_none()
            })
            .map(|(_, l)| l.key))
    }

    fn insert_marker(&mut self, pos: usize, key: TagKey) {
        let at = self.byte_at(pos);
        self.coded.insert_str(at, &key.to_ref());
    }

    /// Insert literal text at a coded-text position.
    pub fn insert_text(&mut self, offset: usize, text: &str) -> Result<(), FragmentError> {
        self.check_position(offset)?;
        let clean = Self::sanitized(text);
        let at = self.byte_at(offset);
        self.coded.insert_str(at, &clean);
        Ok(())
    }

    /// Insert a code marker at a coded-text position.
    ///
    /// A closing code takes its span attributes from an opening code with the
    /// same id when the table has one.
    pub fn insert_code<'d>(
        &mut self,
        store: &mut Store,
        tag_type: TagType,
        id: &str,
        data: impl Into<Option<&'d str>>,
        offset: usize,
    ) -> Result<TagKey, FragmentError> {
        self.check_position(offset)?;
        let data = data.into();
        let tag = match tag_type {
            TagType::Closing => {
                let opener = self
                    .tags(store)
                    .and_then(|t| t.opening_key(id).and_then(|k| t.code(k).ok()));
                match opener {
                    Some(opener) => CTag::closing_for(opener, data),
                    None => CTag::new(TagType::Closing, id, data),
                }
            }
            other => CTag::new(other, id, data),
        };
        let key = store.tags_mut(&self.side)?.register(tag.into())?;
        self.insert_marker(offset, key);
        Ok(key)
    }

    /// Check a range against the pairing rule and return the keys of the markers inside it.
    fn checked_range(&self, store: &Store, start: usize, end: usize) -> Result<Vec<TagKey>, FragmentError> {
        let invalid = |reason: String| FragmentError::InvalidRange { start, end, reason };
        let len = self.len();
        if start > end || end > len {
            return Err(invalid(format!("out of bounds for a coded text of {} chars", len)));
        }
        if self.is_inside_marker(start) || self.is_inside_marker(end) {
            return Err(invalid("a bound falls inside a marker".to_string()));
        }
        let located = locate(&self.coded, self.tags(store))?;
        let resolution = resolve(&located);
        let inside = |pos: usize| pos >= start && pos < end;
        let mut keys = Vec::new();
        for (i, l) in located.iter().enumerate() {
            if !inside(l.position) {
                continue;
            }
            if let Some(partner) = resolution.partner(i) {
                if !inside(located[partner].position) {
                    return Err(invalid(format!(
                        "splits the span of tag id '{}' (marker at position {})",
                        l.marker.id, l.position
                    )));
                }
            }
            keys.push(l.key);
        }
        Ok(keys)
    }

    fn remove_chars(&mut self, start: usize, end: usize) -> String {
        let (from, to) = (self.byte_at(start), self.byte_at(end));
        let removed = self.coded[from..to].to_string();
        self.coded.replace_range(from..to, "");
        removed
    }

    /// Delete the coded-text range `[start, end)`.
    ///
    /// Fails with `InvalidRange` when exactly one half of a pair lies in the
    /// range. Every tag referenced in the range is released, including the
    /// tags hidden in protected content.
    pub fn delete(&mut self, store: &mut Store, start: usize, end: usize) -> Result<(), FragmentError> {
        self.checked_range(store, start, end)?;
        let removed = self.remove_chars(start, end);
        let released = release_in(store.tags_mut(&self.side)?, &removed)?;
        debug!("Deleted [{}, {}) releasing {} tag(s)", start, end, released);
        Ok(())
    }

    /// Remove all content and release its tags.
    pub fn clear(&mut self, store: &mut Store) -> Result<(), FragmentError> {
        let removed = std::mem::take(&mut self.coded);
        if removed.chars().any(is_marker_unit) {
            release_in(store.tags_mut(&self.side)?, &removed)?;
        }
        Ok(())
    }

    /// Annotate `[start, end)`; `end == None` means the end of the coded text.
    ///
    /// The opening marker is inserted at `start` and the closing marker at
    /// `end`. When the new span crosses another span, the annotation gets
    /// `can_overlap = false` and the span that rendering splits gets
    /// `isolated = true`.
    pub fn annotate(
        &mut self,
        store: &mut Store,
        start: usize,
        end: Option<usize>,
        kind: AnnotationKind,
        metadata: Option<Metadata>,
    ) -> Result<TagKey, FragmentError> {
        let end = end.unwrap_or_else(|| self.len());
        self.check_annotation_range(start, end)?;
        if let Some(item) = &metadata {
            item.validate(&kind)?;
        }
        let id = store.suggest_id(false);
        let mut opening = MTag::opening(&id, kind);
        if let Some(item) = metadata {
            opening.add_metadata(item)?;
        }
        self.annotate_with(store, start, Some(end), opening)
    }

    fn check_annotation_range(&self, start: usize, end: usize) -> Result<(), FragmentError> {
        if start > end {
            return Err(FragmentError::InvalidPosition {
                position: start,
                reason: format!("start is after the end ({})", end),
            });
        }
        self.check_position(start)?;
        self.check_position(end)
    }

    /// Annotate with a prepared opening tag (its closing is derived from it).
    pub fn annotate_with(
        &mut self,
        store: &mut Store,
        start: usize,
        end: Option<usize>,
        opening: MTag,
    ) -> Result<TagKey, FragmentError> {
        let end = end.unwrap_or_else(|| self.len());
        self.check_annotation_range(start, end)?;
        let closing = MTag::closing_for(&opening);
        let (open_key, close_key) = {
            let tags = store.tags_mut(&self.side)?;
            (tags.register(opening.into())?, tags.register(closing.into())?)
        };
        self.insert_marker(end, close_key);
        self.insert_marker(start, open_key);
        self.mark_crossings(store, open_key, close_key)?;
        Ok(open_key)
    }

    /// Flag a new annotation and the spans it crosses.
    fn mark_crossings(&self, store: &mut Store, open_key: TagKey, close_key: TagKey) -> Result<(), FragmentError> {
        let (crossing, split_keys) = {
            let located = locate(&self.coded, self.tags(store))?;
            let resolution = resolve(&located);
            let index_of = |key: TagKey| located.iter().position(|l| l.key == key);
            let (Some(a_open), Some(a_close)) = (index_of(open_key), index_of(close_key)) else {
                return Ok(());
            };
            let mut crossing = false;
            let mut split_keys = Vec::new();
            for conflict in resolution.conflicts() {
                if conflict.closer == a_close || conflict.split == a_open {
                    crossing = true;
                    split_keys.push(located[conflict.split].key);
                    if let Some(p) = resolution.partner(conflict.split) {
                        split_keys.push(located[p].key);
                    }
                }
            }
            (crossing, split_keys)
        };
        if !crossing {
            return Ok(());
        }
        let tags = store.tags_mut(&self.side)?;
        for key in [open_key, close_key] {
            tags.get_mut(key)?.set_can_overlap(false);
        }
        for key in &split_keys {
            tags.get_mut(*key)?.set_isolated(true);
        }
        debug!(
            "Annotation {} crosses another span, {} marker(s) isolated",
            open_key,
            split_keys.len()
        );
        Ok(())
    }

    /// Reuse an annotation enclosing exactly `[start, end)` or create a new one.
    ///
    /// An existing annotation qualifies when its opening marker sits at or
    /// just before `start`, its closing marker at or just before `end`, and
    /// its kind matches `matching_kind` (any kind when `None`).
    pub fn get_or_create_annotation(
        &mut self,
        store: &mut Store,
        start: usize,
        end: Option<usize>,
        matching_kind: Option<&AnnotationKind>,
        kind_for_new: AnnotationKind,
    ) -> Result<TagKey, FragmentError> {
        let end_pos = end.unwrap_or_else(|| self.len());
        self.check_annotation_range(start, end_pos)?;
        let found = {
            let tags = self.tags(store);
            let located = locate(&self.coded, tags)?;
            let resolution = resolve(&located);
            let is_opening = |l: &&Located<'_>| l.key.class == MarkerClass::AnnotationOpening;
            let opener = located
                .iter()
                .enumerate()
                .find(|(_, l)| is_opening(l) && l.position + MARKER_WIDTH == start)
                .or_else(|| located.iter().enumerate().find(|(_, l)| is_opening(l) && l.position == start));
            opener.and_then(|(i, l)| {
                let partner = located[resolution.partner(i)?].position;
                if end_pos != partner && end_pos != partner + MARKER_WIDTH {
                    return None;
                }
                let annotation = tags?.annotation(l.key).ok()?;
                matching_kind
                    .is_none_or(|kind| annotation.kind == *kind)
                    .then_some(l.key)
            })
        };
        match found {
            Some(key) => Ok(key),
            None => self.annotate(store, start, end, kind_for_new, None),
        }
    }

    /// Remove one marker and release its tag (also searched inside protected content).
    pub fn remove_tag(&mut self, store: &mut Store, key: TagKey) -> Result<(), FragmentError> {
        let marker = key.to_ref();
        if let Some(at) = self.coded.find(&marker) {
            let removed: String = self.coded.drain(at..at + marker.len()).collect();
            release_in(store.tags_mut(&self.side)?, &removed)?;
            return Ok(());
        }
        let holders: Vec<TagKey> = scan_markers(&self.coded)
            .into_iter()
            .filter_map(Result::ok)
            .map(|m| m.key)
            .filter(|k| k.class == MarkerClass::ProtectedContent)
            .collect();
        let tags = store.tags_mut(&self.side)?;
        for holder in holders {
            let content = tags.protected_mut(holder)?;
            if let Some(at) = content.coded_text.find(&marker) {
                content.coded_text.replace_range(at..at + marker.len(), "");
                tags.release(key)?;
                return Ok(());
            }
        }
        Err(FragmentError::UnknownTagReference { key, position: None })
    }

    fn remove_markers_at(&mut self, store: &mut Store, mut positions: Vec<usize>) -> Result<usize, FragmentError> {
        positions.sort_unstable();
        let mut removed = String::new();
        for pos in positions.into_iter().rev() {
            removed.push_str(&self.remove_chars(pos, pos + MARKER_WIDTH));
        }
        release_in(store.tags_mut(&self.side)?, &removed)
    }

    /// Remove both markers of the annotation with this id. Returns false if absent.
    pub fn remove_annotation(&mut self, store: &mut Store, id: &str) -> Result<bool, FragmentError> {
        let positions = {
            let located = locate(&self.coded, self.tags(store))?;
            let resolution = resolve(&located);
            let Some(i) = located.iter().position(|l| {
                l.marker.family == SpanFamily::Annotation
                    && l.marker.tag_type == TagType::Opening
                    && l.marker.id == id
            }) else {
                return Ok(false);
            };
            let mut positions = vec![located[i].position];
            if let Some(p) = resolution.partner(i) {
                positions.push(located[p].position);
            }
            positions
        };
        self.remove_markers_at(store, positions)?;
        Ok(true)
    }

    /// Remove every annotation marker, or only those of one kind.
    pub fn remove_annotations(
        &mut self,
        store: &mut Store,
        kind: Option<&AnnotationKind>,
    ) -> Result<usize, FragmentError> {
        let positions = {
            let tags = self.tags(store);
            let located = locate(&self.coded, tags)?;
            let mut positions = Vec::new();
            for l in located.iter().filter(|l| l.marker.family == SpanFamily::Annotation) {
                let annotation = tags
                    .ok_or(FragmentError::UnknownTagReference { key: l.key, position: Some(l.position) })?
                    .annotation(l.key)?;
                if kind.is_none_or(|k| annotation.kind == *k) {
                    positions.push(l.position);
                }
            }
            positions
        };
        if positions.is_empty() {
            return Ok(0);
        }
        let count = positions.len();
        self.remove_markers_at(store, positions)?;
        Ok(count)
    }

    /// Hide `[start, end)` behind a protected content marker. Same pairing rule as `delete`.
    pub fn protect(&mut self, store: &mut Store, start: usize, end: usize) -> Result<TagKey, FragmentError> {
        self.checked_range(store, start, end)?;
        let (from, to) = (self.byte_at(start), self.byte_at(end));
        let hidden = self.coded[from..to].to_string();
        let key = store
            .tags_mut(&self.side)?
            .register_protected(ProtectedContent { coded_text: hidden })?;
        self.coded.replace_range(from..to, &key.to_ref());
        Ok(key)
    }

    /// Put all protected content back in place. Returns the number of records restored.
    pub fn show_protected_content(&mut self, store: &mut Store) -> Result<usize, FragmentError> {
        let mut restored = 0;
        while let Some(at) = self.coded.find(PCONT_STANDALONE) {
            let marker_end = self.coded[at..]
                .char_indices()
                .nth(MARKER_WIDTH)
                .map(|(b, _)| at + b)
                .unwrap_or(self.coded.len());
            let mut chars = self.coded[at..marker_end].chars();
            let key = match (chars.next(), chars.next()) {
                (Some(c), Some(k)) => TagKey::from_chars(c, k),
                _ => None,
            }
            .ok_or_else(|| corrupted(self.coded[..at].chars().count()))?;
            let content = store.tags_mut(&self.side)?.release_protected(key)?;
            self.coded.replace_range(at..marker_end, &content.coded_text);
            restored += 1;
        }
        Ok(restored)
    }

    fn snapshot(&self, store: &Store) -> Result<Vec<Piece>, FragmentError> {
        snapshot_text(&self.coded, self.tags(store))
    }

    /// Independent copy whose tags are deep-copied into `dest` for `side`.
    pub fn clone_into(&self, src: &Store, dest: &mut Store, side: Side) -> Result<Fragment, FragmentError> {
        let pieces = self.snapshot(src)?;
        let coded = materialize(pieces, dest.tags_mut(&side)?)?;
        Ok(Fragment {
            coded,
            side,
            dir: self.dir,
        })
    }

    /// Independent copy on another side of the same store.
    pub fn clone_to_side(&self, store: &mut Store, side: Side) -> Result<Fragment, FragmentError> {
        let pieces = self.snapshot(store)?;
        let coded = materialize(pieces, store.tags_mut(&side)?)?;
        Ok(Fragment {
            coded,
            side,
            dir: self.dir,
        })
    }

    /// Same literal text and structurally equal tags, each read through its own store.
    pub fn content_eq(&self, store: &Store, other: &Fragment, other_store: &Store) -> Result<bool, FragmentError> {
        Ok(self.snapshot(store)? == other.snapshot(other_store)?)
    }

    /// Text runs, tags and protected records in coded-text order.
    pub fn contents<'a>(&'a self, store: &'a Store) -> Result<Vec<Content<'a>>, FragmentError> {
        let tags = self.tags(store);
        let mut items = Vec::new();
        let mut run_start = 0;
        let mut chars = self.coded.char_indices().enumerate();
        while let Some((pos, (byte, c))) = chars.next() {
            if !is_marker_unit(c) {
                continue;
            }
            if byte > run_start {
                items.push(Content::Text(&self.coded[run_start..byte]));
            }
            let (key_byte, key_char) = chars.next().map(|(_, k)| k).ok_or_else(|| corrupted(pos))?;
            let key = TagKey::from_chars(c, key_char).ok_or_else(|| corrupted(pos))?;
            run_start = key_byte + key_char.len_utf8();
            let tags = tags.ok_or(FragmentError::UnknownTagReference { key, position: Some(pos) })?;
            if key.class == MarkerClass::ProtectedContent {
                items.push(Content::Protected(key, tags.protected(key).map_err(|e| e.at_position(pos))?));
            } else {
                items.push(Content::Tag(key, tags.get(key).map_err(|e| e.at_position(pos))?));
            }
        }
        if run_start < self.coded.len() {
            items.push(Content::Text(&self.coded[run_start..]));
        }
        Ok(items)
    }

    /// Tags referenced by visible markers, in coded-text order
    pub fn own_tags<'s>(&self, store: &'s Store) -> Result<Vec<(TagKey, &'s Tag)>, FragmentError> {
        let tags = self.tags(store);
        let mut found = Vec::new();
        for l in locate(&self.coded, tags)? {
            if l.key.class == MarkerClass::ProtectedContent {
                continue;
            }
            if let Some(tags) = tags {
                found.push((l.key, tags.get(l.key)?));
            }
        }
        Ok(found)
    }

    /// Map a position in `text()` to a position in the coded text.
    ///
    /// With `left_of_tag`, a plain position that borders markers maps to the
    /// position before them; otherwise to the position after them.
    pub fn coded_position(&self, plain_pos: usize, left_of_tag: bool) -> usize {
        let mut plain = 0;
        let mut chars = self.coded.chars().enumerate();
        while let Some((ct, c)) = chars.next() {
            if is_marker_unit(c) {
                if plain == plain_pos && left_of_tag {
                    return ct;
                }
                chars.next();
                continue;
            }
            if plain == plain_pos {
                return ct;
            }
            plain += 1;
        }
        self.len()
    }

    /// Debug form with markers shown as `{oc:1}`, `{cc:1}`, `{ph:2}`, `{om:3}`...
    pub fn display_with_ids(&self, store: &Store) -> Result<String, FragmentError> {
        let tags = self.tags(store);
        let mut out = String::new();
        let mut chars = self.coded.chars().enumerate();
        while let Some((pos, c)) = chars.next() {
            if !is_marker_unit(c) {
                out.push(c);
                continue;
            }
            let key = chars
                .next()
                .and_then(|(_, k)| TagKey::from_chars(c, k))
                .ok_or_else(|| corrupted(pos))?;
            if key.class == MarkerClass::ProtectedContent {
                out.push_str("{pc}");
                continue;
            }
            let tag = tags
                .ok_or(FragmentError::UnknownTagReference { key, position: Some(pos) })?
                .get(key)
                .map_err(|e| e.at_position(pos))?;
            out.push_str(&format!("{{{}:{}}}", key.class.short_name(), tag.id()));
        }
        Ok(out)
    }
}

/// A fragment paired with the store of its unit, so calls do not repeat the store.
pub struct FragmentEditor<'a> {
    fragment: &'a mut Fragment,
    store: &'a mut Store,
}

impl<'a> FragmentEditor<'a> {
    pub fn new(fragment: &'a mut Fragment, store: &'a mut Store) -> Self {
        Self { fragment, store }
    }

    pub fn fragment(&self) -> &Fragment {
        self.fragment
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    pub fn append(&mut self, text: &str) -> &mut Self {
        self.fragment.append(text);
        self
    }

    pub fn open_code<'d>(&mut self, id: &str, data: impl Into<Option<&'d str>>) -> Result<TagKey, FragmentError> {
        self.fragment.open_code(self.store, id, data)
    }

    pub fn close_code<'d>(&mut self, id: &str, data: impl Into<Option<&'d str>>) -> Result<TagKey, FragmentError> {
        self.fragment.close_code(self.store, id, data)
    }

    pub fn append_standalone_code<'d>(
        &mut self,
        id: &str,
        data: impl Into<Option<&'d str>>,
    ) -> Result<TagKey, FragmentError> {
        self.fragment.append_standalone_code(self.store, id, data)
    }

    pub fn annotate(
        &mut self,
        start: usize,
        end: Option<usize>,
        kind: AnnotationKind,
        metadata: Option<Metadata>,
    ) -> Result<TagKey, FragmentError> {
        self.fragment.annotate(self.store, start, end, kind, metadata)
    }

    pub fn annotate_with(&mut self, start: usize, end: Option<usize>, opening: MTag) -> Result<TagKey, FragmentError> {
        self.fragment.annotate_with(self.store, start, end, opening)
    }

    pub fn append_tag(&mut self, tag: Tag) -> Result<TagKey, FragmentError> {
        self.fragment.append_tag(self.store, tag)
    }

    pub fn delete(&mut self, start: usize, end: usize) -> Result<(), FragmentError> {
        self.fragment.delete(self.store, start, end)
    }

    pub fn protect(&mut self, start: usize, end: usize) -> Result<TagKey, FragmentError> {
        self.fragment.protect(self.store, start, end)
    }

    /// Mutable access to a tag of this fragment's side
    pub fn tag_mut(&mut self, key: TagKey) -> Result<&mut Tag, FragmentError> {
        self.store.get_mut(self.fragment.side(), key)
    }
}
