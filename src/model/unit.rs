/*!
 * Units: an ordered sequence of parts sharing one tag store.
 *
 * The unit owns the store, so every id used by its parts, notes and tags is
 * checked against one place. Lookups by id go through hash indexes.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::errors::FragmentError;
use crate::model::fragment::{Content, Fragment, FragmentEditor};
use crate::model::markers::{MARKER_WIDTH, TagKey};
use crate::model::metadata::{AnnotationKind, Metadata};
use crate::model::part::{GetTarget, Part};
use crate::model::store::{Side, Store};
use crate::model::tag::{CTag, Tag, TagType};

/// A note attached to a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Anything of a unit that can be addressed by id
#[derive(Debug, Clone, PartialEq)]
pub enum UnitObject<'a> {
    Part(&'a Part),
    Tag { side: Side, key: TagKey, tag: &'a Tag },
    Note(&'a Note),
}

/// An annotation followed across the parts of a unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedSpan {
    pub id: String,
    pub kind: AnnotationKind,
    /// Index of the part holding the opening marker
    pub start_part: usize,
    pub end_part: usize,
    /// Coded-text position of the opening marker in its part
    pub start: usize,
    /// Coded-text position right after the closing marker in its part
    pub end: usize,
    /// Plain text covered by the annotation
    pub text: String,
}

#[derive(Debug)]
pub struct Unit {
    id: String,
    store: Store,
    parts: Vec<Part>,
    notes: Vec<Note>,
    pub source_locale: String,
    pub target_locale: Option<String>,
    part_index: HashMap<String, usize>,
    note_index: HashMap<String, usize>,
}

fn no_part(index: usize) -> FragmentError {
    FragmentError::InvalidPosition {
        position: index,
        reason: "no part at this index".to_string(),
    }
}

impl Unit {
    pub fn new(id: &str, source_locale: &str) -> Self {
        Self {
            id: id.to_string(),
            store: Store::new(),
            parts: Vec::new(),
            notes: Vec::new(),
            source_locale: source_locale.to_string(),
            target_locale: None,
            part_index: HashMap::new(),
            note_index: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn part_mut(&mut self, index: usize) -> Option<&mut Part> {
        self.parts.get_mut(index)
    }

    /// A part together with the store, for mutations that need both
    pub fn part_with_store(&mut self, index: usize) -> Option<(&mut Part, &mut Store)> {
        self.parts.get_mut(index).map(|p| (p, &mut self.store))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| p.is_segment())
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn append_segment(&mut self) -> &mut Part {
        self.push_part(Part::segment())
    }

    pub fn append_ignorable(&mut self) -> &mut Part {
        self.push_part(Part::ignorable())
    }

    /// Append a part built elsewhere; its tags must already be in this unit's store.
    pub fn push_part(&mut self, part: Part) -> &mut Part {
        if let Some(id) = part.id() {
            self.part_index.insert(id.to_string(), self.parts.len());
        }
        let index = self.parts.len();
        self.parts.push(part);
        &mut self.parts[index]
    }

    /// Give a part an id unused anywhere in the unit (or remove its id).
    pub fn set_part_id(&mut self, index: usize, id: Option<&str>) -> Result<(), FragmentError> {
        let part = self.parts.get(index).ok_or_else(|| no_part(index))?;
        if let Some(new_id) = id {
            if part.id() != Some(new_id) && self.store.is_id_used(new_id) {
                return Err(FragmentError::invalid_attribute("id", new_id));
            }
        }
        if let Some(old) = part.id().map(str::to_string) {
            self.store.release_id(&old);
            self.part_index.remove(&old);
        }
        if let Some(new_id) = id {
            self.store.reserve_id(new_id);
            self.part_index.insert(new_id.to_string(), index);
        }
        self.parts[index].set_id(id.map(str::to_string));
        Ok(())
    }

    /// Editor for one fragment of a part; a missing target is created empty.
    pub fn editor(&mut self, index: usize, side: &Side) -> Result<FragmentEditor<'_>, FragmentError> {
        let part = self.parts.get_mut(index).ok_or_else(|| no_part(index))?;
        let fragment = match side {
            Side::Source => part.source_mut(),
            Side::Target(locale) => part.get_or_create_target(&mut self.store, locale, GetTarget::CreateEmpty)?,
        };
        Ok(FragmentEditor::new(fragment, &mut self.store))
    }

    /// Add a note; an id is required to reference it from an annotation.
    pub fn add_note(&mut self, note: Note) -> Result<usize, FragmentError> {
        if let Some(id) = &note.id {
            if self.store.is_id_used(id) {
                return Err(FragmentError::invalid_attribute("id", id));
            }
            self.store.reserve_id(id);
            self.note_index.insert(id.clone(), self.notes.len());
        }
        self.notes.push(note);
        Ok(self.notes.len() - 1)
    }

    /// Part, note or tag with this id. Parts first, then notes, then source and target tags.
    pub fn object_from_id(&self, id: &str) -> Option<UnitObject<'_>> {
        if let Some(&i) = self.part_index.get(id) {
            return self.parts.get(i).map(UnitObject::Part);
        }
        if let Some(&i) = self.note_index.get(id) {
            return self.notes.get(i).map(UnitObject::Note);
        }
        self.tag_from_id(&Side::Source, id).or_else(|| {
            self.store
                .target_locales()
                .find_map(|locale| self.tag_from_id(&Side::target(locale), id))
        })
    }

    fn tag_from_id(&self, side: &Side, id: &str) -> Option<UnitObject<'_>> {
        let tags = self.store.tags(side)?;
        let key = *tags.keys_for_id(id).first()?;
        let tag = tags.get(key).ok()?;
        Some(UnitObject::Tag {
            side: side.clone(),
            key,
            tag,
        })
    }

    /// Resolve a fragment identifier: `#id` (part or source tag), `#t=id` (target tag), `#n=id` (note).
    pub fn resolve_reference(&self, reference: &str) -> Option<UnitObject<'_>> {
        let reference = reference.strip_prefix('#')?;
        if let Some(id) = reference.strip_prefix("n=") {
            return self.note_index.get(id).and_then(|&i| self.notes.get(i)).map(UnitObject::Note);
        }
        if let Some(id) = reference.strip_prefix("t=") {
            return match &self.target_locale {
                Some(locale) => self.tag_from_id(&Side::target(locale), id),
                None => self
                    .store
                    .target_locales()
                    .find_map(|locale| self.tag_from_id(&Side::target(locale), id)),
            };
        }
        if let Some(&i) = self.part_index.get(reference) {
            return self.parts.get(i).map(UnitObject::Part);
        }
        self.tag_from_id(&Side::Source, reference)
    }

    /// Create a note and a comment annotation on `[start, end)` pointing to it.
    ///
    /// Returns the key of the annotation opening and the note id.
    pub fn annotate_with_note(
        &mut self,
        index: usize,
        side: &Side,
        start: usize,
        end: Option<usize>,
        text: &str,
    ) -> Result<(TagKey, String), FragmentError> {
        if index >= self.parts.len() {
            return Err(no_part(index));
        }
        let note_id = format!("n{}", Uuid::new_v4().simple());
        let metadata = Metadata::Comment {
            text: None,
            note_ref: Some(format!("#n={}", note_id)),
        };
        let key = self
            .editor(index, side)?
            .annotate(start, end, AnnotationKind::Comment, Some(metadata))?;
        self.add_note(Note {
            id: Some(note_id.clone()),
            text: text.to_string(),
            category: None,
        })?;
        debug!("Attached note {} to part {} of unit {}", note_id, index, self.id);
        Ok((key, note_id))
    }

    fn side_fragments<'a>(&'a self, side: &'a Side) -> impl Iterator<Item = (usize, &'a Fragment)> + 'a {
        self.parts
            .iter()
            .enumerate()
            .filter_map(move |(i, p)| p.fragment(side).map(|f| (i, f)))
    }

    /// Annotations of one side in document order, possibly spanning parts.
    pub fn annotated_spans(
        &self,
        side: &Side,
        kind: Option<&AnnotationKind>,
    ) -> Result<Vec<AnnotatedSpan>, FragmentError> {
        let mut open: Vec<AnnotatedSpan> = Vec::new();
        let mut done = Vec::new();
        for (index, fragment) in self.side_fragments(side) {
            let mut pos = 0;
            for item in fragment.contents(&self.store)? {
                match item {
                    Content::Text(text) => {
                        for span in &mut open {
                            span.text.push_str(text);
                        }
                        pos += text.chars().count();
                        continue;
                    }
                    Content::Protected(..) => {}
                    Content::Tag(_, Tag::Annotation(marker)) => match marker.tag_type() {
                        TagType::Closing => {
                            if let Some(i) = open.iter().rposition(|s| s.id == marker.id()) {
                                let mut span = open.remove(i);
                                span.end_part = index;
                                span.end = pos + MARKER_WIDTH;
                                done.push(span);
                            }
                        }
                        _ => {
                            if kind.is_none_or(|k| marker.kind == *k) {
                                open.push(AnnotatedSpan {
                                    id: marker.id().to_string(),
                                    kind: marker.kind.clone(),
                                    start_part: index,
                                    end_part: index,
                                    start: pos,
                                    end: pos,
                                    text: String::new(),
                                });
                            }
                        }
                    },
                    Content::Tag(..) => {}
                }
                pos += MARKER_WIDTH;
            }
        }
        if !open.is_empty() {
            debug!("{} annotation(s) of unit {} are never closed", open.len(), self.id);
        }
        done.sort_by_key(|s| (s.start_part, s.start));
        Ok(done)
    }

    /// Codes of one side across all parts, in document order, with their part index.
    pub fn ordered_codes(&self, side: &Side) -> Result<Vec<(usize, TagKey, &CTag)>, FragmentError> {
        let mut codes = Vec::new();
        for (index, fragment) in self.side_fragments(side) {
            for (key, tag) in fragment.own_tags(&self.store)? {
                if let Tag::Code(code) = tag {
                    codes.push((index, key, code));
                }
            }
        }
        Ok(codes)
    }

    /// Text of one side with every marker removed, parts concatenated.
    pub fn plain_text(&self, side: &Side) -> String {
        self.side_fragments(side).map(|(_, f)| f.text()).collect()
    }

    /// Hide every `translate = no` annotation span of one side behind protected content.
    ///
    /// Spans that cannot be hidden without splitting a pair are left visible.
    pub fn hide_untranslatable(&mut self, side: &Side) -> Result<usize, FragmentError> {
        let mut hidden = 0;
        for index in 0..self.parts.len() {
            let mut skipped: HashSet<String> = HashSet::new();
            loop {
                let Some(fragment) = self.parts[index].fragment(side) else {
                    break;
                };
                let Some((id, start, end)) = untranslatable_span(fragment, &self.store, &skipped)? else {
                    break;
                };
                let Some(fragment) = self.parts[index].fragment_mut(side) else {
                    break;
                };
                match fragment.protect(&mut self.store, start, end) {
                    Ok(_) => hidden += 1,
                    Err(FragmentError::InvalidRange { reason, .. }) => {
                        warn!("Cannot hide untranslatable span '{}': {}", id, reason);
                        skipped.insert(id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(hidden)
    }

    /// Restore protected content in every fragment of every part.
    pub fn show_protected_content(&mut self) -> Result<usize, FragmentError> {
        let mut restored = 0;
        for part in &mut self.parts {
            restored += part.source_mut().show_protected_content(&mut self.store)?;
            let locales: Vec<String> = part.target_locales().map(str::to_string).collect();
            for locale in locales {
                if let Some(target) = part.target_mut(&locale) {
                    restored += target.show_protected_content(&mut self.store)?;
                }
            }
        }
        Ok(restored)
    }

    /// Fail when a closing code comes before its opening code across the parts of a side.
    pub fn verify_openings_before_closings(&self, side: &Side) -> Result<(), FragmentError> {
        let Some(tags) = self.store.tags(side) else {
            return Ok(());
        };
        let mut opened: HashSet<&str> = HashSet::new();
        for (_, fragment) in self.side_fragments(side) {
            let mut pos = 0;
            for item in fragment.contents(&self.store)? {
                match item {
                    Content::Text(text) => {
                        pos += text.chars().count();
                        continue;
                    }
                    Content::Tag(_, Tag::Code(code)) => match code.tag_type() {
                        TagType::Opening => {
                            opened.insert(code.id());
                        }
                        TagType::Closing if !opened.contains(code.id()) && tags.opening_key(code.id()).is_some() => {
                            return Err(FragmentError::UnmatchedCloseTag {
                                id: code.id().to_string(),
                                position: pos,
                            });
                        }
                        _ => {}
                    },
                    _ => {}
                }
                pos += MARKER_WIDTH;
            }
        }
        Ok(())
    }

    /// Every segment whose source has text also has a non-empty target for `locale`.
    pub fn non_empty_sources_have_targets(&self, locale: &str) -> bool {
        self.segments()
            .filter(|p| p.source().has_text())
            .all(|p| p.target(locale).is_some_and(|t| !t.is_empty()))
    }

    /// Remove every annotation of every part and side.
    pub fn remove_annotations(&mut self) -> Result<usize, FragmentError> {
        let mut count = 0;
        for part in &mut self.parts {
            count += part.remove_annotations(&mut self.store, None, None)?;
        }
        Ok(count)
    }
}

/// First `translate = no` annotation of a fragment, as (id, start, end) covering both markers
fn untranslatable_span(
    fragment: &Fragment,
    store: &Store,
    skipped: &HashSet<String>,
) -> Result<Option<(String, usize, usize)>, FragmentError> {
    let mut pos = 0;
    let mut open: Vec<(&str, usize)> = Vec::new();
    for item in fragment.contents(store)? {
        match item {
            Content::Text(text) => {
                pos += text.chars().count();
                continue;
            }
            Content::Tag(_, Tag::Annotation(marker)) => match marker.tag_type() {
                TagType::Closing => {
                    if let Some(i) = open.iter().rposition(|(id, _)| *id == marker.id()) {
                        let (id, start) = open.remove(i);
                        return Ok(Some((id.to_string(), start, pos + MARKER_WIDTH)));
                    }
                }
                _ => {
                    if marker.translate == Some(false) && !skipped.contains(marker.id()) {
                        open.push((marker.id(), pos));
                    }
                }
            },
            _ => {}
        }
        pos += MARKER_WIDTH;
    }
    Ok(None)
}
