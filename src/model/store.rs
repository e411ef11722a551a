/*!
 * Tag tables and the per-unit store that owns them.
 *
 * A `Tags` table is an arena: one slot vector per marker class, a key is the
 * class plus the slot index, and released slots are never handed out again.
 * An id index keeps lookups by id O(1) on average.
 */

use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::errors::FragmentError;
use crate::language_utils;
use crate::model::markers::{MarkerClass, TAGREF_MAX, TagKey};
use crate::model::tag::{CTag, Directionality, MTag, ProtectedContent, Tag, TagType};

/// Which side of a unit a fragment belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Source,
    /// Target for one locale
    Target(String),
}

impl Side {
    pub fn target(locale: &str) -> Self {
        Self::Target(locale.to_string())
    }

    pub fn is_target(&self) -> bool {
        matches!(self, Self::Target(_))
    }

    pub fn locale(&self) -> Option<&str> {
        match self {
            Self::Source => None,
            Self::Target(locale) => Some(locale),
        }
    }
}

const TAG_CLASSES: usize = 5;

/// Tag table for one side of a unit.
#[derive(Debug, Clone, Default)]
pub struct Tags {
    slots: [Vec<Option<Tag>>; TAG_CLASSES],
    protected: Vec<Option<ProtectedContent>>,
    by_id: HashMap<String, Vec<TagKey>>,
    /// Registration order of tag keys, released ones included
    order: Vec<TagKey>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_index(len: usize, class: MarkerClass) -> Result<usize, FragmentError> {
        if len > TAGREF_MAX {
            return Err(FragmentError::KeySpaceExhausted { class });
        }
        Ok(len)
    }

    /// Add a tag and return its new key.
    pub fn register(&mut self, tag: Tag) -> Result<TagKey, FragmentError> {
        let class = tag.marker_class();
        let slots = &mut self.slots[class.ordinal()];
        let index = Self::next_index(slots.len(), class)?;
        let key = TagKey::new(class, index);
        self.by_id.entry(tag.id().to_string()).or_default().push(key);
        slots.push(Some(tag));
        self.order.push(key);
        Ok(key)
    }

    /// Add a protected content record
    pub fn register_protected(&mut self, content: ProtectedContent) -> Result<TagKey, FragmentError> {
        let index = Self::next_index(self.protected.len(), MarkerClass::ProtectedContent)?;
        self.protected.push(Some(content));
        Ok(TagKey::new(MarkerClass::ProtectedContent, index))
    }

    fn unknown(key: TagKey) -> FragmentError {
        FragmentError::UnknownTagReference { key, position: None }
    }

    pub fn get(&self, key: TagKey) -> Result<&Tag, FragmentError> {
        if key.class == MarkerClass::ProtectedContent {
            return Err(Self::unknown(key));
        }
        self.slots[key.class.ordinal()]
            .get(key.index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Self::unknown(key))
    }

    pub fn get_mut(&mut self, key: TagKey) -> Result<&mut Tag, FragmentError> {
        if key.class == MarkerClass::ProtectedContent {
            return Err(Self::unknown(key));
        }
        self.slots[key.class.ordinal()]
            .get_mut(key.index)
            .and_then(Option::as_mut)
            .ok_or_else(|| Self::unknown(key))
    }

    pub fn code(&self, key: TagKey) -> Result<&CTag, FragmentError> {
        self.get(key)?.as_code().ok_or_else(|| Self::unknown(key))
    }

    pub fn annotation(&self, key: TagKey) -> Result<&MTag, FragmentError> {
        self.get(key)?.as_annotation().ok_or_else(|| Self::unknown(key))
    }

    pub fn protected(&self, key: TagKey) -> Result<&ProtectedContent, FragmentError> {
        if key.class != MarkerClass::ProtectedContent {
            return Err(Self::unknown(key));
        }
        self.protected
            .get(key.index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Self::unknown(key))
    }

    pub fn protected_mut(&mut self, key: TagKey) -> Result<&mut ProtectedContent, FragmentError> {
        if key.class != MarkerClass::ProtectedContent {
            return Err(Self::unknown(key));
        }
        self.protected
            .get_mut(key.index)
            .and_then(Option::as_mut)
            .ok_or_else(|| Self::unknown(key))
    }

    pub fn contains(&self, key: TagKey) -> bool {
        match key.class {
            MarkerClass::ProtectedContent => self.protected(key).is_ok(),
            _ => self.get(key).is_ok(),
        }
    }

    /// Remove a tag; its key stays retired.
    pub fn release(&mut self, key: TagKey) -> Result<Tag, FragmentError> {
        if key.class == MarkerClass::ProtectedContent {
            return Err(Self::unknown(key));
        }
        let tag = self.slots[key.class.ordinal()]
            .get_mut(key.index)
            .and_then(Option::take)
            .ok_or_else(|| Self::unknown(key))?;
        if let Some(keys) = self.by_id.get_mut(tag.id()) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_id.remove(tag.id());
            }
        }
        Ok(tag)
    }

    /// Remove a protected content record and return it
    pub fn release_protected(&mut self, key: TagKey) -> Result<ProtectedContent, FragmentError> {
        if key.class != MarkerClass::ProtectedContent {
            return Err(Self::unknown(key));
        }
        self.protected
            .get_mut(key.index)
            .and_then(Option::take)
            .ok_or_else(|| Self::unknown(key))
    }

    /// Keys of the live tags with this id
    pub fn keys_for_id(&self, id: &str) -> &[TagKey] {
        self.by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First live tag with this id and tag type, codes before annotations.
    pub fn find(&self, id: &str, tag_type: TagType) -> Option<(TagKey, &Tag)> {
        let mut found: Option<(TagKey, &Tag)> = None;
        for key in self.keys_for_id(id) {
            let Ok(tag) = self.get(*key) else { continue };
            if tag.tag_type() != tag_type {
                continue;
            }
            match found {
                Some((_, t)) if t.is_code() => {}
                _ => found = Some((*key, tag)),
            }
        }
        found
    }

    fn find_in(&self, id: &str, class: MarkerClass) -> Option<TagKey> {
        self.keys_for_id(id).iter().copied().find(|k| k.class == class)
    }

    /// Key of the opening code with this id
    pub fn opening_key(&self, id: &str) -> Option<TagKey> {
        self.find_in(id, MarkerClass::CodeOpening)
    }

    /// Key of the closing code with this id
    pub fn closing_key(&self, id: &str) -> Option<TagKey> {
        self.find_in(id, MarkerClass::CodeClosing)
    }

    /// Key of the opening annotation with this id
    pub fn annotation_key(&self, id: &str) -> Option<TagKey> {
        self.find_in(id, MarkerClass::AnnotationOpening)
    }

    pub fn is_id_used(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Live tags in registration order
    pub fn iter(&self) -> impl Iterator<Item = (TagKey, &Tag)> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.get(*key).ok().map(|tag| (*key, tag)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().map(|s| s.iter().filter(|t| t.is_some()).count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_code_with_data(&self) -> bool {
        self.iter().any(|(_, tag)| tag.as_code().is_some_and(CTag::has_data))
    }

    /// Apply a change to every live half of the code span with this id.
    pub fn update_code_span(&mut self, id: &str, mut change: impl FnMut(&mut CTag)) -> usize {
        let keys: Vec<TagKey> = self.keys_for_id(id).to_vec();
        let mut count = 0;
        for key in keys {
            if let Ok(Tag::Code(code)) = self.get_mut(key) {
                if code.tag_type() != TagType::Standalone {
                    change(code);
                    count += 1;
                }
            }
        }
        count
    }

    /// Deep copy of one tag into another table
    pub fn copy_into(&self, key: TagKey, dest: &mut Tags) -> Result<TagKey, FragmentError> {
        match key.class {
            MarkerClass::ProtectedContent => dest.register_protected(self.protected(key)?.clone()),
            _ => dest.register(self.get(key)?.clone()),
        }
    }
}

/// Mapping from keys of one store to the keys of its copy
pub type KeyMap = HashMap<(Side, TagKey), TagKey>;

/// Original data shared by codes, mapped to the `d1`, `d2`... ids used by `dataRef`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRefMap {
    entries: Vec<DataRefEntry>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataRefEntry {
    pub id: String,
    pub data: String,
    pub dir: Directionality,
}

impl DataRefMap {
    fn map_key(data: &str, dir: Directionality) -> String {
        format!("{}{}", data, dir.prefix())
    }

    fn add(&mut self, data: &str, dir: Directionality) {
        let key = Self::map_key(data, dir);
        if self.index.contains_key(&key) {
            return;
        }
        let id = format!("d{}", self.entries.len() + 1);
        self.index.insert(key, self.entries.len());
        self.entries.push(DataRefEntry {
            id,
            data: data.to_string(),
            dir,
        });
    }

    /// `dataRef` id of a code's original data
    pub fn id_for(&self, code: &CTag) -> Option<&str> {
        let data = code.data.as_deref().filter(|d| !d.is_empty())?;
        self.index
            .get(&Self::map_key(data, code.data_dir))
            .map(|i| self.entries[*i].id.as_str())
    }

    /// Original data for a `dataRef` id
    pub fn resolve(&self, id: &str) -> Option<&DataRefEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[DataRefEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a map from externally supplied `id -> data` pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map = Self::default();
        for (id, data) in pairs {
            let key = Self::map_key(data, Directionality::Inherited);
            if map.index.contains_key(&key) {
                continue;
            }
            map.index.insert(key, map.entries.len());
            map.entries.push(DataRefEntry {
                id: id.to_string(),
                data: data.to_string(),
                dir: Directionality::Inherited,
            });
        }
        map
    }
}

/// All tags of one unit: the source table and one table per target locale.
#[derive(Debug, Clone, Default)]
pub struct Store {
    source: Tags,
    targets: BTreeMap<String, Tags>,
    pub source_dir: Directionality,
    pub target_dir: Directionality,
    reserved_ids: HashSet<String>,
    last_suggested: usize,
    last_segment_suggested: usize,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for a side, if it exists
    pub fn tags(&self, side: &Side) -> Option<&Tags> {
        match side {
            Side::Source => Some(&self.source),
            Side::Target(locale) => self.targets.get(locale),
        }
    }

    /// Table for a side, created on first use; target locales are validated then.
    pub fn tags_mut(&mut self, side: &Side) -> Result<&mut Tags, FragmentError> {
        match side {
            Side::Source => Ok(&mut self.source),
            Side::Target(locale) => {
                if !self.targets.contains_key(locale) {
                    language_utils::validate_locale(locale)
                        .map_err(|_| FragmentError::InvalidLocale(locale.clone()))?;
                    debug!("Creating tag table for target locale {}", locale);
                }
                Ok(self.targets.entry(locale.clone()).or_default())
            }
        }
    }

    pub fn source_tags(&self) -> &Tags {
        &self.source
    }

    pub fn target_locales(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Look up the tag behind a key of a side
    pub fn get(&self, side: &Side, key: TagKey) -> Result<&Tag, FragmentError> {
        self.tags(side)
            .ok_or(FragmentError::UnknownTagReference { key, position: None })?
            .get(key)
    }

    pub fn get_mut(&mut self, side: &Side, key: TagKey) -> Result<&mut Tag, FragmentError> {
        match side {
            Side::Source => self.source.get_mut(key),
            Side::Target(locale) => self
                .targets
                .get_mut(locale)
                .ok_or(FragmentError::UnknownTagReference { key, position: None })?
                .get_mut(key),
        }
    }

    /// Register an id used by something other than a tag (a part, a note)
    pub fn reserve_id(&mut self, id: &str) {
        self.reserved_ids.insert(id.to_string());
    }

    pub fn release_id(&mut self, id: &str) {
        self.reserved_ids.remove(id);
    }

    pub fn is_id_used(&self, id: &str) -> bool {
        self.reserved_ids.contains(id)
            || self.source.is_id_used(id)
            || self.targets.values().any(|t| t.is_id_used(id))
    }

    /// Next id not used anywhere in the unit: `1`, `2`... or `s1`, `s2`... for segments.
    pub fn suggest_id(&mut self, for_segment: bool) -> String {
        loop {
            let id = if for_segment {
                self.last_segment_suggested += 1;
                format!("s{}", self.last_segment_suggested)
            } else {
                self.last_suggested += 1;
                self.last_suggested.to_string()
            };
            if !self.is_id_used(&id) {
                return id;
            }
        }
    }

    /// Directionality declared for a side
    pub fn dir(&self, side: &Side) -> Directionality {
        match side {
            Side::Source => self.source_dir,
            Side::Target(_) => self.target_dir,
        }
    }

    pub fn has_code_with_data(&self) -> bool {
        self.source.has_code_with_data() || self.targets.values().any(Tags::has_code_with_data)
    }

    /// `dataRef` ids for every distinct original data, source first.
    pub fn data_ids(&self) -> DataRefMap {
        let mut map = DataRefMap::default();
        for tags in std::iter::once(&self.source).chain(self.targets.values()) {
            for (_, tag) in tags.iter() {
                if let Some(code) = tag.as_code().filter(|c| c.has_data()) {
                    map.add(code.data.as_deref().unwrap_or_default(), code.data_dir);
                }
            }
        }
        map
    }

    /// Deep-copy every tag of every side into `other`.
    pub fn clone_into(&self, other: &mut Store) -> Result<KeyMap, FragmentError> {
        let mut mapping = KeyMap::new();
        let sides = std::iter::once((Side::Source, &self.source)).chain(
            self.targets
                .iter()
                .map(|(locale, tags)| (Side::Target(locale.clone()), tags)),
        );
        for (side, tags) in sides {
            let dest = other.tags_mut(&side)?;
            for (key, _) in tags.iter() {
                let new_key = tags.copy_into(key, dest)?;
                mapping.insert((side.clone(), key), new_key);
            }
            for (index, slot) in tags.protected.iter().enumerate() {
                if let Some(content) = slot {
                    let key = TagKey::new(MarkerClass::ProtectedContent, index);
                    let new_key = dest.register_protected(content.clone())?;
                    mapping.insert((side.clone(), key), new_key);
                }
            }
        }
        other.reserved_ids.extend(self.reserved_ids.iter().cloned());
        debug!("Copied {} tag(s) into another store", mapping.len());
        Ok(mapping)
    }
}
