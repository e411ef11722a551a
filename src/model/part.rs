/*!
 * Parts: one source fragment plus at most one target fragment per locale.
 */

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::FragmentError;
use crate::model::fragment::Fragment;
use crate::model::metadata::AnnotationKind;
use crate::model::store::{Side, Store};

/// Translation state of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    #[default]
    Initial,
    Translated,
    Reviewed,
    Final,
}

impl TargetState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Translated => "translated",
            Self::Reviewed => "reviewed",
            Self::Final => "final",
        }
    }
}

impl FromStr for TargetState {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "translated" => Ok(Self::Translated),
            "reviewed" => Ok(Self::Reviewed),
            "final" => Ok(Self::Final),
            other => Err(FragmentError::invalid_attribute("state", other)),
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a part is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    /// Translatable content
    Segment {
        state: TargetState,
        /// `prefix:value`
        sub_state: Option<String>,
        can_resegment: bool,
    },
    /// Content between segments (typically whitespace)
    Ignorable,
}

/// What to do when a requested target does not exist yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetTarget {
    CreateEmpty,
    CloneSource,
}

/// A segment or ignorable part of a unit.
#[derive(Debug, PartialEq)]
pub struct Part {
    id: Option<String>,
    kind: PartKind,
    source: Fragment,
    targets: BTreeMap<String, Fragment>,
    pub preserve_ws: bool,
    /// Position of the target in the target-side order, when it differs
    pub target_order: Option<usize>,
}

impl Part {
    pub fn segment() -> Self {
        Self::with_kind(PartKind::Segment {
            state: TargetState::Initial,
            sub_state: None,
            can_resegment: true,
        })
    }

    pub fn ignorable() -> Self {
        Self::with_kind(PartKind::Ignorable)
    }

    fn with_kind(kind: PartKind) -> Self {
        Self {
            id: None,
            kind,
            source: Fragment::source(),
            targets: BTreeMap::new(),
            preserve_ws: false,
            target_order: None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Set by the unit, which keeps ids unique
    pub(crate) fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    pub fn kind(&self) -> &PartKind {
        &self.kind
    }

    pub fn is_segment(&self) -> bool {
        matches!(self.kind, PartKind::Segment { .. })
    }

    /// State of a segment; ignorables have none
    pub fn state(&self) -> Option<TargetState> {
        match &self.kind {
            PartKind::Segment { state, .. } => Some(*state),
            PartKind::Ignorable => None,
        }
    }

    pub fn set_state(&mut self, value: TargetState) -> Result<(), FragmentError> {
        match &mut self.kind {
            PartKind::Segment { state, .. } => {
                *state = value;
                Ok(())
            }
            PartKind::Ignorable => Err(FragmentError::invalid_attribute("state", value.as_str())),
        }
    }

    pub fn sub_state(&self) -> Option<&str> {
        match &self.kind {
            PartKind::Segment { sub_state, .. } => sub_state.as_deref(),
            PartKind::Ignorable => None,
        }
    }

    /// Set the sub-state, a `prefix:value` string.
    pub fn set_sub_state(&mut self, value: Option<&str>) -> Result<(), FragmentError> {
        if let Some(v) = value {
            match v.find(':') {
                Some(n) if n > 0 && n < v.len() - 1 => {}
                _ => return Err(FragmentError::invalid_attribute("subState", v)),
            }
        }
        match &mut self.kind {
            PartKind::Segment { sub_state, .. } => {
                *sub_state = value.map(str::to_string);
                Ok(())
            }
            PartKind::Ignorable => Err(FragmentError::invalid_attribute("subState", value.unwrap_or_default())),
        }
    }

    pub fn can_resegment(&self) -> bool {
        matches!(self.kind, PartKind::Segment { can_resegment: true, .. })
    }

    pub fn source(&self) -> &Fragment {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut Fragment {
        &mut self.source
    }

    pub fn target(&self, locale: &str) -> Option<&Fragment> {
        self.targets.get(locale)
    }

    pub fn target_mut(&mut self, locale: &str) -> Option<&mut Fragment> {
        self.targets.get_mut(locale)
    }

    pub fn has_target(&self, locale: &str) -> bool {
        self.targets.contains_key(locale)
    }

    pub fn target_locales(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Fragment of one side
    pub fn fragment(&self, side: &Side) -> Option<&Fragment> {
        match side {
            Side::Source => Some(&self.source),
            Side::Target(locale) => self.targets.get(locale),
        }
    }

    pub fn fragment_mut(&mut self, side: &Side) -> Option<&mut Fragment> {
        match side {
            Side::Source => Some(&mut self.source),
            Side::Target(locale) => self.targets.get_mut(locale),
        }
    }

    /// Target for `locale`, created empty or as a deep copy of the source when missing.
    pub fn get_or_create_target(
        &mut self,
        store: &mut Store,
        locale: &str,
        how: GetTarget,
    ) -> Result<&mut Fragment, FragmentError> {
        if !self.targets.contains_key(locale) {
            let side = Side::target(locale);
            // Validates the locale even for an empty target
            store.tags_mut(&side)?;
            let target = match how {
                GetTarget::CreateEmpty => Fragment::new(side),
                GetTarget::CloneSource => self.source.clone_to_side(store, side)?,
            };
            debug!("Created {:?} target for {}", how, locale);
            self.targets.insert(locale.to_string(), target);
        }
        self.targets
            .get_mut(locale)
            .ok_or_else(|| FragmentError::InvalidLocale(locale.to_string()))
    }

    /// Replace the fragment of its own side, releasing the tags of the one it replaces.
    pub fn set_fragment(&mut self, store: &mut Store, fragment: Fragment) -> Result<(), FragmentError> {
        let old = match fragment.side().clone() {
            Side::Source => Some(std::mem::replace(&mut self.source, fragment)),
            Side::Target(locale) => {
                store.tags_mut(fragment.side())?;
                self.targets.insert(locale, fragment)
            }
        };
        if let Some(mut old) = old {
            old.clear(store)?;
        }
        Ok(())
    }

    /// Drop the target of a locale and release its tags. Returns false when absent.
    pub fn remove_target(&mut self, store: &mut Store, locale: &str) -> Result<bool, FragmentError> {
        match self.targets.remove(locale) {
            Some(mut target) => {
                target.clear(store)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deep copy with new tags in the same store. The copy has no id.
    pub fn duplicate(&self, store: &mut Store) -> Result<Part, FragmentError> {
        let mut targets = BTreeMap::new();
        for (locale, target) in &self.targets {
            targets.insert(locale.clone(), target.clone_to_side(store, target.side().clone())?);
        }
        Ok(Part {
            id: None,
            kind: self.kind.clone(),
            source: self.source.clone_to_side(store, Side::Source)?,
            targets,
            preserve_ws: self.preserve_ws,
            target_order: self.target_order,
        })
    }

    /// Remove annotations of one side (all sides when `None`), optionally of one kind.
    pub fn remove_annotations(
        &mut self,
        store: &mut Store,
        side: Option<&Side>,
        kind: Option<&AnnotationKind>,
    ) -> Result<usize, FragmentError> {
        let mut count = 0;
        if side.is_none_or(|s| *s == Side::Source) {
            count += self.source.remove_annotations(store, kind)?;
        }
        for target in self.targets.values_mut() {
            if side.is_none_or(|s| s == target.side()) {
                count += target.remove_annotations(store, kind)?;
            }
        }
        Ok(count)
    }
}
