/*!
 * Tag value types.
 *
 * A `CTag` describes one half of an inline code (or a standalone code), an
 * `MTag` one half of an annotation. Both are plain data stored in a tag
 * table; fragments only hold their keys.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::FragmentError;
use crate::model::markers::MarkerClass;
use crate::model::metadata::{AnnotationKind, Metadata};

/// Position of a tag in its span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Opening,
    Closing,
    Standalone,
}

/// Text directionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directionality {
    /// Taken from the enclosing context
    #[default]
    Inherited,
    Ltr,
    Rtl,
    Auto,
}

impl Directionality {
    /// Suffix used to tell apart identical data with different directionality
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Inherited => "",
            Self::Ltr => "l",
            Self::Rtl => "r",
            Self::Auto => "a",
        }
    }

    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Inherited => None,
            Self::Ltr => Some("ltr"),
            Self::Rtl => Some("rtl"),
            Self::Auto => Some("auto"),
        }
    }
}

impl FromStr for Directionality {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ltr" => Ok(Self::Ltr),
            "rtl" => Ok(Self::Rtl),
            "auto" => Ok(Self::Auto),
            other => Err(FragmentError::invalid_attribute("dir", other)),
        }
    }
}

/// Reordering constraint of a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CanReorder {
    #[default]
    Yes,
    /// First code of a sequence that cannot be reordered
    FirstNo,
    No,
}

impl CanReorder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::FirstNo => "firstNo",
            Self::No => "no",
        }
    }
}

impl FromStr for CanReorder {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::Yes),
            "firstNo" => Ok(Self::FirstNo),
            "no" => Ok(Self::No),
            other => Err(FragmentError::invalid_attribute("canReorder", other)),
        }
    }
}

/// Category of an inline code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    Fmt,
    Ui,
    Quote,
    Link,
    Image,
    Other,
}

impl CodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fmt => "fmt",
            Self::Ui => "ui",
            Self::Quote => "quote",
            Self::Link => "link",
            Self::Image => "image",
            Self::Other => "other",
        }
    }
}

impl FromStr for CodeType {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fmt" => Ok(Self::Fmt),
            "ui" => Ok(Self::Ui),
            "quote" => Ok(Self::Quote),
            "link" => Ok(Self::Link),
            "image" => Ok(Self::Image),
            "other" => Ok(Self::Other),
            other => Err(FragmentError::invalid_attribute("type", other)),
        }
    }
}

/// One half of an inline code, or a standalone code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CTag {
    tag_type: TagType,
    id: String,
    /// Original data (the native markup, e.g. `<b>`)
    pub data: Option<String>,
    pub data_dir: Directionality,
    /// Display hint, never used for text comparison
    pub disp: Option<String>,
    /// Equivalent text, never used for text comparison
    pub equiv: String,
    pub code_type: Option<CodeType>,
    sub_type: Option<String>,
    pub can_copy: bool,
    pub can_delete: bool,
    can_reorder: CanReorder,
    pub can_overlap: bool,
    pub copy_of: Option<String>,
    pub dir: Directionality,
    pub isolated: bool,
    sub_flows: Option<String>,
    /// Attributes of other namespaces (`prefix:name`), kept as read
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ext_attributes: BTreeMap<String, String>,
}

impl CTag {
    pub fn new(tag_type: TagType, id: &str, data: Option<&str>) -> Self {
        Self {
            tag_type,
            id: id.to_string(),
            data: data.map(str::to_string),
            data_dir: Directionality::Inherited,
            disp: None,
            equiv: String::new(),
            code_type: None,
            sub_type: None,
            can_copy: true,
            can_delete: true,
            can_reorder: CanReorder::Yes,
            can_overlap: false,
            copy_of: None,
            dir: Directionality::Inherited,
            isolated: false,
            sub_flows: None,
            ext_attributes: BTreeMap::new(),
        }
    }

    /// Closing counterpart of an opening code: shares its span attributes.
    pub fn closing_for(opening: &CTag, data: Option<&str>) -> Self {
        let mut closing = Self::new(TagType::Closing, &opening.id, data);
        closing.code_type = opening.code_type;
        closing.sub_type = opening.sub_type.clone();
        closing.can_copy = opening.can_copy;
        closing.can_delete = opening.can_delete;
        closing.can_reorder = opening.can_reorder;
        closing.can_overlap = opening.can_overlap;
        closing.copy_of = opening.copy_of.clone();
        closing.dir = opening.dir;
        closing.ext_attributes = opening.ext_attributes.clone();
        closing
    }

    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_data(&self) -> bool {
        self.data.as_deref().is_some_and(|d| !d.is_empty())
    }

    pub fn sub_type(&self) -> Option<&str> {
        self.sub_type.as_deref()
    }

    /// Set the sub-type (`prefix:value`).
    ///
    /// `xlf:` values are limited to `lb`, `pb`, `b`, `i`, `u` (type `fmt`) and
    /// `var` (type `ui`); the code type is set accordingly when missing.
    pub fn set_sub_type(&mut self, value: Option<&str>) -> Result<(), FragmentError> {
        let Some(value) = value else {
            self.sub_type = None;
            return Ok(());
        };
        let n = value.find(':').unwrap_or(0);
        if n == 0 || n == value.len() - 1 {
            return Err(FragmentError::invalid_attribute("subType", value));
        }
        if let Some(name) = value.strip_prefix("xlf:") {
            let required = match name {
                "lb" | "pb" | "b" | "i" | "u" => CodeType::Fmt,
                "var" => CodeType::Ui,
                _ => return Err(FragmentError::invalid_attribute("subType", value)),
            };
            match self.code_type {
                None => self.code_type = Some(required),
                Some(t) if t == required => {}
                Some(_) => return Err(FragmentError::invalid_attribute("subType", value)),
            }
        }
        self.sub_type = Some(value.to_string());
        Ok(())
    }

    /// Reorder constraint as seen from this tag; a closing tag reports
    /// `No` where its opening says `FirstNo`.
    pub fn can_reorder(&self) -> CanReorder {
        if self.tag_type == TagType::Closing && self.can_reorder == CanReorder::FirstNo {
            CanReorder::No
        } else {
            self.can_reorder
        }
    }

    /// Anything but `Yes` also forbids copying and deleting the code.
    pub fn set_can_reorder(&mut self, value: CanReorder) {
        self.can_reorder = value;
        if value != CanReorder::Yes {
            self.can_copy = false;
            self.can_delete = false;
        }
    }

    pub fn sub_flows(&self) -> Option<&str> {
        self.sub_flows.as_deref()
    }

    /// Set the list of sub-flow unit ids; whitespace is normalized.
    pub fn set_sub_flows(&mut self, ids: Option<&str>) {
        self.sub_flows = ids
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty());
    }
}

impl PartialEq for CTag {
    fn eq(&self, other: &Self) -> bool {
        self.tag_type == other.tag_type && self.id == other.id && self.data == other.data
    }
}

/// One half of an annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MTag {
    tag_type: TagType,
    id: String,
    pub kind: AnnotationKind,
    pub value: Option<String>,
    pub reference: Option<String>,
    /// Tri-state: unset means inherited
    pub translate: Option<bool>,
    pub can_overlap: bool,
    pub isolated: bool,
    metadata: Vec<Metadata>,
}

impl MTag {
    pub fn opening(id: &str, kind: AnnotationKind) -> Self {
        Self {
            tag_type: TagType::Opening,
            id: id.to_string(),
            kind,
            value: None,
            reference: None,
            translate: None,
            can_overlap: true,
            isolated: false,
            metadata: Vec::new(),
        }
    }

    /// Closing counterpart; the payload stays on the opening tag.
    pub fn closing_for(opening: &MTag) -> Self {
        Self {
            tag_type: TagType::Closing,
            id: opening.id.clone(),
            kind: opening.kind.clone(),
            value: None,
            reference: None,
            translate: None,
            can_overlap: opening.can_overlap,
            isolated: opening.isolated,
            metadata: Vec::new(),
        }
    }

    /// A closing tag with no opening counterpart in its fragment
    pub fn orphan_closing(id: &str) -> Self {
        let mut tag = Self::closing_for(&Self::opening(id, AnnotationKind::Generic));
        tag.isolated = true;
        tag
    }

    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    /// Attach a metadata item after validating it against the annotation kind.
    pub fn add_metadata(&mut self, item: Metadata) -> Result<(), FragmentError> {
        item.validate(&self.kind)?;
        self.metadata.push(item);
        Ok(())
    }

    pub fn clear_metadata(&mut self) {
        self.metadata.clear();
    }
}

impl PartialEq for MTag {
    fn eq(&self, other: &Self) -> bool {
        self.tag_type == other.tag_type
            && self.id == other.id
            && self.kind == other.kind
            && self.metadata == other.metadata
    }
}

/// A code or annotation tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum Tag {
    Code(CTag),
    Annotation(MTag),
}

impl Tag {
    pub fn id(&self) -> &str {
        match self {
            Self::Code(c) => c.id(),
            Self::Annotation(m) => m.id(),
        }
    }

    pub fn tag_type(&self) -> TagType {
        match self {
            Self::Code(c) => c.tag_type(),
            Self::Annotation(m) => m.tag_type(),
        }
    }

    /// Marker class this tag is stored under
    pub fn marker_class(&self) -> MarkerClass {
        match (self, self.tag_type()) {
            (Self::Code(_), TagType::Opening) => MarkerClass::CodeOpening,
            (Self::Code(_), TagType::Closing) => MarkerClass::CodeClosing,
            (Self::Code(_), TagType::Standalone) => MarkerClass::CodeStandalone,
            (Self::Annotation(_), TagType::Closing) => MarkerClass::AnnotationClosing,
            (Self::Annotation(_), _) => MarkerClass::AnnotationOpening,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code(_))
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self, Self::Annotation(_))
    }

    pub fn as_code(&self) -> Option<&CTag> {
        match self {
            Self::Code(c) => Some(c),
            Self::Annotation(_) => None,
        }
    }

    pub fn as_code_mut(&mut self) -> Option<&mut CTag> {
        match self {
            Self::Code(c) => Some(c),
            Self::Annotation(_) => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&MTag> {
        match self {
            Self::Annotation(m) => Some(m),
            Self::Code(_) => None,
        }
    }

    pub fn as_annotation_mut(&mut self) -> Option<&mut MTag> {
        match self {
            Self::Annotation(m) => Some(m),
            Self::Code(_) => None,
        }
    }

    /// Original data; annotations have none
    pub fn data(&self) -> Option<&str> {
        self.as_code().and_then(|c| c.data.as_deref())
    }

    pub fn disp(&self) -> Option<&str> {
        self.as_code().and_then(|c| c.disp.as_deref())
    }

    pub fn equiv(&self) -> &str {
        self.as_code().map(|c| c.equiv.as_str()).unwrap_or("")
    }

    pub fn can_overlap(&self) -> bool {
        match self {
            Self::Code(c) => c.can_overlap,
            Self::Annotation(m) => m.can_overlap,
        }
    }

    pub fn set_can_overlap(&mut self, value: bool) {
        match self {
            Self::Code(c) => c.can_overlap = value,
            Self::Annotation(m) => m.can_overlap = value,
        }
    }

    pub fn isolated(&self) -> bool {
        match self {
            Self::Code(c) => c.isolated,
            Self::Annotation(m) => m.isolated,
        }
    }

    pub fn set_isolated(&mut self, value: bool) {
        match self {
            Self::Code(c) => c.isolated = value,
            Self::Annotation(m) => m.isolated = value,
        }
    }
}

impl From<CTag> for Tag {
    fn from(tag: CTag) -> Self {
        Self::Code(tag)
    }
}

impl From<MTag> for Tag {
    fn from(tag: MTag) -> Self {
        Self::Annotation(tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = if self.is_code() { "code" } else { "annotation" };
        write!(f, "{} {:?} '{}'", family, self.tag_type(), self.id())
    }
}

/// Hidden coded text kept out of the fragment by a protected content marker.
///
/// The tags referenced inside stay registered in the same table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedContent {
    pub coded_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctag_equality_shouldIgnoreDisplayHints() {
        let mut a = CTag::new(TagType::Opening, "1", Some("<b>"));
        let b = CTag::new(TagType::Opening, "1", Some("<b>"));
        a.disp = Some("[b]".to_string());
        a.equiv = "B".to_string();
        assert_eq!(a, b);
        let c = CTag::new(TagType::Opening, "1", Some("<i>"));
        assert_ne!(a, c);
    }

    #[test]
    fn test_ctag_setCanReorder_notYes_shouldClearCopyAndDelete() {
        let mut tag = CTag::new(TagType::Opening, "1", None);
        tag.set_can_reorder(CanReorder::FirstNo);
        assert!(!tag.can_copy);
        assert!(!tag.can_delete);
        let closing = CTag::closing_for(&tag, None);
        assert_eq!(closing.can_reorder(), CanReorder::No);
        assert_eq!(tag.can_reorder(), CanReorder::FirstNo);
    }

    #[test]
    fn test_ctag_setSubType_shouldEnforceXlfValues() {
        let mut tag = CTag::new(TagType::Standalone, "1", None);
        tag.set_sub_type(Some("xlf:lb")).unwrap();
        assert_eq!(tag.code_type, Some(CodeType::Fmt));

        let mut var = CTag::new(TagType::Standalone, "2", None);
        var.code_type = Some(CodeType::Fmt);
        assert!(var.set_sub_type(Some("xlf:var")).is_err());
        assert!(var.set_sub_type(Some("xlf:unknown")).is_err());
        assert!(var.set_sub_type(Some("nocolon")).is_err());
        assert!(var.set_sub_type(Some("my:thing")).is_ok());
    }

    #[test]
    fn test_ctag_setSubFlows_shouldNormalizeWhitespace() {
        let mut tag = CTag::new(TagType::Standalone, "1", None);
        tag.set_sub_flows(Some("  u1 \n u2  "));
        assert_eq!(tag.sub_flows(), Some("u1 u2"));
    }

    #[test]
    fn test_tag_markerClass_shouldFollowFamilyAndType() {
        let tag: Tag = MTag::opening("m1", AnnotationKind::Comment).into();
        assert_eq!(tag.marker_class(), MarkerClass::AnnotationOpening);
        let tag: Tag = CTag::new(TagType::Standalone, "1", None).into();
        assert_eq!(tag.marker_class(), MarkerClass::CodeStandalone);
    }
}
