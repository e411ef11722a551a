/*!
 * Annotation kinds and the typed metadata an annotation can carry.
 *
 * The set of metadata variants is closed; anything the reader does not
 * recognize is kept as `Metadata::Opaque` so it survives a round trip.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::FragmentError;
use crate::language_utils;

/// Type of an annotation (`type` attribute of `<mrk>`/`<sm>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnnotationKind {
    #[default]
    Generic,
    Comment,
    Term,
    /// `its:term-no`: explicitly not a term
    TermNo,
    /// Any other `prefix:name` value
    Custom(String),
}

impl AnnotationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Generic => "generic",
            Self::Comment => "comment",
            Self::Term => "term",
            Self::TermNo => "its:term-no",
            Self::Custom(value) => value,
        }
    }

    pub fn is_term(&self) -> bool {
        matches!(self, Self::Term | Self::TermNo)
    }
}

impl FromStr for AnnotationKind {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Self::Generic),
            "comment" => Ok(Self::Comment),
            "term" => Ok(Self::Term),
            "its:term-no" => Ok(Self::TermNo),
            other => {
                // Custom values must be prefix:name with both parts present
                match other.find(':') {
                    Some(n) if n > 0 && n < other.len() - 1 => Ok(Self::Custom(other.to_string())),
                    _ => Err(FragmentError::invalid_attribute("type", other)),
                }
            }
        }
    }
}

impl TryFrom<String> for AnnotationKind {
    type Error = FragmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnnotationKind> for String {
    fn from(kind: AnnotationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminology information
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TermInfo {
    /// Confidence in the term status, 0.0 to 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Tool that produced the confidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotator_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_ref: Option<String>,
}

/// Match or machine-translation quality for the annotated span
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchQuality {
    /// Similarity with the match source, 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// MT confidence, 0.0 to 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mt_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// Localization quality issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Severity, 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_ref: Option<String>,
    pub enabled: bool,
}

impl Default for QualityIssue {
    fn default() -> Self {
        Self {
            issue_type: None,
            comment: None,
            severity: None,
            profile_ref: None,
            enabled: true,
        }
    }
}

/// Values allowed for the quality issue type
pub const QUALITY_ISSUE_TYPES: &[&str] = &[
    "terminology",
    "mistranslation",
    "omission",
    "untranslated",
    "addition",
    "duplication",
    "inconsistency",
    "grammar",
    "legal",
    "register",
    "locale-specific-content",
    "locale-violation",
    "style",
    "characters",
    "misspelling",
    "typographical",
    "formatting",
    "inconsistent-entities",
    "numbers",
    "markup",
    "pattern-problem",
    "whitespace",
    "internationalization",
    "length",
    "non-conformance",
    "uncategorized",
    "other",
];

/// Whether the listed locales are the only ones (include) or the excluded ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Include,
    Exclude,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }
}

/// Locales the annotated content applies to
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocaleFilter {
    pub mode: FilterMode,
    /// Locale tags or `*`
    pub locales: Vec<String>,
}

impl LocaleFilter {
    /// Parse an ITS list such as `fr, de-CH`
    pub fn parse_list(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn to_list(&self) -> String {
        self.locales.join(", ")
    }

    /// Does the filter let `locale` through
    pub fn applies_to(&self, locale: &str) -> bool {
        let listed = self
            .locales
            .iter()
            .any(|l| l == "*" || l.eq_ignore_ascii_case(locale) || language_utils::language_codes_match(l, locale));
        match self.mode {
            FilterMode::Include => listed,
            FilterMode::Exclude => !listed,
        }
    }
}

/// Who or what created or revised the content
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev_person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev_org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev_tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prov_ref: Option<String>,
}

/// Typed payload of an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metadata {
    Comment {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Reference to a unit note (`#n=...`)
        #[serde(skip_serializing_if = "Option::is_none")]
        note_ref: Option<String>,
    },
    Term(TermInfo),
    MatchQuality(MatchQuality),
    QualityIssue(QualityIssue),
    LocaleFilter(LocaleFilter),
    Provenance(Provenance),
    /// Unrecognized attributes of one namespace prefix, kept verbatim
    Opaque {
        /// Namespace prefix the attributes belong to
        prefix: String,
        attributes: BTreeMap<String, String>,
    },
}

fn check_range(kind: &str, field: &str, value: Option<f64>, max: f64) -> Result<(), FragmentError> {
    match value {
        Some(v) if !(0.0..=max).contains(&v) || v.is_nan() => Err(FragmentError::invalid_metadata(
            kind,
            format!("{} must be between 0 and {}, got {}", field, max, v),
        )),
        _ => Ok(()),
    }
}

impl Metadata {
    /// Variant name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Comment { .. } => "comment",
            Self::Term(_) => "term",
            Self::MatchQuality(_) => "match-quality",
            Self::QualityIssue(_) => "quality-issue",
            Self::LocaleFilter(_) => "locale-filter",
            Self::Provenance(_) => "provenance",
            Self::Opaque { .. } => "opaque",
        }
    }

    /// Check the payload on its own and against the annotation kind it is attached to.
    pub fn validate(&self, kind: &AnnotationKind) -> Result<(), FragmentError> {
        let name = self.name();
        match self {
            Self::Comment { text, note_ref } => {
                if *kind != AnnotationKind::Comment {
                    return Err(FragmentError::invalid_metadata(
                        name,
                        format!("comment metadata requires a comment annotation, not '{}'", kind),
                    ));
                }
                if text.is_none() && note_ref.is_none() {
                    return Err(FragmentError::invalid_metadata(name, "needs a text or a note reference"));
                }
            }
            Self::Term(term) => {
                if !kind.is_term() {
                    return Err(FragmentError::invalid_metadata(
                        name,
                        format!("term metadata requires a term annotation, not '{}'", kind),
                    ));
                }
                check_range(name, "confidence", term.confidence, 1.0)?;
                if term.confidence.is_some() && term.annotator_ref.is_none() {
                    return Err(FragmentError::invalid_metadata(
                        name,
                        "a confidence needs an annotator reference",
                    ));
                }
                if term.info.is_some() && term.info_ref.is_some() {
                    return Err(FragmentError::invalid_metadata(
                        name,
                        "info and info reference cannot both be set",
                    ));
                }
            }
            Self::MatchQuality(quality) => {
                check_range(name, "similarity", quality.similarity, 100.0)?;
                check_range(name, "mt confidence", quality.mt_confidence, 1.0)?;
            }
            Self::QualityIssue(issue) => {
                if issue.issue_type.is_none() && issue.comment.is_none() {
                    return Err(FragmentError::invalid_metadata(name, "needs a type or a comment"));
                }
                if let Some(t) = &issue.issue_type {
                    if !QUALITY_ISSUE_TYPES.contains(&t.as_str()) {
                        return Err(FragmentError::invalid_metadata(name, format!("unknown issue type '{}'", t)));
                    }
                }
                check_range(name, "severity", issue.severity, 100.0)?;
            }
            Self::LocaleFilter(filter) => {
                for locale in &filter.locales {
                    if locale != "*" && !language_utils::is_valid_locale(locale) {
                        return Err(FragmentError::invalid_metadata(
                            name,
                            format!("malformed locale '{}'", locale),
                        ));
                    }
                }
            }
            Self::Provenance(prov) => {
                let any = [
                    &prov.person,
                    &prov.org,
                    &prov.tool,
                    &prov.rev_person,
                    &prov.rev_org,
                    &prov.rev_tool,
                    &prov.prov_ref,
                ]
                .iter()
                .any(|f| f.is_some());
                if !any {
                    return Err(FragmentError::invalid_metadata(name, "no provenance field is set"));
                }
            }
            Self::Opaque { prefix, .. } => {
                if prefix.is_empty() {
                    return Err(FragmentError::invalid_metadata(name, "missing namespace prefix"));
                }
            }
        }
        Ok(())
    }
}
