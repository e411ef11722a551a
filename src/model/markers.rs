/*!
 * Marker encoding for coded text.
 *
 * Every marker is two chars: a class char in `U+E101..=U+E106` followed by a
 * key char `U+E110 + index`. Indices are issued per class by the tag store.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class char of a code opening marker
pub const CODE_OPENING: char = '\u{E101}';
/// Class char of a code closing marker
pub const CODE_CLOSING: char = '\u{E102}';
/// Class char of a standalone code marker
pub const CODE_STANDALONE: char = '\u{E103}';
/// Class char of an annotation opening marker
pub const MARKER_OPENING: char = '\u{E104}';
/// Class char of an annotation closing marker
pub const MARKER_CLOSING: char = '\u{E105}';
/// Class char of a protected content marker
pub const PCONT_STANDALONE: char = '\u{E106}';

/// First key char
pub const TAGREF_BASE: u32 = 0xE110;
/// Highest index a key char can encode
pub const TAGREF_MAX: usize = (0xF8FF - TAGREF_BASE) as usize;

/// Width of a marker in chars
pub const MARKER_WIDTH: usize = 2;

/// Replacement for literal class chars found in plain text
pub const REPLACEMENT: char = '\u{FFFD}';

/// The six marker classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerClass {
    CodeOpening,
    CodeClosing,
    CodeStandalone,
    AnnotationOpening,
    AnnotationClosing,
    ProtectedContent,
}

impl MarkerClass {
    pub const ALL: [MarkerClass; 6] = [
        MarkerClass::CodeOpening,
        MarkerClass::CodeClosing,
        MarkerClass::CodeStandalone,
        MarkerClass::AnnotationOpening,
        MarkerClass::AnnotationClosing,
        MarkerClass::ProtectedContent,
    ];

    /// Class char written as the first unit of the marker
    pub fn as_char(self) -> char {
        match self {
            Self::CodeOpening => CODE_OPENING,
            Self::CodeClosing => CODE_CLOSING,
            Self::CodeStandalone => CODE_STANDALONE,
            Self::AnnotationOpening => MARKER_OPENING,
            Self::AnnotationClosing => MARKER_CLOSING,
            Self::ProtectedContent => PCONT_STANDALONE,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            CODE_OPENING => Some(Self::CodeOpening),
            CODE_CLOSING => Some(Self::CodeClosing),
            CODE_STANDALONE => Some(Self::CodeStandalone),
            MARKER_OPENING => Some(Self::AnnotationOpening),
            MARKER_CLOSING => Some(Self::AnnotationClosing),
            PCONT_STANDALONE => Some(Self::ProtectedContent),
            _ => None,
        }
    }

    /// Position of the class in per-class tables
    pub fn ordinal(self) -> usize {
        match self {
            Self::CodeOpening => 0,
            Self::CodeClosing => 1,
            Self::CodeStandalone => 2,
            Self::AnnotationOpening => 3,
            Self::AnnotationClosing => 4,
            Self::ProtectedContent => 5,
        }
    }

    pub fn is_code(self) -> bool {
        matches!(self, Self::CodeOpening | Self::CodeClosing | Self::CodeStandalone)
    }

    pub fn is_annotation(self) -> bool {
        matches!(self, Self::AnnotationOpening | Self::AnnotationClosing)
    }

    pub fn is_opening(self) -> bool {
        matches!(self, Self::CodeOpening | Self::AnnotationOpening)
    }

    pub fn is_closing(self) -> bool {
        matches!(self, Self::CodeClosing | Self::AnnotationClosing)
    }

    /// Short name used in debug displays (`{oc:1}`)
    pub fn short_name(self) -> &'static str {
        match self {
            Self::CodeOpening => "oc",
            Self::CodeClosing => "cc",
            Self::CodeStandalone => "ph",
            Self::AnnotationOpening => "om",
            Self::AnnotationClosing => "cm",
            Self::ProtectedContent => "pc",
        }
    }
}

impl fmt::Display for MarkerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CodeOpening => "code-opening",
            Self::CodeClosing => "code-closing",
            Self::CodeStandalone => "code-standalone",
            Self::AnnotationOpening => "annotation-opening",
            Self::AnnotationClosing => "annotation-closing",
            Self::ProtectedContent => "protected-content",
        };
        write!(f, "{}", name)
    }
}

/// Reference to one tag (or protected content record) in a tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagKey {
    pub class: MarkerClass,
    pub index: usize,
}

impl TagKey {
    pub fn new(class: MarkerClass, index: usize) -> Self {
        Self { class, index }
    }

    /// The two chars written into coded text for this key.
    ///
    /// Indices above `TAGREF_MAX` are never issued by the store.
    pub fn to_chars(self) -> [char; 2] {
        let key = char::from_u32(TAGREF_BASE + self.index as u32).unwrap_or(REPLACEMENT);
        [self.class.as_char(), key]
    }

    /// The marker as a string
    pub fn to_ref(self) -> String {
        self.to_chars().iter().collect()
    }

    /// Decode a marker from its class char and key char
    pub fn from_chars(class: char, key: char) -> Option<Self> {
        let class = MarkerClass::from_char(class)?;
        let value = key as u32;
        if !(TAGREF_BASE..=TAGREF_BASE + TAGREF_MAX as u32).contains(&value) {
            return None;
        }
        Some(Self::new(class, (value - TAGREF_BASE) as usize))
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class.short_name(), self.index)
    }
}

/// True for the first unit of a marker
pub fn is_marker_unit(c: char) -> bool {
    MarkerClass::from_char(c).is_some()
}

/// Remove every marker from a coded text
pub fn strip_markers(coded: &str) -> String {
    let mut out = String::with_capacity(coded.len());
    let mut chars = coded.chars();
    while let Some(c) = chars.next() {
        if is_marker_unit(c) {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Replace literal class chars so plain text can never be read as a marker.
///
/// Returns the sanitized text and the number of replaced chars.
pub fn sanitize_text(text: &str) -> (String, usize) {
    let mut replaced = 0;
    let out = text
        .chars()
        .map(|c| {
            if is_marker_unit(c) {
                replaced += 1;
                REPLACEMENT
            } else {
                c
            }
        })
        .collect();
    (out, replaced)
}

/// One marker found in coded text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPosition {
    /// Char position of the class unit
    pub position: usize,
    pub key: TagKey,
}

/// Decode all markers of a coded text, in order.
///
/// A class char followed by anything but a key char decodes to `None` at
/// that position, which callers report as a corrupted fragment.
pub fn scan_markers(coded: &str) -> Vec<Result<MarkerPosition, usize>> {
    let mut found = Vec::new();
    let mut chars = coded.chars().enumerate();
    while let Some((pos, c)) = chars.next() {
        if !is_marker_unit(c) {
            continue;
        }
        match chars.next().and_then(|(_, k)| TagKey::from_chars(c, k)) {
            Some(key) => found.push(Ok(MarkerPosition { position: pos, key })),
            None => found.push(Err(pos)),
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagKey_toChars_shouldEncodeClassAndIndex() {
        let key = TagKey::new(MarkerClass::CodeClosing, 5);
        let chars = key.to_chars();
        assert_eq!(chars[0], CODE_CLOSING);
        assert_eq!(chars[1] as u32, TAGREF_BASE + 5);
        assert_eq!(TagKey::from_chars(chars[0], chars[1]), Some(key));
    }

    #[test]
    fn test_tagKey_fromChars_withLiteralSecondUnit_shouldFail() {
        assert_eq!(TagKey::from_chars(CODE_OPENING, 'a'), None);
        assert_eq!(TagKey::from_chars('x', '\u{E110}'), None);
    }

    #[test]
    fn test_stripMarkers_shouldKeepLiteralsOnly() {
        let coded = format!(
            "a{}b{}c",
            TagKey::new(MarkerClass::CodeOpening, 0).to_ref(),
            TagKey::new(MarkerClass::CodeClosing, 0).to_ref()
        );
        assert_eq!(strip_markers(&coded), "abc");
    }

    #[test]
    fn test_sanitizeText_shouldReplaceClassChars() {
        let (out, n) = sanitize_text("x\u{E101}y\u{E106}");
        assert_eq!(out, "x\u{FFFD}y\u{FFFD}");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_scanMarkers_shouldReportCharPositions() {
        let coded = format!("é{}z", TagKey::new(MarkerClass::AnnotationOpening, 2).to_ref());
        let found = scan_markers(&coded);
        assert_eq!(
            found,
            vec![Ok(MarkerPosition {
                position: 1,
                key: TagKey::new(MarkerClass::AnnotationOpening, 2)
            })]
        );
    }
}
