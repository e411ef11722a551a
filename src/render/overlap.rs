/*!
 * Overlap resolution for code and annotation spans.
 *
 * One left-to-right scan over the markers of a fragment with a stack of open
 * spans. When a closing marker finds its opening below the top of the stack,
 * every span opened after it and still open is split: it leaves the nesting
 * structure and renders as empty start and end tags. The closing span itself
 * stays nested. Spans that never cross anything stay nested too.
 */

use serde::Serialize;

use crate::model::tag::TagType;

/// Families are matched separately: a code never closes an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanFamily {
    Code,
    Annotation,
    Protected,
}

/// How a marker is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanForm {
    /// Part of a cleanly nested pair (or a standalone marker)
    Nested,
    /// Part of a pair forced out of the nesting by a crossing span
    Split,
    /// The counterpart is not in this fragment
    Isolated,
}

/// What the resolver needs to know about one marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanMarker<'a> {
    pub family: SpanFamily,
    pub tag_type: TagType,
    pub id: &'a str,
}

impl<'a> SpanMarker<'a> {
    pub fn new(family: SpanFamily, tag_type: TagType, id: &'a str) -> Self {
        Self { family, tag_type, id }
    }

    fn closes(&self, opener: &SpanMarker<'_>) -> bool {
        opener.family == self.family && opener.id == self.id
    }
}

/// A closing marker that forced another span out of the nesting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    /// Index of the closing marker that triggered the split
    pub closer: usize,
    /// Index of the opening marker of the split span
    pub split: usize,
}

/// Result of a scan: one form and at most one partner per marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    forms: Vec<SpanForm>,
    partners: Vec<Option<usize>>,
    conflicts: Vec<Conflict>,
}

impl Resolution {
    pub fn form(&self, index: usize) -> SpanForm {
        self.forms.get(index).copied().unwrap_or(SpanForm::Nested)
    }

    /// Index of the other half of a pair
    pub fn partner(&self, index: usize) -> Option<usize> {
        self.partners.get(index).copied().flatten()
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Number of spans that had to be split
    pub fn split_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Assign a form to every marker. Depends only on the marker sequence.
pub fn resolve_spans(markers: &[SpanMarker<'_>]) -> Resolution {
    let mut forms = vec![SpanForm::Nested; markers.len()];
    let mut partners: Vec<Option<usize>> = vec![None; markers.len()];
    let mut conflicts = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    // Split openers still waiting for their closing marker
    let mut split_open: Vec<usize> = Vec::new();

    for (i, marker) in markers.iter().enumerate() {
        match marker.tag_type {
            TagType::Standalone => {}
            TagType::Opening => stack.push(i),
            TagType::Closing => {
                if let Some(depth) = stack.iter().rposition(|&o| marker.closes(&markers[o])) {
                    let opener = stack[depth];
                    for &later in &stack[depth + 1..] {
                        forms[later] = SpanForm::Split;
                        conflicts.push(Conflict { closer: i, split: later });
                        split_open.push(later);
                    }
                    stack.truncate(depth);
                    partners[opener] = Some(i);
                    partners[i] = Some(opener);
                } else if let Some(n) = split_open.iter().rposition(|&o| marker.closes(&markers[o])) {
                    let opener = split_open.remove(n);
                    forms[i] = SpanForm::Split;
                    partners[opener] = Some(i);
                    partners[i] = Some(opener);
                } else {
                    forms[i] = SpanForm::Isolated;
                }
            }
        }
    }

    // Openers never closed in this fragment
    for opener in stack.into_iter().chain(split_open) {
        forms[opener] = SpanForm::Isolated;
    }

    Resolution {
        forms,
        partners,
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(id: &str) -> SpanMarker<'_> {
        SpanMarker::new(SpanFamily::Code, TagType::Opening, id)
    }

    fn close(id: &str) -> SpanMarker<'_> {
        SpanMarker::new(SpanFamily::Code, TagType::Closing, id)
    }

    #[test]
    fn test_resolveSpans_cleanNesting_shouldStayNested() {
        let r = resolve_spans(&[open("1"), open("2"), close("2"), close("1")]);
        assert!((0..4).all(|i| r.form(i) == SpanForm::Nested));
        assert_eq!(r.partner(0), Some(3));
        assert_eq!(r.partner(1), Some(2));
        assert!(r.conflicts().is_empty());
    }

    #[test]
    fn test_resolveSpans_crossing_shouldSplitLaterSpan() {
        let r = resolve_spans(&[open("A"), open("B"), close("A"), close("B")]);
        assert_eq!(r.form(0), SpanForm::Nested);
        assert_eq!(r.form(2), SpanForm::Nested);
        assert_eq!(r.form(1), SpanForm::Split);
        assert_eq!(r.form(3), SpanForm::Split);
        assert_eq!(r.partner(1), Some(3));
        assert_eq!(r.conflicts(), &[Conflict { closer: 2, split: 1 }]);
    }

    #[test]
    fn test_resolveSpans_containedSpan_shouldStayNested() {
        // A [B [C C] A] B: C never crosses anything
        let r = resolve_spans(&[open("A"), open("B"), open("C"), close("C"), close("A"), close("B")]);
        assert_eq!(r.form(2), SpanForm::Nested);
        assert_eq!(r.form(3), SpanForm::Nested);
        assert_eq!(r.form(1), SpanForm::Split);
        assert_eq!(r.split_count(), 1);
    }

    #[test]
    fn test_resolveSpans_threeWayCrossing_shouldSplitEveryLaterSpan() {
        let r = resolve_spans(&[open("A"), open("B"), open("C"), close("A"), close("B"), close("C")]);
        assert_eq!(r.form(0), SpanForm::Nested);
        assert_eq!(r.form(1), SpanForm::Split);
        assert_eq!(r.form(2), SpanForm::Split);
        assert_eq!(r.partner(2), Some(5));
        assert_eq!(r.form(5), SpanForm::Split);
    }

    #[test]
    fn test_resolveSpans_unpaired_shouldBeIsolated() {
        let r = resolve_spans(&[close("X"), open("Y")]);
        assert_eq!(r.form(0), SpanForm::Isolated);
        assert_eq!(r.form(1), SpanForm::Isolated);
        assert_eq!(r.partner(0), None);
    }

    #[test]
    fn test_resolveSpans_familiesMatchSeparately() {
        let ann_open = SpanMarker::new(SpanFamily::Annotation, TagType::Opening, "1");
        let ann_close = SpanMarker::new(SpanFamily::Annotation, TagType::Closing, "1");
        let r = resolve_spans(&[open("1"), ann_open, close("1"), ann_close]);
        assert_eq!(r.partner(0), Some(2));
        assert_eq!(r.partner(1), Some(3));
        assert_eq!(r.form(1), SpanForm::Split);
    }
}
