/*!
 * XLIFF 2 inline serialization.
 *
 * Nested code pairs become `<pc>`, split or isolated codes `<sc>`/`<ec>`,
 * standalone codes `<ph>`. Nested annotations become `<mrk>`, the others
 * `<sm>`/`<em>`. Literal text is escaped; chars XML cannot carry are
 * written as `<cp hex="..."/>`.
 */

use std::fmt::Write as _;

use crate::errors::FragmentError;
use crate::model::fragment::Fragment;
use crate::model::metadata::{AnnotationKind, Metadata};
use crate::model::store::{DataRefMap, Store};
use crate::model::tag::{CTag, CanReorder, MTag, Tag};
use crate::render::overlap::SpanForm;
use crate::render::{FragmentObject, Renderer, TagEvent};

/// Escape literal text for element content
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\r' => out.push_str("&#13;"),
            c if !is_xml_char(c) => {
                let _ = write!(out, "<cp hex=\"{:04X}\"/>", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape a value for a double-quoted attribute
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    out
}

/// Chars allowed in XML 1.0 documents
pub fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Attribute list under construction
#[derive(Default)]
struct Attributes(String);

impl Attributes {
    fn add(&mut self, name: &str, value: &str) -> &mut Self {
        let _ = write!(self.0, " {}=\"{}\"", name, escape_attribute(value));
        self
    }

    fn add_opt(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.add(name, v);
        }
        self
    }
}

/// Serializes fragments as XLIFF 2 inline content
#[derive(Debug, Clone, Default)]
pub struct XliffWriter {
    /// Reference original data through `dataRef` attributes
    pub with_original_data: bool,
}

impl XliffWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_original_data(mut self, value: bool) -> Self {
        self.with_original_data = value;
        self
    }

    /// Render a fragment, protected content shown in place.
    pub fn render_fragment(&self, fragment: &Fragment, store: &Store) -> Result<String, FragmentError> {
        let renderer = Renderer::with_protected_content(fragment, store)?;
        let data_ids = self.with_original_data.then(|| store.data_ids());
        Ok(self.render_objects(renderer.objects(), data_ids.as_ref()))
    }

    /// Serialize already resolved objects.
    pub fn render_objects(&self, objects: &[FragmentObject<'_>], data_ids: Option<&DataRefMap>) -> String {
        let mut out = String::new();
        for object in objects {
            match object {
                FragmentObject::Text(text) => out.push_str(&escape_text(text)),
                FragmentObject::Protected { content, .. } => {
                    // Opaque content has no inline representation of its own
                    out.push_str(&escape_text(&crate::model::markers::strip_markers(&content.coded_text)));
                }
                FragmentObject::Opening(e) => self.write_opening(&mut out, e, data_ids),
                FragmentObject::Closing(e) => self.write_closing(&mut out, e, data_ids),
                FragmentObject::Standalone(e) => self.write_standalone(&mut out, e, data_ids),
            }
        }
        out
    }

    fn data_ref<'m>(&self, code: &CTag, data_ids: Option<&'m DataRefMap>) -> Option<&'m str> {
        data_ids.and_then(|map| map.id_for(code))
    }

    /// Attributes shared by both halves of a code span
    fn code_common(attrs: &mut Attributes, code: &CTag) {
        attrs.add_opt("type", code.code_type.map(|t| t.as_str()));
        attrs.add_opt("subType", code.sub_type());
        if !code.can_copy {
            attrs.add("canCopy", "no");
        }
        if !code.can_delete {
            attrs.add("canDelete", "no");
        }
        if code.can_reorder() != CanReorder::Yes {
            attrs.add("canReorder", code.can_reorder().as_str());
        }
    }

    fn code_tail(attrs: &mut Attributes, code: &CTag) {
        attrs.add_opt("copyOf", code.copy_of.as_deref());
        attrs.add_opt("dir", code.dir.as_str());
        for (name, value) in &code.ext_attributes {
            attrs.add(name, value);
        }
    }

    /// Display, equivalent text, data reference and sub-flows, with a name suffix
    fn code_hints(&self, attrs: &mut Attributes, code: &CTag, suffix: &str, data_ids: Option<&DataRefMap>) {
        attrs.add_opt(&format!("disp{}", suffix), code.disp.as_deref());
        if !code.equiv.is_empty() {
            attrs.add(&format!("equiv{}", suffix), &code.equiv);
        }
        attrs.add_opt(&format!("dataRef{}", suffix), self.data_ref(code, data_ids));
        attrs.add_opt(&format!("subFlows{}", suffix), code.sub_flows());
    }

    fn write_opening(&self, out: &mut String, e: &TagEvent<'_>, data_ids: Option<&DataRefMap>) {
        match e.tag {
            Tag::Code(code) => {
                let mut attrs = Attributes::default();
                attrs.add("id", code.id());
                Self::code_common(&mut attrs, code);
                match e.form {
                    SpanForm::Nested => {
                        if code.can_overlap {
                            attrs.add("canOverlap", "yes");
                        }
                        Self::code_tail(&mut attrs, code);
                        self.code_hints(&mut attrs, code, "Start", data_ids);
                        if let Some(Tag::Code(end)) = e.partner {
                            attrs.add_opt("dispEnd", end.disp.as_deref());
                            if !end.equiv.is_empty() {
                                attrs.add("equivEnd", &end.equiv);
                            }
                            attrs.add_opt("dataRefEnd", self.data_ref(end, data_ids));
                            attrs.add_opt("subFlowsEnd", end.sub_flows());
                        }
                        let _ = write!(out, "<pc{}>", attrs.0);
                    }
                    SpanForm::Split => {
                        attrs.add("canOverlap", "no");
                        Self::code_tail(&mut attrs, code);
                        self.code_hints(&mut attrs, code, "", data_ids);
                        let _ = write!(out, "<sc{}/>", attrs.0);
                    }
                    SpanForm::Isolated => {
                        Self::code_tail(&mut attrs, code);
                        if e.isolated() {
                            attrs.add("isolated", "yes");
                        }
                        self.code_hints(&mut attrs, code, "", data_ids);
                        let _ = write!(out, "<sc{}/>", attrs.0);
                    }
                }
            }
            Tag::Annotation(marker) => {
                let attrs = Self::marker_attributes(marker);
                match e.form {
                    SpanForm::Nested => {
                        let _ = write!(out, "<mrk{}>", attrs.0);
                    }
                    SpanForm::Split | SpanForm::Isolated => {
                        let _ = write!(out, "<sm{}/>", attrs.0);
                    }
                }
            }
        }
    }

    fn write_closing(&self, out: &mut String, e: &TagEvent<'_>, data_ids: Option<&DataRefMap>) {
        match (e.tag, e.form) {
            (Tag::Code(_), SpanForm::Nested) => out.push_str("</pc>"),
            (Tag::Code(code), SpanForm::Split) => {
                let mut attrs = Attributes::default();
                attrs.add("startRef", code.id()).add("canOverlap", "no").add("isolated", "yes");
                self.code_hints(&mut attrs, code, "", data_ids);
                let _ = write!(out, "<ec{}/>", attrs.0);
            }
            (Tag::Code(code), SpanForm::Isolated) if e.paired_in_unit => {
                // The opening is in an earlier fragment of the unit
                let mut attrs = Attributes::default();
                attrs.add("startRef", code.id());
                self.code_hints(&mut attrs, code, "", data_ids);
                let _ = write!(out, "<ec{}/>", attrs.0);
            }
            (Tag::Code(code), SpanForm::Isolated) => {
                let mut attrs = Attributes::default();
                attrs.add("id", code.id()).add("isolated", "yes");
                Self::code_common(&mut attrs, code);
                Self::code_tail(&mut attrs, code);
                self.code_hints(&mut attrs, code, "", data_ids);
                let _ = write!(out, "<ec{}/>", attrs.0);
            }
            (Tag::Annotation(_), SpanForm::Nested) => out.push_str("</mrk>"),
            (Tag::Annotation(marker), _) => {
                let _ = write!(out, "<em startRef=\"{}\"/>", escape_attribute(marker.id()));
            }
        }
    }

    fn write_standalone(&self, out: &mut String, e: &TagEvent<'_>, data_ids: Option<&DataRefMap>) {
        if let Tag::Code(code) = e.tag {
            let mut attrs = Attributes::default();
            attrs.add("id", code.id());
            Self::code_common(&mut attrs, code);
            Self::code_tail(&mut attrs, code);
            self.code_hints(&mut attrs, code, "", data_ids);
            let _ = write!(out, "<ph{}/>", attrs.0);
        }
    }

    fn marker_attributes(marker: &MTag) -> Attributes {
        let mut attrs = Attributes::default();
        attrs.add("id", marker.id());
        attrs.add_opt("translate", marker.translate.map(yes_no));
        if marker.kind != AnnotationKind::Generic {
            attrs.add("type", marker.kind.as_str());
        }

        let comment = marker.metadata().iter().find_map(|m| match m {
            Metadata::Comment { text, note_ref } => Some((text.as_deref(), note_ref.as_deref())),
            _ => None,
        });
        let term_info = marker.metadata().iter().find_map(|m| match m {
            Metadata::Term(term) => term.info.as_deref(),
            _ => None,
        });
        let value = marker
            .value
            .as_deref()
            .or(comment.and_then(|c| c.0))
            .or(term_info);
        let reference = marker.reference.as_deref().or(comment.and_then(|c| c.1));
        attrs.add_opt("value", value);
        attrs.add_opt("ref", reference);

        for item in marker.metadata() {
            Self::metadata_attributes(&mut attrs, item);
        }
        attrs
    }

    fn metadata_attributes(attrs: &mut Attributes, item: &Metadata) {
        match item {
            Metadata::Comment { .. } => {}
            Metadata::Term(term) => {
                attrs.add_opt("its:termInfoRef", term.info_ref.as_deref());
                if let Some(confidence) = term.confidence {
                    attrs.add("its:termConfidence", &confidence.to_string());
                }
                if let Some(annotator) = &term.annotator_ref {
                    attrs.add("its:annotatorsRef", &format!("terminology|{}", annotator));
                }
            }
            Metadata::MatchQuality(quality) => {
                if let Some(similarity) = quality.similarity {
                    attrs.add("mtc:similarity", &similarity.to_string());
                }
                if let Some(confidence) = quality.mt_confidence {
                    attrs.add("its:mtConfidence", &confidence.to_string());
                }
                attrs.add_opt("mtc:origin", quality.origin.as_deref());
            }
            Metadata::QualityIssue(issue) => {
                attrs.add_opt("its:locQualityIssueType", issue.issue_type.as_deref());
                attrs.add_opt("its:locQualityIssueComment", issue.comment.as_deref());
                if let Some(severity) = issue.severity {
                    attrs.add("its:locQualityIssueSeverity", &severity.to_string());
                }
                attrs.add_opt("its:locQualityIssueProfileRef", issue.profile_ref.as_deref());
                if !issue.enabled {
                    attrs.add("its:locQualityIssueEnabled", "no");
                }
            }
            Metadata::LocaleFilter(filter) => {
                attrs.add("its:localeFilterList", &filter.to_list());
                attrs.add("its:localeFilterType", filter.mode.as_str());
            }
            Metadata::Provenance(prov) => {
                attrs.add_opt("its:person", prov.person.as_deref());
                attrs.add_opt("its:org", prov.org.as_deref());
                attrs.add_opt("its:tool", prov.tool.as_deref());
                attrs.add_opt("its:revPerson", prov.rev_person.as_deref());
                attrs.add_opt("its:revOrg", prov.rev_org.as_deref());
                attrs.add_opt("its:revTool", prov.rev_tool.as_deref());
                attrs.add_opt("its:provRef", prov.prov_ref.as_deref());
            }
            Metadata::Opaque { attributes, .. } => {
                for (name, value) in attributes {
                    attrs.add(name, value);
                }
            }
        }
    }
}
