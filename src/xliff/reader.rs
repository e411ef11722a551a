/*!
 * Inline markup reader.
 *
 * A regex tokenizer splits the markup into text runs and element tags; an
 * element stack pairs `<pc>`/`</pc>` and `<mrk>`/`</mrk>`. Everything else
 * (`sc`, `ec`, `ph`, `sm`, `em`, `cp`) is an empty element.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::errors::{FragmentError, MarkupError};
use crate::model::fragment::Fragment;
use crate::model::markers::TagKey;
use crate::model::metadata::{
    AnnotationKind, FilterMode, LocaleFilter, MatchQuality, Metadata, Provenance, QualityIssue, TermInfo,
};
use crate::model::store::{DataRefMap, Side, Store};
use crate::model::tag::{CTag, Directionality, MTag, Tag, TagType};

/// Any element tag, well-formed or not
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]*>").unwrap());

/// Parts of a well-formed element tag
static ELEMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^<(/?)([A-Za-z_][\w.:-]*)((?:\s+[A-Za-z_][\w.:-]*\s*=\s*"[^"]*")*)\s*(/?)>$"#).unwrap()
});

static ATTRIBUTE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_][\w.:-]*)\s*=\s*"([^"]*)""#).unwrap());

/// Decode the five predefined entities and numeric character references.
pub fn unescape(text: &str, offset: usize) -> Result<String, MarkupError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut consumed = 0;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let malformed = |reason: String| MarkupError::Malformed {
            offset: offset + consumed + amp,
            reason,
        };
        let Some(semi) = rest[amp..].find(';') else {
            return Err(malformed("unterminated entity reference".to_string()));
        };
        let name = &rest[amp + 1..amp + semi];
        let c = match name {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = name.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| malformed(format!("unknown entity '&{};'", name)))?
            }
        };
        out.push(c);
        consumed += amp + semi + 1;
        rest = &rest[amp + semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// One parsed element tag
#[derive(Debug)]
struct Element {
    name: String,
    closing: bool,
    empty: bool,
    attributes: Vec<(String, String)>,
    offset: usize,
}

impl Element {
    fn parse(raw: &str, offset: usize) -> Result<Self, MarkupError> {
        let caps = ELEMENT_REGEX.captures(raw).ok_or_else(|| MarkupError::Malformed {
            offset,
            reason: format!("cannot parse tag '{}'", raw),
        })?;
        let closing = !caps[1].is_empty();
        let empty = !caps[4].is_empty();
        if closing && (empty || !caps[3].trim().is_empty()) {
            return Err(MarkupError::Malformed {
                offset,
                reason: format!("closing tag with attributes or slash: '{}'", raw),
            });
        }
        let mut attributes = Vec::new();
        for attr in ATTRIBUTE_REGEX.captures_iter(&caps[3]) {
            let value = unescape(&attr[2], offset)?;
            attributes.push((attr[1].to_string(), value));
        }
        Ok(Self {
            name: caps[2].to_string(),
            closing,
            empty,
            attributes,
            offset,
        })
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn required(&self, name: &str) -> Result<&str, MarkupError> {
        self.attr(name).ok_or_else(|| MarkupError::Malformed {
            offset: self.offset,
            reason: format!("<{}> needs a '{}' attribute", self.name, name),
        })
    }

    fn flag(&self, name: &str) -> Result<Option<bool>, MarkupError> {
        match self.attr(name) {
            None => Ok(None),
            Some("yes") => Ok(Some(true)),
            Some("no") => Ok(Some(false)),
            Some(other) => Err(FragmentError::invalid_attribute(name, other).into()),
        }
    }
}

fn parse_number(name: &str, value: &str) -> Result<f64, MarkupError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| FragmentError::invalid_attribute(name, value).into())
}

/// Metadata groups in order of first appearance
#[derive(Default)]
struct MetadataBuilder {
    order: Vec<&'static str>,
    comment: (Option<String>, Option<String>),
    term: TermInfo,
    quality: MatchQuality,
    issue: QualityIssue,
    filter: LocaleFilter,
    provenance: Provenance,
    opaque: BTreeMap<String, BTreeMap<String, String>>,
    opaque_order: Vec<String>,
}

impl MetadataBuilder {
    fn touch(&mut self, group: &'static str) {
        if !self.order.contains(&group) {
            self.order.push(group);
        }
    }

    fn take(&mut self, kind: &AnnotationKind, name: &str, value: &str) -> Result<bool, MarkupError> {
        let owned = || Some(value.to_string());
        match name {
            "value" if *kind == AnnotationKind::Comment => {
                self.touch("comment");
                self.comment.0 = owned();
            }
            "ref" if *kind == AnnotationKind::Comment => {
                self.touch("comment");
                self.comment.1 = owned();
            }
            "value" if kind.is_term() => {
                self.touch("term");
                self.term.info = owned();
            }
            "its:termInfoRef" => {
                self.touch("term");
                self.term.info_ref = owned();
            }
            "its:termConfidence" => {
                self.touch("term");
                self.term.confidence = Some(parse_number(name, value)?);
            }
            "its:annotatorsRef" => {
                self.touch("term");
                // Only the terminology annotator is kept
                self.term.annotator_ref = value
                    .split_whitespace()
                    .find_map(|part| part.strip_prefix("terminology|"))
                    .map(str::to_string);
            }
            "mtc:similarity" => {
                self.touch("quality");
                self.quality.similarity = Some(parse_number(name, value)?);
            }
            "its:mtConfidence" => {
                self.touch("quality");
                self.quality.mt_confidence = Some(parse_number(name, value)?);
            }
            "mtc:origin" => {
                self.touch("quality");
                self.quality.origin = owned();
            }
            "its:locQualityIssueType" => {
                self.touch("issue");
                self.issue.issue_type = owned();
            }
            "its:locQualityIssueComment" => {
                self.touch("issue");
                self.issue.comment = owned();
            }
            "its:locQualityIssueSeverity" => {
                self.touch("issue");
                self.issue.severity = Some(parse_number(name, value)?);
            }
            "its:locQualityIssueProfileRef" => {
                self.touch("issue");
                self.issue.profile_ref = owned();
            }
            "its:locQualityIssueEnabled" => {
                self.touch("issue");
                self.issue.enabled = value != "no";
            }
            "its:localeFilterList" => {
                self.touch("filter");
                self.filter.locales = LocaleFilter::parse_list(value);
            }
            "its:localeFilterType" => {
                self.touch("filter");
                self.filter.mode = match value {
                    "include" => FilterMode::Include,
                    "exclude" => FilterMode::Exclude,
                    other => return Err(FragmentError::invalid_attribute(name, other).into()),
                };
            }
            "its:person" => self.provenance_field(|p| p.person = owned()),
            "its:org" => self.provenance_field(|p| p.org = owned()),
            "its:tool" => self.provenance_field(|p| p.tool = owned()),
            "its:revPerson" => self.provenance_field(|p| p.rev_person = owned()),
            "its:revOrg" => self.provenance_field(|p| p.rev_org = owned()),
            "its:revTool" => self.provenance_field(|p| p.rev_tool = owned()),
            "its:provRef" => self.provenance_field(|p| p.prov_ref = owned()),
            other => match other.split_once(':') {
                Some((prefix, _)) if prefix != "xmlns" && prefix != "xml" => {
                    if !self.opaque.contains_key(prefix) {
                        self.opaque_order.push(prefix.to_string());
                        self.touch("opaque");
                    }
                    self.opaque
                        .entry(prefix.to_string())
                        .or_default()
                        .insert(other.to_string(), value.to_string());
                }
                _ => return Ok(false),
            },
        }
        Ok(true)
    }

    fn provenance_field(&mut self, set: impl FnOnce(&mut Provenance)) {
        self.touch("provenance");
        set(&mut self.provenance);
    }

    fn build(self) -> Vec<Metadata> {
        let mut items = Vec::new();
        let Self {
            order,
            comment,
            term,
            quality,
            issue,
            filter,
            provenance,
            mut opaque,
            opaque_order,
        } = self;
        for group in order {
            match group {
                "comment" => items.push(Metadata::Comment {
                    text: comment.0.clone(),
                    note_ref: comment.1.clone(),
                }),
                "term" => items.push(Metadata::Term(term.clone())),
                "quality" => items.push(Metadata::MatchQuality(quality.clone())),
                "issue" => items.push(Metadata::QualityIssue(issue.clone())),
                "filter" => items.push(Metadata::LocaleFilter(filter.clone())),
                "provenance" => items.push(Metadata::Provenance(provenance.clone())),
                _ => {
                    for prefix in &opaque_order {
                        if let Some(attributes) = opaque.remove(prefix) {
                            items.push(Metadata::Opaque {
                                prefix: prefix.clone(),
                                attributes,
                            });
                        }
                    }
                }
            }
        }
        items
    }
}

/// Element left open on the stack
#[derive(Debug)]
enum Open {
    Code { id: String, end: Element },
    Annotation { id: String },
}

/// Rebuilds fragments from XLIFF 2 inline markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineReader<'m> {
    /// Original data for `dataRef` attributes; without it codes get no data
    pub data_refs: Option<&'m DataRefMap>,
}

impl<'m> InlineReader<'m> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_refs(data_refs: &'m DataRefMap) -> Self {
        Self {
            data_refs: Some(data_refs),
        }
    }

    /// Read markup into a new fragment of `side`, registering its tags in `store`.
    pub fn read(&self, markup: &str, store: &mut Store, side: Side) -> Result<Fragment, MarkupError> {
        let mut fragment = Fragment::new(side);
        let mut stack: Vec<Open> = Vec::new();
        let mut last = 0;
        for m in TAG_REGEX.find_iter(markup) {
            self.read_text(&mut fragment, &markup[last..m.start()], last)?;
            last = m.end();
            let element = Element::parse(m.as_str(), m.start())?;
            self.read_element(&mut fragment, store, &mut stack, element)?;
        }
        self.read_text(&mut fragment, &markup[last..], last)?;
        if let Some(open) = stack.last() {
            let id = match open {
                Open::Code { id, .. } | Open::Annotation { id } => id,
            };
            return Err(MarkupError::Malformed {
                offset: markup.len(),
                reason: format!("element with id '{}' is never closed", id),
            });
        }
        debug!("Read {} chars of markup into {} coded chars", markup.len(), fragment.len());
        Ok(fragment)
    }

    fn read_text(&self, fragment: &mut Fragment, text: &str, offset: usize) -> Result<(), MarkupError> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(n) = text.find('<') {
            return Err(MarkupError::Malformed {
                offset: offset + n,
                reason: "stray '<' in text".to_string(),
            });
        }
        fragment.append(&unescape(text, offset)?);
        Ok(())
    }

    fn data(&self, element: &Element, attribute: &str) -> Result<Option<(String, Directionality)>, MarkupError> {
        let (Some(id), Some(map)) = (element.attr(attribute), self.data_refs) else {
            return Ok(None);
        };
        let entry = map
            .resolve(id)
            .ok_or_else(|| MarkupError::from(FragmentError::invalid_attribute(attribute, id)))?;
        Ok(Some((entry.data.clone(), entry.dir)))
    }

    /// Apply span attributes shared by `pc`, `sc`, `ec` and `ph`
    fn apply_code_attributes(&self, code: &mut CTag, element: &Element) -> Result<(), MarkupError> {
        if let Some(t) = element.attr("type") {
            code.code_type = Some(t.parse()?);
        }
        code.set_sub_type(element.attr("subType"))?;
        if let Some(reorder) = element.attr("canReorder") {
            code.set_can_reorder(reorder.parse()?);
        }
        if let Some(copy) = element.flag("canCopy")? {
            code.can_copy = copy;
        }
        if let Some(delete) = element.flag("canDelete")? {
            code.can_delete = delete;
        }
        if let Some(overlap) = element.flag("canOverlap")? {
            code.can_overlap = overlap;
        }
        code.copy_of = element.attr("copyOf").map(str::to_string);
        if let Some(dir) = element.attr("dir") {
            code.dir = dir.parse()?;
        }
        for (name, value) in &element.attributes {
            if let Some((prefix, _)) = name.split_once(':') {
                if prefix != "xmlns" && prefix != "xml" {
                    code.ext_attributes.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    /// Apply the per-half hints: `disp`, `equiv`, `subFlows`, with a name suffix
    fn apply_hints(&self, code: &mut CTag, element: &Element, suffix: &str) {
        code.disp = element.attr(&format!("disp{}", suffix)).map(str::to_string);
        if let Some(equiv) = element.attr(&format!("equiv{}", suffix)) {
            code.equiv = equiv.to_string();
        }
        code.set_sub_flows(element.attr(&format!("subFlows{}", suffix)));
    }

    fn build_code(&self, tag_type: TagType, id: &str, element: &Element, suffix: &str) -> Result<CTag, MarkupError> {
        let data = self.data(element, &format!("dataRef{}", suffix))?;
        let mut code = CTag::new(tag_type, id, data.as_ref().map(|(d, _)| d.as_str()));
        if let Some((_, dir)) = data {
            code.data_dir = dir;
        }
        self.apply_code_attributes(&mut code, element)?;
        self.apply_hints(&mut code, element, suffix);
        code.isolated = element.flag("isolated")?.unwrap_or(false);
        Ok(code)
    }

    fn build_annotation(&self, element: &Element) -> Result<MTag, MarkupError> {
        let id = element.required("id")?;
        let kind: AnnotationKind = match element.attr("type") {
            Some(t) => t.parse()?,
            None => AnnotationKind::Generic,
        };
        let mut marker = MTag::opening(id, kind.clone());
        marker.translate = element.flag("translate")?;
        let mut builder = MetadataBuilder::default();
        for (name, value) in &element.attributes {
            match name.as_str() {
                "id" | "type" | "translate" => {}
                _ if builder.take(&kind, name, value)? => {}
                "value" => marker.value = Some(value.clone()),
                "ref" => marker.reference = Some(value.clone()),
                other => return Err(FragmentError::invalid_attribute(other, value).into()),
            }
        }
        for item in builder.build() {
            marker.add_metadata(item)?;
        }
        Ok(marker)
    }

    fn read_element(
        &self,
        fragment: &mut Fragment,
        store: &mut Store,
        stack: &mut Vec<Open>,
        element: Element,
    ) -> Result<(), MarkupError> {
        let unexpected_close = |element: &Element| MarkupError::Malformed {
            offset: element.offset,
            reason: format!("unexpected closing tag </{}>", element.name),
        };
        match (element.name.as_str(), element.closing) {
            ("pc", false) => {
                let id = element.required("id")?.to_string();
                let code = self.build_code(TagType::Opening, &id, &element, "Start")?;
                fragment.append_tag(store, code.into())?;
                if element.empty {
                    self.close_pc(fragment, store, &id, &element)?;
                } else {
                    stack.push(Open::Code { id, end: element });
                }
            }
            ("pc", true) => match stack.pop() {
                Some(Open::Code { id, end }) => self.close_pc(fragment, store, &id, &end)?,
                _ => return Err(unexpected_close(&element)),
            },
            ("mrk", false) => {
                let marker = self.build_annotation(&element)?;
                let id = marker.id().to_string();
                fragment.append_tag(store, marker.into())?;
                if element.empty {
                    fragment.close_annotation(store, &id)?;
                } else {
                    stack.push(Open::Annotation { id });
                }
            }
            ("mrk", true) => match stack.pop() {
                Some(Open::Annotation { id }) => {
                    fragment.close_annotation(store, &id)?;
                }
                _ => return Err(unexpected_close(&element)),
            },
            (_, true) => return Err(unexpected_close(&element)),
            ("sc", _) => {
                let id = element.required("id")?;
                let code = self.build_code(TagType::Opening, id, &element, "")?;
                fragment.append_tag(store, code.into())?;
            }
            ("ec", _) => self.read_ec(fragment, store, &element)?,
            ("ph", _) => {
                let id = element.required("id")?;
                let code = self.build_code(TagType::Standalone, id, &element, "")?;
                fragment.append_tag(store, code.into())?;
            }
            ("sm", _) => {
                let marker = self.build_annotation(&element)?;
                fragment.append_tag(store, marker.into())?;
            }
            ("em", _) => {
                let id = element.required("startRef")?;
                match fragment.close_annotation(store, id) {
                    Ok(_) => {}
                    Err(FragmentError::UnmatchedCloseTag { .. }) => {
                        fragment.append_tag(store, MTag::orphan_closing(id).into())?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ("cp", _) => {
                let hex = element.required("hex")?;
                let c = u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| MarkupError::from(FragmentError::invalid_attribute("hex", hex)))?;
                fragment.append_char(c);
            }
            (name, false) => {
                return Err(MarkupError::UnsupportedElement {
                    element: name.to_string(),
                    offset: element.offset,
                });
            }
        }
        Ok(())
    }

    fn close_pc(&self, fragment: &mut Fragment, store: &mut Store, id: &str, start: &Element) -> Result<(), MarkupError> {
        let data = self.data(start, "dataRefEnd")?;
        let key = fragment.close_code(store, id, data.as_ref().map(|(d, _)| d.as_str()))?;
        if let Tag::Code(code) = store.get_mut(fragment.side(), key)? {
            if let Some((_, dir)) = data {
                code.data_dir = dir;
            }
            self.apply_hints(code, start, "End");
        }
        Ok(())
    }

    fn read_ec(&self, fragment: &mut Fragment, store: &mut Store, element: &Element) -> Result<(), MarkupError> {
        if let Some(start_ref) = element.attr("startRef") {
            let data = self.data(element, "dataRef")?;
            let key = match fragment.close_code(store, start_ref, data.as_ref().map(|(d, _)| d.as_str())) {
                Ok(key) => key,
                Err(FragmentError::UnmatchedCloseTag { .. }) if self.opened_earlier(fragment, store, start_ref) => {
                    self.close_earlier_opening(fragment, store, start_ref, data.as_ref().map(|(d, _)| d.as_str()))?
                }
                Err(e) => return Err(e.into()),
            };
            if let Tag::Code(code) = store.get_mut(fragment.side(), key)? {
                if let Some((_, dir)) = data {
                    code.data_dir = dir;
                }
                self.apply_hints(code, element, "");
                code.isolated = element.flag("isolated")?.unwrap_or(false);
            }
            return Ok(());
        }
        let id = element.required("id")?;
        if element.flag("isolated")? != Some(true) {
            return Err(MarkupError::Malformed {
                offset: element.offset,
                reason: "<ec> needs startRef, or id with isolated=\"yes\"".to_string(),
            });
        }
        let code = self.build_code(TagType::Closing, id, element, "")?;
        fragment.append_tag(store, code.into())?;
        Ok(())
    }

    /// An opening code with this id exists on the fragment's side, outside the fragment
    fn opened_earlier(&self, fragment: &Fragment, store: &Store, id: &str) -> bool {
        store
            .tags(fragment.side())
            .and_then(|tags| tags.opening_key(id))
            .is_some_and(|key| !fragment.coded_text().contains(&key.to_ref()))
    }

    /// Close a span opened in an earlier fragment of the unit
    fn close_earlier_opening(
        &self,
        fragment: &mut Fragment,
        store: &mut Store,
        id: &str,
        data: Option<&str>,
    ) -> Result<TagKey, MarkupError> {
        let closing = {
            let tags = store.tags(fragment.side()).ok_or_else(|| FragmentError::UnmatchedCloseTag {
                id: id.to_string(),
                position: fragment.len(),
            })?;
            let opener = tags.opening_key(id).ok_or_else(|| FragmentError::UnmatchedCloseTag {
                id: id.to_string(),
                position: fragment.len(),
            })?;
            CTag::closing_for(tags.code(opener)?, data)
        };
        Ok(fragment.append_tag(store, closing.into())?)
    }
}
