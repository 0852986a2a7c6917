use regex::Regex;
use serde::Serialize;

use crate::ocr::TextSpan;

/// Best-effort semantic tag for display icons. Never consulted by the
/// highlight/overlay logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Date,
    Currency,
    Number,
    Text,
}

impl FieldKind {
    pub fn display_icon(&self) -> &'static str {
        match self {
            FieldKind::Date => "📅",
            FieldKind::Currency => "💰",
            FieldKind::Number => "#️⃣",
            FieldKind::Text => "📝",
        }
    }

    fn name_prefix(&self) -> &'static str {
        match self {
            FieldKind::Date => "Date",
            FieldKind::Currency => "Amount",
            FieldKind::Number => "Number",
            FieldKind::Text => "Text",
        }
    }
}

/// Display-ready field derived from one extracted span
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedField {
    /// Stable synthetic id, position-based (content can repeat)
    pub id: String,
    pub name: String,
    pub value: String,
    pub confidence: f64,
    pub page: u32,
    pub kind: FieldKind,
    /// The span this field was derived from, kept for highlight targeting
    pub span: TextSpan,
}

/// Pattern-based classifier for the display-only semantic pass
pub struct FieldClassifier {
    date_patterns: Vec<Regex>,
    currency_pattern: Regex,
    long_number_pattern: Regex,
}

impl FieldClassifier {
    pub fn new() -> Self {
        Self {
            date_patterns: vec![
                Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").unwrap(),
                Regex::new(r"\b\d{1,2}-\d{1,2}-\d{4}\b").unwrap(),
                Regex::new(r"(?i)\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b").unwrap(),
                Regex::new(r"(?i)\b\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{4}\b").unwrap(),
            ],
            currency_pattern: Regex::new(r"\$[\d,]+\.?\d*").unwrap(),
            long_number_pattern: Regex::new(r"\b\d{3,}\b").unwrap(),
        }
    }

    pub fn classify(&self, content: &str) -> FieldKind {
        if self.date_patterns.iter().any(|p| p.is_match(content)) {
            return FieldKind::Date;
        }
        if self.currency_pattern.is_match(content) {
            return FieldKind::Currency;
        }
        if self.long_number_pattern.is_match(content) && !content.contains('$') {
            return FieldKind::Number;
        }
        FieldKind::Text
    }
}

impl Default for FieldClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert the ordered span sequence into the page-grouped field list.
///
/// Stable sort ascending by page; within a page spans keep backend order.
/// Ids are `p{page}-f{index}` composites so the UI can address an exact
/// entry even when two fields carry identical text.
pub fn extract_fields(spans: &[TextSpan]) -> Vec<ExtractedField> {
    let classifier = FieldClassifier::new();

    let mut ordered: Vec<&TextSpan> = spans.iter().collect();
    ordered.sort_by_key(|s| s.page);

    let mut fields = Vec::with_capacity(ordered.len());
    let mut current_page = 0;
    let mut index_on_page = 0;

    for span in ordered {
        if span.page != current_page {
            current_page = span.page;
            index_on_page = 0;
        }

        let kind = classifier.classify(span.content.trim());
        fields.push(ExtractedField {
            id: format!("p{}-f{}", span.page, index_on_page),
            name: format!("{}_{}", kind.name_prefix(), fields.len() + 1),
            value: span.content.trim().to_string(),
            confidence: span.confidence.unwrap_or(0.95),
            page: span.page,
            kind,
            span: span.clone(),
        });
        index_on_page += 1;
    }

    fields
}

/// Find the list entry for a scroll request. Content equality alone is not
/// enough to identify a unique field, so the box origin breaks ties.
pub fn find_field<'a>(
    fields: &'a [ExtractedField],
    span: &TextSpan,
) -> Option<&'a ExtractedField> {
    fields.iter().find(|f| {
        f.span.content == span.content && f.span.bounding_box.same_origin(&span.bounding_box)
    })
}

/// Page-grouped view of an already extracted field list
pub fn fields_by_page(fields: &[ExtractedField]) -> Vec<(u32, Vec<&ExtractedField>)> {
    let mut pages: Vec<(u32, Vec<&ExtractedField>)> = Vec::new();
    for field in fields {
        match pages.last_mut() {
            Some((page, entries)) if *page == field.page => entries.push(field),
            _ => pages.push((field.page, vec![field])),
        }
    }
    pages
}
