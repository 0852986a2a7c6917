use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docsight::config::DocsightConfig;
use docsight::error::{DocsightError, DocsightResult};
use docsight::geometry::{self, OverlayPlacement, PageMetrics, PageReference};
use docsight::ocr::{AnalysisResult, BoundingBox, OcrBackend, TextSpan};
use docsight::overlay::OverlayState;
use docsight::render::{RenderSurface, SimulatedSurface, ViewerRenderState};
use docsight::session::SelectionOutcome;
use docsight::workspace::DocumentWorkspace;

/// OCR double returning a fixed result and counting invocations
struct ScriptedOcr {
    result: AnalysisResult,
    calls: AtomicUsize,
}

impl ScriptedOcr {
    fn new(result: AnalysisResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrBackend for ScriptedOcr {
    async fn analyze(&self, _bytes: &[u8]) -> DocsightResult<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }

    async fn analyze_url(&self, _url: &str) -> DocsightResult<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// Render surface wrapper counting navigation commands
struct CountingSurface {
    inner: SimulatedSurface,
    jumps: usize,
}

impl CountingSurface {
    fn new(inner: SimulatedSurface) -> Self {
        Self { inner, jumps: 0 }
    }
}

impl RenderSurface for CountingSurface {
    fn render_state(&self) -> ViewerRenderState {
        self.inner.render_state()
    }

    fn jump_to_page(&mut self, page_index: usize) {
        self.jumps += 1;
        self.inner.jump_to_page(page_index);
    }

    fn page_metrics(&self, page_index: usize) -> Option<PageMetrics> {
        self.inner.page_metrics(page_index)
    }
}

fn invoice_span() -> TextSpan {
    TextSpan {
        content: "Invoice #123".to_string(),
        bounding_box: BoundingBox::new(1.0, 1.0, 3.0, 1.5),
        confidence: Some(0.99),
        page: 1,
    }
}

fn invoice_result() -> AnalysisResult {
    AnalysisResult {
        extracted_texts: vec![invoice_span()],
        pages: 1,
    }
}

fn configured() -> DocsightConfig {
    let mut config = DocsightConfig::default();
    config.ocr.endpoint = "https://ocr.example.com".to_string();
    config.ocr.api_key = "test-key".to_string();
    config
}

fn temp_document(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"%PDF-1.4 stub bytes for identity only").unwrap();
    path
}

#[tokio::test]
async fn test_end_to_end_invoice_highlight() {
    // One page, one span, rendered at 612x792px (scale 1): clicking the
    // field must land the overlay on page index 0 at ~(72, 72, 144, 36)px
    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_document(&dir, "invoice.pdf");

    let backend = ScriptedOcr::new(invoice_result());
    let mut workspace = DocumentWorkspace::new(configured());

    assert_eq!(
        workspace.select_document(&pdf).unwrap(),
        SelectionOutcome::NeedsAnalysis
    );
    workspace.analyze_selected(&backend, b"bytes").await.unwrap();
    assert_eq!(workspace.fields().len(), 1);

    let mut surface = SimulatedSurface::new(1, PageMetrics::new(612.0, 792.0));
    let span = workspace.fields()[0].span.clone();
    workspace.field_clicked(&span, &mut surface);

    match workspace.overlay_state() {
        OverlayState::Visible { page_index, rect, .. } => {
            assert_eq!(*page_index, 0);

            // Percent rect corresponds to the padded pixel rect
            let expected_left = (72.0 / 612.0) * 100.0 - 0.2;
            assert!((rect.left_pct - expected_left).abs() < 1e-9);
        }
        other => panic!("expected Visible overlay, got {:?}", other),
    }

    // Pixel rectangle before percentage conversion
    match geometry::place(
        &span.bounding_box,
        PageReference::US_LETTER,
        Some(PageMetrics::new(612.0, 792.0)),
        72.0,
        0.2,
    ) {
        OverlayPlacement::Visible { pixels, .. } => {
            assert_eq!(pixels.left, 72.0);
            assert_eq!(pixels.top, 72.0);
            assert_eq!(pixels.width, 144.0);
            assert_eq!(pixels.height, 36.0);
        }
        OverlayPlacement::NotVisible => panic!("placement should be visible"),
    }
}

#[tokio::test]
async fn test_cache_hit_skips_second_backend_call() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_document(&dir, "invoice.pdf");

    let backend = ScriptedOcr::new(invoice_result());
    let mut workspace = DocumentWorkspace::new(configured());

    workspace.select_document(&pdf).unwrap();
    let first = workspace.analyze_selected(&backend, b"bytes").await.unwrap();
    assert_eq!(backend.calls(), 1);

    // Same identity tuple re-selected: cache hit, no second invocation,
    // identical result structure
    match workspace.select_document(&pdf).unwrap() {
        SelectionOutcome::CacheHit(cached) => {
            assert!(Arc::ptr_eq(&first, &cached));
        }
        other => panic!("expected cache hit, got {:?}", other),
    }
    let second = workspace.analyze_selected(&backend, b"bytes").await.unwrap();
    assert_eq!(backend.calls(), 1);
    assert_eq!(*first, *second);
}

#[tokio::test]
async fn test_configuration_missing_blocks_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_document(&dir, "invoice.pdf");

    let backend = ScriptedOcr::new(invoice_result());
    let mut workspace = DocumentWorkspace::new(DocsightConfig::default());

    workspace.select_document(&pdf).unwrap();
    let err = workspace
        .analyze_selected(&backend, b"bytes")
        .await
        .unwrap_err();
    assert!(matches!(err, DocsightError::ConfigurationMissing { .. }));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_duplicate_field_click_navigates_once() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_document(&dir, "invoice.pdf");

    let backend = ScriptedOcr::new(AnalysisResult {
        extracted_texts: vec![TextSpan {
            page: 3,
            ..invoice_span()
        }],
        pages: 3,
    });
    let mut workspace = DocumentWorkspace::new(configured());
    workspace.select_document(&pdf).unwrap();
    workspace.analyze_selected(&backend, b"bytes").await.unwrap();

    let span = workspace.fields()[0].span.clone();
    let mut surface =
        CountingSurface::new(SimulatedSurface::new(3, PageMetrics::new(612.0, 792.0)));

    workspace.field_clicked(&span, &mut surface);
    workspace.field_clicked(&span, &mut surface);

    assert_eq!(surface.jumps, 1);
    assert_eq!(surface.render_state().current_page_index, 2);
}

#[tokio::test]
async fn test_overlay_click_scrolls_back_to_field_entry() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_document(&dir, "invoice.pdf");

    let backend = ScriptedOcr::new(AnalysisResult {
        extracted_texts: vec![
            invoice_span(),
            TextSpan {
                content: "Invoice #123".to_string(),
                bounding_box: BoundingBox::new(4.0, 6.0, 6.0, 6.5),
                confidence: Some(0.91),
                page: 1,
            },
        ],
        pages: 1,
    });
    let mut workspace = DocumentWorkspace::new(configured());
    workspace.select_document(&pdf).unwrap();
    workspace.analyze_selected(&backend, b"bytes").await.unwrap();

    let mut surface = SimulatedSurface::new(1, PageMetrics::new(612.0, 792.0));

    // Highlight the second of two identically-worded fields
    let span = workspace.fields()[1].span.clone();
    workspace.field_clicked(&span, &mut surface);
    workspace.overlay_clicked(&mut surface);

    let scroll = workspace.take_scroll_target().expect("scroll target");
    let entry = workspace
        .scroll_focus_field(&scroll)
        .expect("matching field entry");
    assert_eq!(entry.id, "p1-f1");

    // Hand-off consumed the highlight
    assert_eq!(*workspace.overlay_state(), OverlayState::Hidden);
    assert!(workspace.take_scroll_target().is_none());
}

#[tokio::test]
async fn test_new_document_clears_highlight_state() {
    let dir = tempfile::tempdir().unwrap();
    let first_pdf = temp_document(&dir, "a.pdf");
    let second_pdf = temp_document(&dir, "b.pdf");

    let backend = ScriptedOcr::new(invoice_result());
    let mut workspace = DocumentWorkspace::new(configured());
    workspace.select_document(&first_pdf).unwrap();
    workspace.analyze_selected(&backend, b"bytes").await.unwrap();

    let mut surface = SimulatedSurface::new(1, PageMetrics::new(612.0, 792.0));
    let span = workspace.fields()[0].span.clone();
    workspace.field_clicked(&span, &mut surface);
    assert!(matches!(
        workspace.overlay_state(),
        OverlayState::Visible { .. }
    ));

    workspace.select_document(&second_pdf).unwrap();
    assert_eq!(*workspace.overlay_state(), OverlayState::Hidden);
    assert!(workspace.fields().is_empty());
    assert!(workspace.take_scroll_target().is_none());
}

#[tokio::test]
async fn test_json_view_shape() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_document(&dir, "invoice.pdf");

    let backend = ScriptedOcr::new(invoice_result());
    let mut workspace = DocumentWorkspace::new(configured());
    workspace.select_document(&pdf).unwrap();
    workspace.analyze_selected(&backend, b"bytes").await.unwrap();

    let json = workspace.json_view();
    let analysis = &json["documentAnalysis"];
    assert_eq!(analysis["pages"], 1);
    assert_eq!(analysis["totalTextElements"], 1);

    let entry = &analysis["extractedContent"][0];
    assert_eq!(entry["content"], "Invoice #123");
    assert_eq!(entry["boundingBox"]["xMin"], 1.0);
    assert_eq!(entry["boundingBox"]["width"], 2.0);
    assert_eq!(entry["boundingBox"]["height"], 0.5);
}
