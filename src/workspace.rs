use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::DocsightConfig;
use crate::error::{DocsightError, DocsightResult};
use crate::fields::{self, ExtractedField};
use crate::ocr::{AnalysisResult, OcrBackend, TextSpan};
use crate::overlay::{
    HighlightTarget, OverlayCommand, OverlayEvent, OverlayMachine, OverlayState, ScrollTarget,
};
use crate::pdf;
use crate::render::RenderSurface;
use crate::session::{AnalysisSession, SelectionOutcome};
use crate::{geometry::PageMetrics, session::CompletionOutcome};

/// Top-level glue: wires document selection, the OCR session, the overlay
/// state machine, and the scroll/tab focus hand-off. One instance per
/// viewing session, driven from the UI event loop.
pub struct DocumentWorkspace {
    config: DocsightConfig,
    session: AnalysisSession,
    overlay: OverlayMachine,
    scroll_target: Option<ScrollTarget>,
    fields: Vec<ExtractedField>,
}

impl DocumentWorkspace {
    pub fn new(config: DocsightConfig) -> Self {
        let overlay = OverlayMachine::new(
            config.page_reference(),
            config.ocr.unit_scale,
            config.overlay.padding_pct,
        );
        Self {
            config,
            session: AnalysisSession::new(),
            overlay,
            scroll_target: None,
            fields: Vec::new(),
        }
    }

    // ----- configuration state -----

    pub fn configuration_missing(&self) -> bool {
        !self.config.is_ocr_configured()
    }

    fn require_configuration(&self) -> DocsightResult<()> {
        let missing = self.config.missing_ocr_settings();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DocsightError::configuration_missing(missing.join(", ")))
        }
    }

    // ----- document selection & analysis -----

    /// Select a document: clear highlight and scroll state, pick up the
    /// document's own page size when it has one, and restore a cached
    /// analysis when this identity was seen before.
    pub fn select_document(&mut self, path: &Path) -> DocsightResult<SelectionOutcome> {
        let identity = crate::session::FileIdentity::from_path(path)?;

        match pdf::probe(path) {
            Ok(probed) => {
                if let Some(reference) = probed.reference {
                    self.overlay.set_page_reference(reference);
                } else {
                    self.overlay.set_page_reference(self.config.page_reference());
                }
            }
            Err(DocsightError::InvalidFormat { format }) => {
                warn!(%format, "PDF probe failed, keeping configured page reference");
                self.overlay.set_page_reference(self.config.page_reference());
            }
            Err(other) => return Err(other),
        }

        self.overlay.handle(OverlayEvent::TargetCleared);
        self.scroll_target = None;

        let outcome = self.session.select_document(identity);
        match &outcome {
            SelectionOutcome::CacheHit(result) => {
                self.fields = fields::extract_fields(&result.extracted_texts);
            }
            SelectionOutcome::NeedsAnalysis => self.fields.clear(),
        }
        Ok(outcome)
    }

    /// Run OCR for the selected document unless the cache already holds a
    /// result. The in-flight guard rejects re-submission; a result landing
    /// after the user moved on is discarded, never displayed.
    pub async fn analyze_selected(
        &mut self,
        backend: &dyn OcrBackend,
        bytes: &[u8],
    ) -> DocsightResult<Arc<AnalysisResult>> {
        self.require_configuration()?;

        if let Some(result) = self.session.result() {
            debug!("serving analysis from session cache");
            return Ok(Arc::clone(result));
        }

        let ticket = self.session.begin_analysis()?;
        let outcome = backend.analyze(bytes).await;

        match self.session.complete_analysis(ticket, outcome) {
            CompletionOutcome::Applied(result) => {
                self.fields = fields::extract_fields(&result.extracted_texts);
                Ok(result)
            }
            CompletionOutcome::Failed(message) => Err(DocsightError::analysis_failed(message)),
            CompletionOutcome::StaleDiscarded => Err(DocsightError::analysis_failed(
                "analysis superseded by a newer document selection",
            )),
        }
    }

    /// URL analysis path: no file identity, so no cache participation
    pub async fn analyze_url(
        &mut self,
        backend: &dyn OcrBackend,
        url: &str,
    ) -> DocsightResult<Arc<AnalysisResult>> {
        self.require_configuration()?;

        info!(%url, "analyzing document from URL");
        let result = Arc::new(backend.analyze_url(url).await?);
        self.fields = fields::extract_fields(&result.extracted_texts);
        Ok(result)
    }

    pub fn is_analyzing(&self) -> bool {
        self.session.is_analyzing()
    }

    pub fn analysis_error(&self) -> Option<&str> {
        self.session.error()
    }

    pub fn result(&self) -> Option<&Arc<AnalysisResult>> {
        self.session.result()
    }

    pub fn fields(&self) -> &[ExtractedField] {
        &self.fields
    }

    // ----- highlight / overlay coordination -----

    /// User clicked a field in the analysis panel
    pub fn field_clicked(&mut self, span: &TextSpan, surface: &mut dyn RenderSurface) {
        let target = HighlightTarget::for_span(span.clone());
        let commands = self.overlay.handle(OverlayEvent::TargetSelected(target));
        self.run_commands(commands, surface);
    }

    /// Render surface reported a page change
    pub fn page_changed(&mut self, surface: &mut dyn RenderSurface) {
        let current = surface.render_state().current_page_index;
        let commands = self
            .overlay
            .handle(OverlayEvent::PageChanged {
                current_page_index: current,
            });
        self.run_commands(commands, surface);
    }

    /// Render surface finished laying out a page (also fires on zoom)
    pub fn page_rendered(&mut self, page_index: usize, metrics: PageMetrics) {
        let commands = self.overlay.handle(OverlayEvent::PageRendered {
            page_index,
            metrics,
        });
        debug_assert!(commands.is_empty());
    }

    /// Single bounded re-attempt after the attach timer fired
    pub fn retry_attach(&mut self, surface: &mut dyn RenderSurface) {
        self.try_attach(surface);
    }

    /// User clicked the highlight rectangle on the page
    pub fn overlay_clicked(&mut self, surface: &mut dyn RenderSurface) {
        let commands = self.overlay.handle(OverlayEvent::OverlayClicked);
        self.run_commands(commands, surface);
    }

    /// Explicit clear action
    pub fn clear_highlight(&mut self) {
        self.overlay.handle(OverlayEvent::TargetCleared);
    }

    pub fn overlay_state(&self) -> &OverlayState {
        self.overlay.state()
    }

    pub fn visible_overlay(&self) -> Option<crate::geometry::OverlayRect> {
        self.overlay.visible_rect()
    }

    fn run_commands(&mut self, commands: Vec<OverlayCommand>, surface: &mut dyn RenderSurface) {
        for command in commands {
            match command {
                OverlayCommand::NavigateToPage(page_index) => {
                    debug!(page_index, "navigating render surface");
                    surface.jump_to_page(page_index);
                }
                OverlayCommand::ScheduleAttachRetry => {
                    // First attempt is immediate; the caller arms one short
                    // timer and calls retry_attach() if this one misses
                    self.try_attach(surface);
                }
                OverlayCommand::ScrollFieldIntoView(span) => {
                    let ttl = Duration::from_millis(self.config.overlay.scroll_target_ttl_ms);
                    self.scroll_target = Some(ScrollTarget::new(span, ttl));
                }
            }
        }
    }

    fn try_attach(&mut self, surface: &mut dyn RenderSurface) {
        let current = surface.render_state().current_page_index;
        let event = match surface.page_metrics(current) {
            Some(metrics) => OverlayEvent::PageRendered {
                page_index: current,
                metrics,
            },
            None => OverlayEvent::AttachTimedOut,
        };
        let commands = self.overlay.handle(event);
        self.run_commands(commands, surface);
    }

    // ----- scroll hand-off to the analysis panel -----

    /// Consume the pending scroll request, if it has not expired. Consumed
    /// once: a second call returns None until a new overlay click.
    pub fn take_scroll_target(&mut self) -> Option<ScrollTarget> {
        let target = self.scroll_target.take()?;
        if target.is_expired() {
            debug!("scroll target expired unconsumed");
            return None;
        }
        Some(target)
    }

    /// Resolve a scroll request to the exact list entry it names
    pub fn scroll_focus_field(&self, target: &ScrollTarget) -> Option<&ExtractedField> {
        fields::find_field(&self.fields, &target.span)
    }

    // ----- display JSON -----

    /// Display-only re-serialization of the span list for the JSON tab.
    /// Not a contract anything else consumes.
    pub fn json_view(&self) -> serde_json::Value {
        let result = match self.session.result() {
            Some(result) => result,
            None => return serde_json::json!({}),
        };

        serde_json::json!({
            "documentAnalysis": {
                "pages": result.pages,
                "totalTextElements": result.extracted_texts.len(),
                "extractedContent": result.extracted_texts.iter().enumerate().map(|(index, text)| {
                    serde_json::json!({
                        "id": index + 1,
                        "content": text.content,
                        "page": text.page,
                        "confidence": text.confidence.unwrap_or(0.95),
                        "boundingBox": {
                            "xMin": text.bounding_box.x_min,
                            "yMin": text.bounding_box.y_min,
                            "xMax": text.bounding_box.x_max,
                            "yMax": text.bounding_box.y_max,
                            "width": text.bounding_box.width(),
                            "height": text.bounding_box.height(),
                        },
                    })
                }).collect::<Vec<_>>(),
            }
        })
    }
}
