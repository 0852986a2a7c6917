use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DocsightError, DocsightResult};
use crate::ocr::AnalysisResult;

/// Cache key for a selected document: name + size + modification time.
/// Two selections of the same tuple are the same document, so a previous
/// analysis can be reused without re-invoking the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub name: String,
    pub size_bytes: u64,
    pub modified: Option<SystemTime>,
}

impl FileIdentity {
    pub fn new(name: impl Into<String>, size_bytes: u64, modified: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            modified,
        }
    }

    pub fn from_path(path: &Path) -> DocsightResult<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| DocsightError::file_io(path.display().to_string(), e))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            size_bytes: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Handle for one launched analysis call. Captures the document token at
/// launch time so a slow response can be checked against the document that
/// is selected when it finally lands.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    token: Uuid,
    identity: FileIdentity,
}

impl AnalysisTicket {
    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }
}

/// What select_document found for the new document
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// Previously analyzed in this session; result restored from cache
    CacheHit(Arc<AnalysisResult>),
    /// Needs a backend call
    NeedsAnalysis,
}

/// What happened to a completed analysis call
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Result belongs to the still-selected document and was applied
    Applied(Arc<AnalysisResult>),
    /// The user moved on to another document; result dropped
    StaleDiscarded,
    /// Call failed while still current; message kept for display
    Failed(String),
}

/// Per-session analysis state: the append-only result cache, the selected
/// document token, the in-flight guard, and the displayable outcome.
///
/// Read and written only from the single event loop; no locking.
pub struct AnalysisSession {
    cache: HashMap<FileIdentity, Arc<AnalysisResult>>,
    current: Option<(Uuid, FileIdentity)>,
    in_flight: bool,
    result: Option<Arc<AnalysisResult>>,
    error: Option<String>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            current: None,
            in_flight: false,
            result: None,
            error: None,
        }
    }

    /// Make `identity` the selected document. Clears the displayed result
    /// and error, invalidates any in-flight call for the previous document
    /// (its response will compare against the new token and be discarded),
    /// and restores a cached result when one exists.
    pub fn select_document(&mut self, identity: FileIdentity) -> SelectionOutcome {
        let token = Uuid::new_v4();
        info!(document = %identity.name, %token, "document selected");

        self.current = Some((token, identity.clone()));
        self.in_flight = false;
        self.error = None;

        if let Some(cached) = self.cache.get(&identity) {
            debug!(document = %identity.name, "analysis cache hit");
            self.result = Some(Arc::clone(cached));
            SelectionOutcome::CacheHit(Arc::clone(cached))
        } else {
            self.result = None;
            SelectionOutcome::NeedsAnalysis
        }
    }

    /// Start an analysis for the selected document. Rejected while a call
    /// for this document is already in flight.
    pub fn begin_analysis(&mut self) -> DocsightResult<AnalysisTicket> {
        let (token, identity) = self
            .current
            .as_ref()
            .ok_or_else(|| DocsightError::configuration("no document selected"))?;

        if self.in_flight {
            return Err(DocsightError::AnalysisBusy {
                document: identity.name.clone(),
            });
        }

        self.in_flight = true;
        debug!(document = %identity.name, "analysis started");
        Ok(AnalysisTicket {
            token: *token,
            identity: identity.clone(),
        })
    }

    /// Land a completed call. The ticket token is compared against the
    /// current document token, not "most recent call wins": cache hits can
    /// resolve synchronously out of order relative to slow network calls.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: DocsightResult<AnalysisResult>,
    ) -> CompletionOutcome {
        let still_current = matches!(&self.current, Some((token, _)) if *token == ticket.token);
        if !still_current {
            warn!(document = %ticket.identity.name, "discarding stale analysis result");
            return CompletionOutcome::StaleDiscarded;
        }

        self.in_flight = false;
        match outcome {
            Ok(result) => {
                let result = Arc::new(result);
                // Append-only: never evicted for the session lifetime
                self.cache
                    .insert(ticket.identity.clone(), Arc::clone(&result));
                self.result = Some(Arc::clone(&result));
                info!(
                    document = %ticket.identity.name,
                    spans = result.extracted_texts.len(),
                    "analysis result applied"
                );
                CompletionOutcome::Applied(result)
            }
            Err(err) => {
                let message = match &err {
                    DocsightError::AnalysisFailed { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                warn!(document = %ticket.identity.name, error = %message, "analysis failed");
                self.error = Some(message.clone());
                CompletionOutcome::Failed(message)
            }
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.in_flight
    }

    pub fn result(&self) -> Option<&Arc<AnalysisResult>> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn current_identity(&self) -> Option<&FileIdentity> {
        self.current.as_ref().map(|(_, identity)| identity)
    }

    pub fn cached_documents(&self) -> usize {
        self.cache.len()
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BoundingBox, TextSpan};

    fn identity(name: &str) -> FileIdentity {
        FileIdentity::new(name, 1024, None)
    }

    fn result(content: &str) -> AnalysisResult {
        AnalysisResult {
            extracted_texts: vec![TextSpan {
                content: content.to_string(),
                bounding_box: BoundingBox::new(1.0, 1.0, 2.0, 1.2),
                confidence: None,
                page: 1,
            }],
            pages: 1,
        }
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let mut session = AnalysisSession::new();

        // Document A selected, call launched
        session.select_document(identity("a.pdf"));
        let ticket_a = session.begin_analysis().unwrap();

        // Document B selected before A's call resolves
        session.select_document(identity("b.pdf"));
        let ticket_b = session.begin_analysis().unwrap();

        // A's slow response lands: discarded, display state untouched
        let outcome = session.complete_analysis(ticket_a, Ok(result("from a")));
        assert_eq!(outcome, CompletionOutcome::StaleDiscarded);
        assert!(session.result().is_none());

        // B's own result applies
        let outcome = session.complete_analysis(ticket_b, Ok(result("from b")));
        assert!(matches!(outcome, CompletionOutcome::Applied(_)));
        assert_eq!(
            session.result().unwrap().extracted_texts[0].content,
            "from b"
        );
    }

    #[test]
    fn test_cache_hit_skips_backend() {
        let mut session = AnalysisSession::new();

        session.select_document(identity("a.pdf"));
        let ticket = session.begin_analysis().unwrap();
        session.complete_analysis(ticket, Ok(result("cached")));

        // Re-selecting the same identity tuple restores the identical
        // result without another begin/complete cycle
        match session.select_document(identity("a.pdf")) {
            SelectionOutcome::CacheHit(cached) => {
                assert!(Arc::ptr_eq(&cached, session.result().unwrap()));
                assert_eq!(cached.extracted_texts[0].content, "cached");
            }
            other => panic!("expected cache hit, got {:?}", other),
        }
        assert!(!session.is_analyzing());
    }

    #[test]
    fn test_resubmission_while_in_flight_is_busy() {
        let mut session = AnalysisSession::new();
        session.select_document(identity("a.pdf"));
        let _ticket = session.begin_analysis().unwrap();

        let err = session.begin_analysis().unwrap_err();
        assert!(matches!(err, DocsightError::AnalysisBusy { .. }));
    }

    #[test]
    fn test_new_selection_clears_error_and_result() {
        let mut session = AnalysisSession::new();
        session.select_document(identity("a.pdf"));
        let ticket = session.begin_analysis().unwrap();
        session.complete_analysis(
            ticket,
            Err(DocsightError::analysis_failed("backend exploded")),
        );
        assert_eq!(session.error(), Some("backend exploded"));

        session.select_document(identity("b.pdf"));
        assert!(session.error().is_none());
        assert!(session.result().is_none());
    }

    #[test]
    fn test_failure_message_is_verbatim() {
        let mut session = AnalysisSession::new();
        session.select_document(identity("a.pdf"));
        let ticket = session.begin_analysis().unwrap();

        let outcome = session.complete_analysis(
            ticket,
            Err(DocsightError::analysis_failed("quota exceeded (429)")),
        );
        assert_eq!(
            outcome,
            CompletionOutcome::Failed("quota exceeded (429)".to_string())
        );
    }

    #[test]
    fn test_identity_tuple_distinguishes_modified_files() {
        let mut session = AnalysisSession::new();

        let original = FileIdentity::new("a.pdf", 1024, Some(SystemTime::UNIX_EPOCH));
        session.select_document(original.clone());
        let ticket = session.begin_analysis().unwrap();
        session.complete_analysis(ticket, Ok(result("v1")));

        // Same name, newer mtime: cache miss forces a fresh call
        let touched = FileIdentity::new(
            "a.pdf",
            1024,
            Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(60)),
        );
        assert_eq!(
            session.select_document(touched),
            SelectionOutcome::NeedsAnalysis
        );
    }
}
