use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::error::{DocsightError, DocsightResult};

/// Axis-aligned rectangle in the OCR backend's coordinate convention.
/// Top-left origin; units are whatever the backend reports (inches for
/// the read model used here). Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Normalizing constructor: corners are reordered so the invariants
    /// `x_max >= x_min` and `y_max >= y_min` always hold.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_min.max(x_max),
            y_max: y_min.max(y_max),
        }
    }

    /// Collapse a polygon (flat x,y pair list, any winding) to its
    /// axis-aligned bounding box.
    pub fn from_polygon(polygon: &[f64]) -> Option<Self> {
        if polygon.len() < 8 || polygon.len() % 2 != 0 {
            return None;
        }

        let xs = polygon.iter().step_by(2);
        let ys = polygon.iter().skip(1).step_by(2);

        let x_min = xs.clone().cloned().fold(f64::INFINITY, f64::min);
        let x_max = xs.cloned().fold(f64::NEG_INFINITY, f64::max);
        let y_min = ys.clone().cloned().fold(f64::INFINITY, f64::min);
        let y_max = ys.cloned().fold(f64::NEG_INFINITY, f64::max);

        Some(Self::new(x_min, y_min, x_max, y_max))
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Same top-left corner, used to tell apart spans with identical text.
    /// Exact comparison on purpose: both sides come from the same backend
    /// response, never from recomputation.
    pub fn same_origin(&self, other: &BoundingBox) -> bool {
        self.x_min == other.x_min && self.y_min == other.y_min
    }
}

/// One recognized piece of text plus its location and confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpan {
    pub content: String,
    pub bounding_box: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// 1-based page number
    pub page: u32,
}

/// Full analysis result for one document. Span order is the backend's
/// reading order and is preserved for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub extracted_texts: Vec<TextSpan>,
    pub pages: u32,
}

/// External document-analysis collaborator. Takes a payload (bytes or
/// URL), returns text spans with boxes; failures surface as a single
/// message string, no structured taxonomy beyond that.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn analyze(&self, bytes: &[u8]) -> DocsightResult<AnalysisResult>;
    async fn analyze_url(&self, url: &str) -> DocsightResult<AnalysisResult>;
}

// ============= READ-MODEL REST CLIENT =============

const ANALYZE_PATH: &str = "/documentintelligence/documentModels/prebuilt-read:analyze";
const API_VERSION: &str = "2024-02-29-preview";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Client for an Azure Document Intelligence style "prebuilt-read" REST
/// surface: submit, follow the operation-location header, poll to a
/// terminal status, flatten pages/lines/words into TextSpans.
pub struct ReadModelClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl ReadModelClient {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_poll_attempts: config.max_poll_attempts,
        }
    }

    fn analyze_url_for(&self) -> String {
        format!(
            "{}{}?api-version={}",
            self.endpoint, ANALYZE_PATH, API_VERSION
        )
    }

    async fn submit(&self, request: reqwest::RequestBuilder) -> DocsightResult<String> {
        let response = request
            .header(KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| {
                DocsightError::analysis_failed_with_source("OCR request failed to send", e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocsightError::analysis_failed(format!(
                "OCR backend rejected the document ({}): {}",
                status, body
            )));
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                DocsightError::analysis_failed("OCR backend returned no operation-location")
            })
    }

    async fn poll(&self, operation_url: &str) -> DocsightResult<AnalyzeOperation> {
        for attempt in 0..self.max_poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let operation: AnalyzeOperation = self
                .http
                .get(operation_url)
                .header(KEY_HEADER, &self.api_key)
                .send()
                .await
                .map_err(|e| {
                    DocsightError::analysis_failed_with_source("OCR result poll failed", e)
                })?
                .json()
                .await
                .map_err(|e| {
                    DocsightError::analysis_failed_with_source("OCR result was not valid JSON", e)
                })?;

            match operation.status.as_str() {
                "succeeded" => return Ok(operation),
                "failed" => {
                    let message = operation
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "analysis reported failure".to_string());
                    return Err(DocsightError::analysis_failed(message));
                }
                other => {
                    debug!(status = other, attempt, "OCR operation still running");
                }
            }
        }

        Err(DocsightError::analysis_failed(format!(
            "OCR operation did not finish within {} polls",
            self.max_poll_attempts
        )))
    }

    async fn run(
        &self,
        request: reqwest::RequestBuilder,
        include_words: bool,
    ) -> DocsightResult<AnalysisResult> {
        let operation_url = self.submit(request).await?;
        debug!(url = %operation_url, "OCR operation accepted");

        let operation = self.poll(&operation_url).await?;
        let analyze = operation.analyze_result.ok_or_else(|| {
            DocsightError::analysis_failed("OCR operation succeeded without a result body")
        })?;

        let result = flatten_pages(&analyze.pages, include_words);
        info!(
            pages = result.pages,
            spans = result.extracted_texts.len(),
            "document analysis complete"
        );
        Ok(result)
    }
}

#[async_trait]
impl OcrBackend for ReadModelClient {
    async fn analyze(&self, bytes: &[u8]) -> DocsightResult<AnalysisResult> {
        let request = self
            .http
            .post(self.analyze_url_for())
            .header("Content-Type", "application/pdf")
            .body(bytes.to_vec());

        // Byte uploads also take the per-word pass so confidences come back
        self.run(request, true).await
    }

    async fn analyze_url(&self, url: &str) -> DocsightResult<AnalysisResult> {
        let request = self
            .http
            .post(self.analyze_url_for())
            .json(&serde_json::json!({ "urlSource": url }));

        self.run(request, false).await
    }
}

// Wire shapes for the analyze operation, limited to the fields consumed here

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    error: Option<OperationError>,
    analyze_result: Option<AnalyzeResultBody>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResultBody {
    #[serde(default)]
    pages: Vec<WirePage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePage {
    #[serde(default)]
    lines: Vec<WireLine>,
    #[serde(default)]
    words: Vec<WireWord>,
}

#[derive(Debug, Deserialize)]
struct WireLine {
    content: String,
    #[serde(default)]
    polygon: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct WireWord {
    content: String,
    #[serde(default)]
    polygon: Vec<f64>,
    confidence: Option<f64>,
}

/// Flatten wire pages into the ordered TextSpan sequence. Lines first
/// (reading order), then optionally individual words for granular
/// analysis; entries without a usable polygon are skipped.
fn flatten_pages(pages: &[WirePage], include_words: bool) -> AnalysisResult {
    let mut extracted_texts = Vec::new();

    for (page_index, page) in pages.iter().enumerate() {
        let page_number = page_index as u32 + 1;

        for line in &page.lines {
            if line.content.is_empty() {
                continue;
            }
            if let Some(bounding_box) = BoundingBox::from_polygon(&line.polygon) {
                extracted_texts.push(TextSpan {
                    content: line.content.clone(),
                    bounding_box,
                    confidence: None,
                    page: page_number,
                });
            }
        }

        if include_words {
            for word in &page.words {
                if word.content.is_empty() {
                    continue;
                }
                if let Some(bounding_box) = BoundingBox::from_polygon(&word.polygon) {
                    extracted_texts.push(TextSpan {
                        content: word.content.clone(),
                        bounding_box,
                        confidence: word.confidence,
                        page: page_number,
                    });
                }
            }
        }
    }

    if extracted_texts.is_empty() && !pages.is_empty() {
        warn!("analysis returned pages but no usable text spans");
    }

    AnalysisResult {
        pages: pages.len() as u32,
        extracted_texts,
    }
}
