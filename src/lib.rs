// Public module exports for the docsight binary
pub mod config;
pub mod error;
pub mod fields;
pub mod geometry;
pub mod logging;
pub mod ocr;
pub mod overlay;
pub mod pdf;
pub mod render;
pub mod session;
pub mod workspace;

pub use config::DocsightConfig;
pub use error::{DocsightError, DocsightResult};
pub use ocr::{AnalysisResult, BoundingBox, TextSpan};
pub use workspace::DocumentWorkspace;
