use thiserror::Error;

/// Main error type for the docsight application
#[derive(Error, Debug)]
pub enum DocsightError {
    #[error("OCR configuration missing: {missing}")]
    ConfigurationMissing { missing: String },

    #[error("Document analysis failed: {message}")]
    AnalysisFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Analysis already in flight for {document}")]
    AnalysisBusy { document: String },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid document format: {format}")]
    InvalidFormat { format: String },

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

impl DocsightError {
    /// Create a configuration-missing error naming the absent values
    pub fn configuration_missing(missing: impl Into<String>) -> Self {
        Self::ConfigurationMissing {
            missing: missing.into(),
        }
    }

    /// Create an analysis failure with a display message only
    pub fn analysis_failed(message: impl Into<String>) -> Self {
        Self::AnalysisFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an analysis failure with the underlying cause
    pub fn analysis_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::AnalysisFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a file I/O error
    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the user can retry without changing anything but the input
    pub fn is_recoverable(&self) -> bool {
        match self {
            DocsightError::ConfigurationMissing { .. } => false,
            DocsightError::Configuration { .. } => false,
            DocsightError::AnalysisFailed { .. } => true,
            DocsightError::AnalysisBusy { .. } => true,
            DocsightError::FileIO { .. } => true,
            DocsightError::InvalidFormat { .. } => true,
            DocsightError::General(_) => true,
        }
    }

    /// Get user-friendly error message for display surfaces
    pub fn user_message(&self) -> String {
        match self {
            DocsightError::ConfigurationMissing { missing } => {
                format!(
                    "OCR backend not configured. Set {} before analyzing documents.",
                    missing
                )
            }
            DocsightError::AnalysisFailed { message, .. } => {
                format!("Document analysis failed: {}", message)
            }
            DocsightError::AnalysisBusy { document } => {
                format!("{} is already being analyzed, please wait.", document)
            }
            DocsightError::FileIO { path, .. } => {
                format!("Could not read {}. Check the path and permissions.", path)
            }
            DocsightError::InvalidFormat { format } => {
                format!("Unsupported format: {}. Docsight only reads PDFs.", format)
            }
            _ => "Something went wrong. Check the logs for details.".to_string(),
        }
    }
}

/// Result type alias for convenience
pub type DocsightResult<T> = Result<T, DocsightError>;
