//! Error types for the reporting pipeline

use thiserror::Error;

/// Pipeline error taxonomy.
///
/// Only `Input` and `ModelFit` are fatal and reach the process boundary.
/// The remaining variants are recovered by the stage that raised them and
/// surface as placeholder artifacts or log lines.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid input: {reason}")]
    Input { reason: String },

    #[error("Model fit failed: {reason}")]
    ModelFit { reason: String },

    #[error("Capability '{capability}' unavailable: {reason}")]
    CapabilityUnavailable { capability: String, reason: String },

    #[error("Rendering {artifact} failed: {reason}")]
    Render { artifact: String, reason: String },

    #[error("Report assembly failed: {reason}")]
    Assembly { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ReportError {
    pub fn input(reason: impl Into<String>) -> Self {
        ReportError::Input { reason: reason.into() }
    }

    pub fn model_fit(reason: impl Into<String>) -> Self {
        ReportError::ModelFit { reason: reason.into() }
    }

    pub fn render(artifact: &str, reason: impl Into<String>) -> Self {
        ReportError::Render {
            artifact: artifact.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(capability: &str, reason: impl Into<String>) -> Self {
        ReportError::CapabilityUnavailable {
            capability: capability.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that abort the run with a non-zero exit code
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReportError::Input { .. } | ReportError::ModelFit { .. })
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ReportError::input("x").is_fatal());
        assert!(ReportError::model_fit("x").is_fatal());
        assert!(!ReportError::unavailable("ashr", "x").is_fatal());
        assert!(!ReportError::Assembly { reason: "x".into() }.is_fatal());
        assert!(!ReportError::render("heatmap.svg", "x").is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let e = ReportError::unavailable("go_gene_sets", "no library configured");
        assert_eq!(
            e.to_string(),
            "Capability 'go_gene_sets' unavailable: no library configured"
        );
    }
}
