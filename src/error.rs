use std::fmt;
use std::path::PathBuf;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPath {
    pub label: &'static str,
    pub path: PathBuf,
}

impl fmt::Display for MissingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "- {}: {}", self.label, self.path.display())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// One or more required files are absent. Always lists every missing path.
    #[error(
        "Missing required files:\n{}\nGenerate them by running the training notebooks, then restart.",
        format_missing(.0)
    )]
    MissingArtifact(Vec<MissingPath>),

    #[error("failed to load {artifact}: {source:#}")]
    LoadError {
        artifact: &'static str,
        source: anyhow::Error,
    },

    #[error("No row found for {team} / {season}. Try a different season or enter values manually.")]
    NoMatchingRow { team: String, season: String },

    #[error("prediction failed: {0}")]
    PredictionError(String),
}

impl PipelineError {
    pub fn load(artifact: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::LoadError {
            artifact,
            source: source.into(),
        }
    }

    /// Startup failures end the session; everything else is local to one request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingArtifact(_) | Self::LoadError { .. })
    }
}

fn format_missing(missing: &[MissingPath]) -> String {
    missing
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
