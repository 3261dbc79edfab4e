use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An optional collaborator (embedding model, vector store) is not installed or not reachable.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// A collaborator was present but failed while serving a call.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure should push retrieval onto the lexical-only path.
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::MissingDependency(_) | Self::Collaborator(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
