use thiserror::Error;

/// Why an entity's sync pipeline stopped. Every variant except the
/// transparent transport error maps to one pipeline stage; resolution
/// misses are not errors (they are absorbed into the derived claim sets).
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("entity not found in the graph")]
    EntityNotFound,

    #[error("entity is not an instance of the human class")]
    NotHumanEntity,

    #[error("entity has no usable profile URL claim")]
    NoProfileUrl,

    #[error("profile fetch failed with status {0}")]
    FetchFailure(u16),

    #[error("profile page lacks the expected primary heading")]
    MalformedPage,

    #[error("entity commit failed: {0}")]
    CommitFailure(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// The pipeline stage this failure is reported against.
    pub fn stage(&self) -> &'static str {
        match self {
            SyncError::EntityNotFound => "fetch_entity",
            SyncError::NotHumanEntity => "validate_is_human",
            SyncError::NoProfileUrl => "resolve_profile_url",
            SyncError::FetchFailure(_) => "fetch_profile",
            SyncError::MalformedPage => "fetch_profile",
            SyncError::CommitFailure(_) => "commit_entity",
            SyncError::Other(_) => "collaborator",
        }
    }
}

/// Failure applying a change set to the graph.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("graph API rejected the edit: {code}: {info}")]
    Api { code: String, info: String },

    #[error("transport error during commit: {0}")]
    Transport(String),
}
