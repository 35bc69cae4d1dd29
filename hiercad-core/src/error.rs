use thiserror::Error;

/// Result type for layout construction and queries.
pub type LayoutResult<T> = Result<T, LayoutError>;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Child '{name}' is a bare Node; wrap it in a Reference first")]
    BareNodeChild { name: String },

    #[error("Invalid child '{name}': {reason}")]
    InvalidChild { name: String, reason: String },

    #[error("Cannot copy a Reference of depth {depth}; only depth-1 References can be copied")]
    CopyStacked { depth: usize },

    #[error("Layer '{0}' is not in the layer map")]
    UnknownLayer(String),

    #[error("Stale {0} key: the entry was removed from the layout")]
    StaleKey(&'static str),

    #[error("Invalid stack depth {depth} for a Reference of depth {max}")]
    InvalidDepth { depth: usize, max: usize },

    #[error("Reference cycle through {0}")]
    Cycle(String),

    #[error("Design has no geometry")]
    EmptyGeometry,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
