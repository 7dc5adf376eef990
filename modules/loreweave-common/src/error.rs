use thiserror::Error;

/// Import pipeline error taxonomy. Only mandatory-path failures become one
/// of these; optional-path failures (single media download, single language
/// fetch, verification search, classification) degrade in place and are
/// never surfaced to the caller.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("page not found: {0}")]
    NotFound(String),

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// HTTP status this error maps to at the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            ImportError::InvalidRequest(_) | ImportError::PolicyViolation(_) => 400,
            ImportError::Forbidden(_) => 403,
            ImportError::NotFound(_) => 404,
            ImportError::Generation(_) => 502,
            ImportError::Database(_) | ImportError::Other(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ImportError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(ImportError::PolicyViolation("x".into()).status_code(), 400);
        assert_eq!(ImportError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(ImportError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ImportError::Generation("x".into()).status_code(), 502);
        assert_eq!(ImportError::Database("x".into()).status_code(), 500);
    }
}
