//! Error types shared by the registry and the document collections

use thiserror::Error;

/// Result type for run store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// What kind of document a missing reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    RunStart,
    Descriptor,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::RunStart => write!(f, "run start"),
            ReferenceKind::Descriptor => write!(f, "descriptor"),
        }
    }
}

/// Errors that can occur in run store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filter or lookup shape this store cannot answer. Raised before any
    /// storage unit is touched.
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    /// A run or descriptor uid that is not registered.
    #[error("Unknown {kind}: {uid}")]
    UnknownReference { kind: ReferenceKind, uid: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn unknown_run(uid: impl Into<String>) -> Self {
        StoreError::UnknownReference {
            kind: ReferenceKind::RunStart,
            uid: uid.into(),
        }
    }

    pub fn unknown_descriptor(uid: impl Into<String>) -> Self {
        StoreError::UnknownReference {
            kind: ReferenceKind::Descriptor,
            uid: uid.into(),
        }
    }

    /// True for `UnknownReference` errors of any kind
    pub fn is_unknown_reference(&self) -> bool {
        matches!(self, StoreError::UnknownReference { .. })
    }

    pub fn is_unsupported_query(&self) -> bool {
        matches!(self, StoreError::UnsupportedQuery(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_reference_display() {
        let err = StoreError::unknown_descriptor("d-1");
        assert_eq!(err.to_string(), "Unknown descriptor: d-1");
        assert!(err.is_unknown_reference());

        let err = StoreError::unknown_run("r-1");
        assert_eq!(err.to_string(), "Unknown run start: r-1");
    }

    #[test]
    fn test_storage_error_from_rusqlite() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(!err.is_unsupported_query());
    }
}
