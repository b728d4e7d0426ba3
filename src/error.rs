//! Contains the `Error` and `Result` types used throughout the core.

use std::fmt;

use thiserror::Error;

/// The result type returned by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error produced by the document-database engine core.
///
/// The inner [`ErrorKind`] is boxed to keep `Error` small on the stack and to
/// allow new variants to be added without breaking callers who only match on
/// `kind()`.
#[derive(Debug, Error)]
#[error("{kind}")]
#[non_exhaustive]
pub struct Error {
    kind: Box<ErrorKind>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Construct a new error from a kind with no underlying cause.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            source: None,
        }
    }

    /// Construct a new error from a kind, attaching an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: Box::new(kind),
            source: Some(Box::new(source)),
        }
    }

    /// The classified kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The MongoDB-compatible numeric error code, if this kind carries one.
    pub fn code(&self) -> Option<i32> {
        self.kind.code()
    }

    /// The MongoDB-compatible `codeName`, if this kind carries one.
    pub fn code_name(&self) -> &'static str {
        self.kind.code_name()
    }

    /// Whether the operation that produced this error may be safely retried.
    ///
    /// Matches the driver's `is_read_retryable`/`is_write_retryable` split,
    /// collapsed here because the core does not distinguish read/write
    /// retry code lists (that table lives with the `RowStore` collaborator).
    pub fn is_retryable(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::Cancelled | ErrorKind::StaleConfig { .. }
        )
    }

    /// Whether this error represents a cooperative cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(&*self.kind, ErrorKind::Cancelled)
    }

    /// Render the `{ok: 0, errmsg, code, codeName}` response document shape
    /// described in spec.md §7, without depending on the BSON writer (kept
    /// decoupled so `error` has no dependency on `bson`).
    pub fn as_response_fields(&self) -> ErrorResponseFields<'_> {
        ErrorResponseFields {
            ok: 0,
            errmsg: self.kind.to_string(),
            code: self.code().unwrap_or(-1),
            code_name: self.code_name(),
            source: self,
        }
    }
}

/// The fields of the `{ok: 0, ...}` error response shape from spec.md §6.3/§7.
/// A thin, BSON-independent carrier; callers in the Protocol Frontend
/// collaborator turn this into an actual wire document.
pub struct ErrorResponseFields<'a> {
    pub ok: i32,
    pub errmsg: String,
    pub code: i32,
    pub code_name: &'static str,
    pub source: &'a Error,
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

/// The closed taxonomy of error kinds produced by the core.
///
/// Covers every code in spec.md §6.4 plus the component-internal kinds
/// needed by §4.1–§4.6 (decode failures, stage-compiler failures, nesting
/// limits). `#[non_exhaustive]` so adding a kind is not a breaking change,
/// matching `mongodb-mongo-rust-driver`'s `ErrorKind`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A value had the wrong BSON type for the operation being performed.
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    /// A value was syntactically well-formed but semantically invalid.
    #[error("bad value: {message}")]
    BadValue { message: String },

    /// A specification document could not be parsed into the structure the
    /// caller requested (path tree, stage, index spec, ...).
    #[error("failed to parse: {message}")]
    FailedToParse { message: String },

    /// The exact same path was specified twice while building a path tree.
    #[error("path collision on {path:?}")]
    PathCollision { path: String },

    /// One specified path is a strict prefix of another in the same tree.
    #[error("partial path collision: {prefix:?} is a prefix of {path:?}")]
    PartialPathCollision { prefix: String, path: String },

    /// The target namespace (database.collection) does not exist.
    #[error("namespace not found: {namespace}")]
    NamespaceNotFound { namespace: String },

    /// A named index does not exist on the target collection.
    #[error("index not found: {name}")]
    IndexNotFound { name: String },

    /// No registered index access method could serve the requested query
    /// shape or capability predicate.
    #[error("unable to find a suitable index: {message}")]
    UnableToFindIndex { message: String },

    /// An index creation request conflicts with an existing index's options.
    #[error("index options conflict: {message}")]
    IndexOptionsConflict { message: String },

    /// The operation requires a writable primary but targeted a secondary.
    #[error("not writable primary")]
    NotWritablePrimary,

    /// The operation is not supported while a transaction is in progress.
    #[error("operation not supported in transaction")]
    OperationNotSupportedInTransaction,

    /// A cursor spill file could not be created or written because storage
    /// is exhausted.
    #[error("disk full")]
    DiskFull,

    /// The caller's view of cluster/collection metadata is stale.
    #[error("stale config: {message}")]
    StaleConfig { message: String },

    /// The referenced cursor id is unknown to this process.
    #[error("cursor not found: {cursor_id}")]
    CursorNotFound { cursor_id: i64 },

    /// The referenced cursor was explicitly killed.
    #[error("cursor killed: {cursor_id}")]
    CursorKilled { cursor_id: i64 },

    /// The operation was cancelled cooperatively; retryable.
    #[error("operation cancelled")]
    Cancelled,

    /// The requested command is not implemented by this deployment.
    #[error("command not supported: {command}")]
    CommandNotSupported { command: String },

    /// A precisely-numbered MongoDB-compatible error with no dedicated
    /// variant above.
    #[error("{message} ({location})")]
    Location { location: i32, message: String },

    // --- component-internal kinds (spec.md §4.1–§4.6) ---
    /// A BSON decode failed because of a malformed length prefix, an
    /// unknown type tag, or recursion past the configured bound.
    #[error("malformed BSON encoding at offset {offset}: {message}")]
    MalformedEncoding { offset: usize, message: String },

    /// A pipeline stage's spec document did not match the shape the stage
    /// handler expects.
    #[error("invalid spec for stage {stage}: {message}")]
    StageSpecInvalid { stage: String, message: String },

    /// A pipeline stage is not available in this deployment.
    #[error("stage not supported: {stage}")]
    StageNotSupported { stage: String },

    /// A nested pipeline declared a collation that conflicts with its
    /// parent's collation.
    #[error("collation mismatch in nested pipeline")]
    CollationMismatch,

    /// Nested pipeline depth exceeded the configured limit.
    #[error("nested pipeline depth exceeds limit of {limit}")]
    NestedLimit { limit: u32 },

    /// An invariant that should be impossible to violate was violated; this
    /// indicates a bug in the core rather than bad caller input.
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl ErrorKind {
    /// The MongoDB-compatible numeric error code for this kind, if any.
    /// Kinds without a stable historical code return `None` (e.g. our
    /// internal-only kinds); callers should fall back to -1 for those when
    /// rendering wire responses, exactly as `Error::as_response_fields` does.
    pub fn code(&self) -> Option<i32> {
        use ErrorKind::*;
        Some(match self {
            TypeMismatch { .. } => 14,
            BadValue { .. } => 2,
            FailedToParse { .. } => 9,
            PathCollision { .. } => 2,
            PartialPathCollision { .. } => 2,
            NamespaceNotFound { .. } => 26,
            IndexNotFound { .. } => 27,
            UnableToFindIndex { .. } => 291,
            IndexOptionsConflict { .. } => 85,
            NotWritablePrimary => 10107,
            OperationNotSupportedInTransaction => 263,
            DiskFull => 47,
            StaleConfig { .. } => 13388,
            CursorNotFound { .. } => 43,
            CursorKilled { .. } => 237,
            Cancelled => 11601,
            CommandNotSupported { .. } => 115,
            Location { location, .. } => *location,
            MalformedEncoding { .. }
            | StageSpecInvalid { .. }
            | StageNotSupported { .. }
            | CollationMismatch
            | NestedLimit { .. }
            | InternalError { .. } => return None,
        })
    }

    /// The MongoDB-compatible `codeName` string for this kind.
    pub fn code_name(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            TypeMismatch { .. } => "TypeMismatch",
            BadValue { .. } => "BadValue",
            FailedToParse { .. } => "FailedToParse",
            PathCollision { .. } => "PathCollision",
            PartialPathCollision { .. } => "PartialPathCollision",
            NamespaceNotFound { .. } => "NamespaceNotFound",
            IndexNotFound { .. } => "IndexNotFound",
            UnableToFindIndex { .. } => "UnableToFindIndex",
            IndexOptionsConflict { .. } => "IndexOptionsConflict",
            NotWritablePrimary => "NotWritablePrimary",
            OperationNotSupportedInTransaction => "OperationNotSupportedInTransaction",
            DiskFull => "DiskFull",
            StaleConfig { .. } => "StaleConfig",
            CursorNotFound { .. } => "CursorNotFound",
            CursorKilled { .. } => "CursorKilled",
            Cancelled => "Cancelled",
            CommandNotSupported { .. } => "CommandNotSupported",
            Location { .. } => "Location",
            MalformedEncoding { .. } => "MalformedEncoding",
            StageSpecInvalid { .. } => "StageSpecInvalid",
            StageNotSupported { .. } => "StageNotSupported",
            CollationMismatch => "CollationMismatch",
            NestedLimit { .. } => "NestedLimit",
            InternalError { .. } => "InternalError",
        }
    }
}

impl fmt::Debug for ErrorResponseFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorResponseFields")
            .field("ok", &self.ok)
            .field("errmsg", &self.errmsg)
            .field("code", &self.code)
            .field("code_name", &self.code_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_fields_carry_code_and_name() {
        let err: Error = ErrorKind::NamespaceNotFound {
            namespace: "db.coll".to_string(),
        }
        .into();
        let fields = err.as_response_fields();
        assert_eq!(fields.ok, 0);
        assert_eq!(fields.code, 26);
        assert_eq!(fields.code_name, "NamespaceNotFound");
    }

    #[test]
    fn internal_errors_have_no_stable_code() {
        let err: Error = ErrorKind::InternalError {
            message: "unreachable".to_string(),
        }
        .into();
        assert_eq!(err.code(), None);
        assert_eq!(err.as_response_fields().code, -1);
    }

    #[test]
    fn cancellation_is_retryable() {
        let err: Error = ErrorKind::Cancelled.into();
        assert!(err.is_retryable());
        assert!(err.is_cancellation());
    }
}
