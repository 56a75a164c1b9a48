/*!
 * Error types for the stsync library.
 *
 * Each component raises its own error enum, defined here with thiserror.
 * Low-level text primitives (lexer, replacer, replayer) fail with typed errors;
 * orchestration turns the ambiguity class into review entries and lets the
 * rest propagate.
 */

use std::path::PathBuf;
use thiserror::Error;

use crate::content_at::TokenKind;

/// Errors raised while lexing a content AT string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// A marker sequence that does not form a valid token
    #[error("Malformed token at offset {offset} (line {line}, column {column}): {reason} near {excerpt:?}")]
    Malformed {
        /// Byte offset of the offending marker
        offset: usize,
        /// 1-based line number
        line: usize,
        /// 1-based column (in characters)
        column: usize,
        /// What is wrong with the marker
        reason: &'static str,
        /// A short excerpt starting at the offset
        excerpt: String,
    },
}

impl TokenError {
    /// Byte offset the error points at
    pub fn offset(&self) -> usize {
        match self {
            Self::Malformed { offset, .. } => *offset,
        }
    }
}

/// Raised by the token replacer when source and target text differ
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Text mismatch at plain text offset {offset}: source has {source_excerpt:?}, target has {target_excerpt:?}")]
pub struct TextMismatchError {
    /// First mismatching character offset in the plain text
    pub offset: usize,
    /// Source text starting at the offset
    pub source_excerpt: String,
    /// Target text starting at the offset
    pub target_excerpt: String,
}

/// Raised by the text replayer when a token cannot be placed with confidence
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayError {
    /// A token whose surrounding context could not be found in the new text
    #[error("Cannot place {kind} token from old offset {offset}: context {context:?} only matched with similarity {similarity:.2}")]
    UnplaceableToken {
        /// Kind of the token that could not be placed
        kind: TokenKind,
        /// Plain text offset (in characters) of the token in the old text
        offset: usize,
        /// Old text around the token, with the token shown as `|`
        context: String,
        /// Best similarity that was reached
        similarity: f64,
    },

    /// The old or new text could not be lexed
    #[error("Replay input error: {0}")]
    Token(#[from] TokenError),
}

/// Errors raised while binding subtitle attributes to a token stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubtitleError {
    /// The stored subtitle list does not match the subtitle marks of the document
    #[error("Subtitle count mismatch: {found} subtitle marks, {expected} stored subtitles")]
    CountMismatch {
        /// Number of stored subtitles
        expected: usize,
        /// Number of subtitle marks found in the document
        found: usize,
    },
}

/// Errors related to the persistent id inventory
#[derive(Error, Debug)]
pub enum InventoryError {
    /// The inventory file could not be read, written or locked
    #[error("Inventory I/O error on {path:?}: {source}")]
    Io {
        /// Inventory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Random draws kept colliding with existing ids
    #[error("Too many persistent id collisions: {collisions} collisions while generating {requested} ids")]
    TooManyCollisions {
        /// Number of ids requested
        requested: usize,
        /// Number of collisions observed
        collisions: usize,
    },

    /// Generator settings that cannot produce ids
    #[error("Invalid id generator settings: {0}")]
    InvalidSettings(String),
}

/// Errors raised while applying an operation to a subtitle list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The subtitle list does not contain a referenced persistent id
    #[error("Operation {operation_id}: unknown persistent id {stid}")]
    UnknownStid {
        /// Operation being applied
        operation_id: usize,
        /// Missing id
        stid: String,
    },

    /// A subtitle's current state differs from the operation's before state
    #[error("Operation {operation_id}: precondition failed for {stid}: {reason}")]
    PreconditionFailed {
        /// Operation being applied
        operation_id: usize,
        /// Subtitle that failed the check
        stid: String,
        /// Description of the mismatch
        reason: String,
    },

    /// The operation itself is inconsistent (wrong shape for its type)
    #[error("Operation {operation_id} is malformed: {reason}")]
    Malformed {
        /// Operation being applied
        operation_id: usize,
        /// Description of the problem
        reason: String,
    },
}

/// Errors raised by operation extraction
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The two snapshots and the extracted operations do not add up
    #[error("Invalid input data for {file}: {reason}")]
    InvalidInputData {
        /// File being processed
        file: String,
        /// What was inconsistent
        reason: String,
    },

    /// A snapshot could not be lexed
    #[error("Token error in {file}: {source}")]
    Token {
        /// File being processed
        file: String,
        /// Lexer error
        #[source]
        source: TokenError,
    },

    /// Verification of the extracted operations failed
    #[error("Operation check failed for {file}: {source}")]
    Operation {
        /// File being processed
        file: String,
        /// Operation error
        #[source]
        source: OperationError,
    },
}

/// Errors raised while replaying operations onto a foreign document
#[derive(Error, Debug)]
pub enum TransferError {
    /// The foreign document needs a human decision; never auto-resolved
    #[error("Manual review required: {0}")]
    NeedsReview(String),

    /// The foreign document could not be lexed
    #[error("Foreign document token error: {0}")]
    Token(#[from] TokenError),

    /// An operation could not be applied to the foreign subtitle list
    #[error("Foreign operation error: {0}")]
    Operation(#[from] OperationError),

    /// The transferred document does not end up with the primary subtitle count
    #[error("Foreign subtitle count {found} does not match primary count {expected}")]
    CountMismatch {
        /// Subtitles in the primary document at the to commit
        expected: usize,
        /// Subtitle marks in the transferred foreign document
        found: usize,
    },

    /// Foreign words changed while moving boundaries
    #[error("Foreign text changed during transfer: {0}")]
    TextChanged(#[from] TextMismatchError),
}

impl TransferError {
    /// Whether this error belongs on the manual review list rather than the failure list
    pub fn needs_review(&self) -> bool {
        matches!(self, Self::NeedsReview(_))
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the lexer
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Error from the token replacer
    #[error("Replacer error: {0}")]
    TextMismatch(#[from] TextMismatchError),

    /// Error from the text replayer
    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    /// Error from subtitle binding
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from the persistent id inventory
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Error from operation handling
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// Error from extraction
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error from foreign transfer
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
