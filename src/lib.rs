/*!
 * # stsync - subtitle operation lifecycle for content AT documents
 *
 * A Rust library that keeps subtitle boundaries of translated documents in
 * sync with their primary document.
 *
 * ## Features
 *
 * - Lex content AT text into structural tokens and plain text
 * - Remove, replace and replay tokens between versions of a text
 * - Assign globally unique persistent subtitle ids from a shared inventory
 * - Extract subtitle operations (insert, delete, merge, split, moves,
 *   content and record id changes) between two commits of a primary document
 * - Transfer those operations onto foreign documents, or route them to a
 *   manual review queue
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `content_at`: Token model and token operations:
 *   - `content_at::lexer`: Token stream parsing and rendering
 *   - `content_at::diff`: Character diff shared by the token operations
 *   - `content_at::remover`, `content_at::replacer`, `content_at::replayer`
 * - `subtitle`: Subtitle model, sidecars and persistent id generation
 * - `operations`: Operation model, extraction, transfer and persistence
 * - `report`: Per-file report records and batch summaries
 * - `app_config`: Configuration management
 * - `app_controller`: Batch orchestration
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![cfg_attr(test, allow(non_snake_case))]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod content_at;
pub mod errors;
pub mod file_utils;
pub mod operations;
pub mod report;
pub mod subtitle;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, DirectorySnapshots, ExtractionRun, SnapshotSource};
pub use content_at::{Token, TokenKind, TokenStream};
pub use errors::{
    AppError, ExtractionError, InventoryError, OperationError, ReplayError, SubtitleError,
    TextMismatchError, TokenError, TransferError,
};
pub use operations::{
    CommitRange, OperationType, OperationsForFile, OperationsForRepository, SubtitleOperation,
};
pub use report::{BatchReport, ReportSink};
pub use subtitle::{PersistentIdGenerator, StidInventory, Subtitle, SubtitleSidecar};
