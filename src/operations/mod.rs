/*!
 * Subtitle operation lifecycle.
 *
 * - `operation`: the operation model, inversion and serialization
 * - `apply`: applying operations to a subtitle list
 * - `extractor`: operations from two snapshots of a document
 * - `transfer`: replaying operations onto foreign documents
 * - `store`: operation lists per file and repository, and their files
 */

pub mod apply;
pub mod extractor;
pub mod operation;
pub mod store;
pub mod transfer;

pub use apply::{apply_operation, apply_operations};
pub use extractor::{ExtractedFile, SnapshotPair, SubtitleOperationExtractor};
pub use operation::{AffectedStid, OperationType, SubtitleOperation, SubtitleState};
pub use store::{CommitRange, OperationsForFile, OperationsForRepository, OperationsStore};
pub use transfer::{
    apply_to_foreign_content_at, ForeignDocument, ForeignTransfer, ForeignTransferResult,
    ReviewNote, TransferStrategy,
};
