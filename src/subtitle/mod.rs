/*!
 * Subtitles and their persistent identity.
 */

pub mod identity;
pub mod model;

pub use identity::{InventoryGuard, PersistentIdGenerator, StidInventory};
pub use model::{bind_subtitles, subtitle_spans, Subtitle, SubtitleSidecar, SubtitleSpan};
