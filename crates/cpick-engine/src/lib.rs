mod roll;
mod selection;
mod sync;

pub use roll::roll_from_directory;
pub use selection::{
    PickError, PickOutcome, ResolutionPrompt, ResolvedLeftover, SelectionEngine,
};
pub use sync::{sync_from_directory, sync_tags, SyncError, SyncReport, SYNC_CHUNK_SIZE};
