//! Index persistence: load, staleness, atomic save, and the build lock.

mod index_store;
mod lock;

pub use index_store::{parse_index, IndexStore, LoadOutcome};
pub use lock::{lock_path_for, BuildLock, LockRecord};
