//! Session task lifecycle: registry, working directories, idle eviction.

pub mod registry;
pub mod sweep;
pub mod workdir;

pub use registry::{Begun, FinalizeTicket, ListedFile, TaskRegistry, TaskState, DEFAULT_TASK_TIMEOUT};
pub use sweep::{run_sweep_loop, spawn_sweeper, DEFAULT_SWEEP_INTERVAL};
pub use workdir::{discard_dir, remove_dir, WorkDirs};
