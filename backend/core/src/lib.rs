pub mod error;
pub mod progress;
pub mod size_guard;
pub mod traits;
pub mod types;

pub use error::{ArchiveError, QuickZipError, Result, TransferError};
pub use progress::{progress_channel, Progress, ProgressReceiver, ProgressSender};
pub use size_guard::{admit, admit_within, Admission, Rejection, MAX_TASK_BYTES};
pub use traits::{Direction, MessageSource, NoopObserver, PayloadTransport, ProgressObserver};
pub use types::{
    sanitize_file_name, unique_file_name, Attachment, AttachmentKind, MessageId, RemoteRef, SessionId,
};
