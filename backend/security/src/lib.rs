pub mod access_policy;
pub mod approved_chats;

pub use access_policy::AccessPolicy;
pub use approved_chats::{ApprovalStore, SqliteApprovalStore};
