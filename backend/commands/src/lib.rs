pub mod detection;
pub mod dispatch;
pub mod handlers;
pub mod registry;
pub mod replies;
pub mod service;
pub mod types;

use std::sync::Arc;

use quickzip_security::AccessPolicy;

pub use detection::detect_command;
pub use dispatch::{CommandContext, CommandDispatcher, CommandHandler, CommandResponse};
pub use handlers::{
    AddHandler, ApprovalHandler, CancelHandler, HelpHandler, ListHandler, StartHandler,
    UnzipHandler, ZipHandler,
};
pub use registry::{builtin_commands, help_text};
pub use service::{ExtractReport, FinalizeReport, ZipService, DONE_CAPTION};
pub use types::{BotCommand, CommandDef};

/// Build a dispatcher pre-wired with all built-in handlers.
pub fn build_dispatcher(service: Arc<ZipService>, policy: AccessPolicy) -> CommandDispatcher {
    let mut dispatcher = CommandDispatcher::new(service.clone(), policy.clone());

    dispatcher.register("start", Arc::new(StartHandler));
    dispatcher.register("help", Arc::new(HelpHandler { policy: policy.clone() }));
    dispatcher.register("add", Arc::new(AddHandler { service: service.clone() }));
    dispatcher.register("list", Arc::new(ListHandler { service: service.clone() }));
    dispatcher.register("cancel", Arc::new(CancelHandler { service: service.clone() }));
    dispatcher.register("zip", Arc::new(ZipHandler { service: service.clone() }));
    dispatcher.register("unzip", Arc::new(UnzipHandler { service }));
    let approvals = Arc::new(ApprovalHandler { policy });
    dispatcher.register("approve", approvals.clone());
    dispatcher.register("disapprove", approvals);

    dispatcher
}
