/// Bot command types.
use std::fmt;

/// A parsed text command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    /// Begin collecting files.
    Add,
    /// Finalize into `<name>.zip`. `None` when the name is missing or invalid.
    Zip(Option<String>),
    Cancel,
    List,
    /// Extract the archive the message replies to.
    Unzip,
    /// Approve a chat; defaults to the current one.
    Approve(Option<i64>),
    Disapprove(Option<i64>),
    Unknown(String),
}

impl BotCommand {
    /// Dispatcher key.
    pub fn key(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Add => "add",
            Self::Zip(_) => "zip",
            Self::Cancel => "cancel",
            Self::List => "list",
            Self::Unzip => "unzip",
            Self::Approve(_) => "approve",
            Self::Disapprove(_) => "disapprove",
            Self::Unknown(key) => key,
        }
    }

    /// Runs before the approval gate.
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Start)
    }

    pub fn is_admin_only(&self) -> bool {
        matches!(self, Self::Approve(_) | Self::Disapprove(_))
    }

    /// Commands that can run for minutes and should not hold up the chat's
    /// update queue.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Self::Zip(Some(_)) | Self::Unzip)
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.key())
    }
}

/// Static description of a command for `/help` and the platform menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDef {
    pub key: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub admin_only: bool,
}
