/// Built-in command table, used for `/help` and the Telegram command menu.
use crate::types::CommandDef;

pub fn builtin_commands() -> Vec<CommandDef> {
    vec![
        CommandDef {
            key: "start",
            usage: "/start",
            description: "Say hello.",
            admin_only: false,
        },
        CommandDef {
            key: "help",
            usage: "/help",
            description: "Show available commands.",
            admin_only: false,
        },
        CommandDef {
            key: "add",
            usage: "/add",
            description: "Start collecting files for a new archive.",
            admin_only: false,
        },
        CommandDef {
            key: "zip",
            usage: "/zip <name>",
            description: "Download everything collected and send it back as <name>.zip.",
            admin_only: false,
        },
        CommandDef {
            key: "list",
            usage: "/list",
            description: "Show the files collected so far.",
            admin_only: false,
        },
        CommandDef {
            key: "cancel",
            usage: "/cancel",
            description: "Discard the current archive.",
            admin_only: false,
        },
        CommandDef {
            key: "unzip",
            usage: "/unzip",
            description: "Reply to a .zip or .rar to get its files back one by one.",
            admin_only: false,
        },
        CommandDef {
            key: "approve",
            usage: "/approve [chat id]",
            description: "Allow a chat to use the bot.",
            admin_only: true,
        },
        CommandDef {
            key: "disapprove",
            usage: "/disapprove [chat id]",
            description: "Revoke a chat's access.",
            admin_only: true,
        },
    ]
}

/// `/help` body. Admin commands are only listed for the admin.
pub fn help_text(is_admin: bool) -> String {
    let mut lines = vec!["Available commands:".to_string()];
    for cmd in builtin_commands() {
        if cmd.admin_only && !is_admin {
            continue;
        }
        lines.push(format!("{} - {}", cmd.usage, cmd.description));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_commands_hidden_from_users() {
        assert!(!help_text(false).contains("/approve"));
        assert!(help_text(true).contains("/disapprove [chat id]"));
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<_> = builtin_commands().iter().map(|c| c.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), builtin_commands().len());
    }
}
