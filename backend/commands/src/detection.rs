/// Command detection: turn message text into a [`BotCommand`].
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::BotCommand;

/// Archive names are a single word so they are always a safe file name.
static ZIP_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").expect("valid regex"));

/// Parse `text` if it starts with a slash command. Group chats address bots
/// as `/cmd@BotName`; the mention is accepted only when it names `bot_username`
/// (or when no username is known).
pub fn detect_command(text: &str, bot_username: Option<&str>) -> Option<BotCommand> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix('/')?;

    let (head, rest) = body
        .split_once(char::is_whitespace)
        .map(|(h, r)| (h, r.trim()))
        .unwrap_or((body, ""));

    let key = match head.split_once('@') {
        Some((key, mention)) => {
            if let Some(me) = bot_username {
                if !mention.eq_ignore_ascii_case(me) {
                    return None;
                }
            }
            key
        }
        None => head,
    };
    if key.is_empty() {
        return None;
    }

    let first_arg = rest.split_whitespace().next();
    let command = match key.to_ascii_lowercase().as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "add" => BotCommand::Add,
        "zip" => BotCommand::Zip(
            first_arg
                .filter(|name| ZIP_NAME.is_match(name))
                .map(str::to_string),
        ),
        "cancel" => BotCommand::Cancel,
        "list" => BotCommand::List,
        "unzip" => BotCommand::Unzip,
        "approve" => BotCommand::Approve(first_arg.and_then(|a| a.parse().ok())),
        "disapprove" => BotCommand::Disapprove(first_arg.and_then(|a| a.parse().ok())),
        other => BotCommand::Unknown(other.to_string()),
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(detect_command("hello /add", None), None);
        assert_eq!(detect_command("/", None), None);
    }

    #[test]
    fn zip_takes_a_word_name() {
        assert_eq!(
            detect_command("/zip holiday_2024", None),
            Some(BotCommand::Zip(Some("holiday_2024".into())))
        );
        assert_eq!(detect_command("/zip", None), Some(BotCommand::Zip(None)));
        assert_eq!(detect_command("/zip ../../etc", None), Some(BotCommand::Zip(None)));
        assert_eq!(detect_command("/zip a.b", None), Some(BotCommand::Zip(None)));
    }

    #[test]
    fn mentions_must_name_this_bot() {
        assert_eq!(detect_command("/add@QuickZipBot", Some("quickzipbot")), Some(BotCommand::Add));
        assert_eq!(detect_command("/add@OtherBot", Some("quickzipbot")), None);
        assert_eq!(detect_command("/list@Anything", None), Some(BotCommand::List));
    }

    #[test]
    fn approve_takes_an_optional_chat_id() {
        assert_eq!(detect_command("/approve -100123", None), Some(BotCommand::Approve(Some(-100123))));
        assert_eq!(detect_command("/disapprove", None), Some(BotCommand::Disapprove(None)));
        assert_eq!(detect_command("/approve me", None), Some(BotCommand::Approve(None)));
    }

    #[test]
    fn unknown_commands_keep_their_key() {
        assert_eq!(detect_command("/Foo bar", None), Some(BotCommand::Unknown("foo".into())));
    }
}
