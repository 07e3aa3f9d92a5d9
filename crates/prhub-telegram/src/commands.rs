//! Bot command parsing.

use prhub_common::models::QR_START_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start [payload]`, the payload coming from a `t.me/<bot>?start=` link
    Start(Option<String>),
    Help,
    Me,
    Unknown(String),
}

impl Command {
    /// QR session token carried by a `/start qr_<token>` deep link.
    pub fn qr_token(&self) -> Option<&str> {
        match self {
            Command::Start(Some(payload)) => payload.strip_prefix(QR_START_PREFIX).filter(|t| !t.is_empty()),
            _ => None,
        }
    }
}

/// Parse a message text into a command.
///
/// Returns `None` for plain text and for commands addressed to another bot
/// (`/help@other_bot`) when `bot_username` is known.
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };

    let name = match head.split_once('@') {
        Some((name, target)) => {
            if let Some(me) = bot_username.filter(|u| !u.is_empty()) {
                if !target.eq_ignore_ascii_case(me.trim_start_matches('@')) {
                    return None;
                }
            }
            name
        }
        None => head,
    };
    if name.is_empty() {
        return None;
    }

    Some(match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start((!args.is_empty()).then(|| args.to_string())),
        "help" => Command::Help,
        "me" => Command::Me,
        other => Command::Unknown(other.to_string()),
    })
}

/// `https://t.me/<bot>?start=<payload>`
pub fn deep_link(bot_username: &str, payload: &str) -> String {
    format!("https://t.me/{}?start={}", bot_username.trim_start_matches('@'), payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello", None), None);
        assert_eq!(parse_command("/", None), None);
    }

    #[test]
    fn start_with_and_without_payload() {
        assert_eq!(parse_command("/start", None), Some(Command::Start(None)));
        assert_eq!(
            parse_command("/start qr_abc123", None),
            Some(Command::Start(Some("qr_abc123".into())))
        );
    }

    #[test]
    fn bot_suffix_must_match() {
        assert_eq!(parse_command("/help@PrHubBot", Some("prhubbot")), Some(Command::Help));
        assert_eq!(parse_command("/help@other_bot", Some("prhubbot")), None);
        // Unknown own username: accept any suffix.
        assert_eq!(parse_command("/me@whatever", None), Some(Command::Me));
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert_eq!(parse_command("/Tasks now", None), Some(Command::Unknown("tasks".into())));
    }

    #[test]
    fn qr_tokens() {
        assert_eq!(parse_command("/start qr_tok", None).unwrap().qr_token(), Some("tok"));
        assert_eq!(parse_command("/start qr_", None).unwrap().qr_token(), None);
        assert_eq!(parse_command("/start hello", None).unwrap().qr_token(), None);
        assert_eq!(Command::Help.qr_token(), None);
    }

    #[test]
    fn deep_links() {
        assert_eq!(deep_link("@prhub_bot", "qr_x"), "https://t.me/prhub_bot?start=qr_x");
    }
}
