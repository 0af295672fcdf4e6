//! Mention-command grammar: `<@BOT> <verb> <argument>`.

use once_cell::sync::Lazy;
use regex::Regex;

/// `<@U123>` or `<@U123|label>`; group 1 is the bare id.
static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<@([^>|\s]+)(?:\|[^>]*)?>").expect("mention pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tip { target: String },
    Register { address: String },
    Unknown { verb: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// The text does not start by mentioning the bot.
    NotAddressed,
    /// Addressed to the bot, but there is no usable `<verb> <argument>`.
    Malformed,
    Command(Command),
}

pub struct CommandParser;

impl CommandParser {
    pub fn parse(text: &str, bot_user_id: &str) -> Parsed {
        let Some(mention) = MENTION.captures(text) else {
            return Parsed::NotAddressed;
        };
        if &mention[1] != bot_user_id {
            return Parsed::NotAddressed;
        }

        let rest = &text[mention[0].len()..];
        if !rest.starts_with(char::is_whitespace) {
            return Parsed::Malformed;
        }
        let mut words = rest.split_whitespace();

        let Some(verb) = words.next() else {
            return Parsed::Malformed;
        };
        let argument = words.next();

        let command = match (verb, argument) {
            ("tip", Some(target)) => match chat_identity(target) {
                Some(target) => Command::Tip {
                    target: target.to_string(),
                },
                None => return Parsed::Malformed,
            },
            ("register", Some(address)) => Command::Register {
                address: strip_mention(address).to_string(),
            },
            ("tip" | "register", None) => return Parsed::Malformed,
            _ => Command::Unknown {
                verb: verb.to_string(),
            },
        };

        Parsed::Command(command)
    }
}

/// A tip target is a bare id or a complete user mention. Channel links
/// (`<#C1|general>`), broadcasts (`<!here>`) and unterminated mentions are not.
fn chat_identity(word: &str) -> Option<&str> {
    if word.starts_with('<') {
        let id = strip_mention(word);
        return (id != word).then_some(id);
    }
    if word.contains(['<', '>', '|']) {
        return None;
    }
    Some(word)
}

/// Reduce `<@U123|label>` and `<@U123>` to `U123`; anything else is returned as is.
fn strip_mention(word: &str) -> &str {
    match MENTION.captures(word) {
        Some(captures) if captures[0].len() == word.len() => {
            captures.get(1).map_or(word, |id| id.as_str())
        }
        _ => word,
    }
}
