//! Chat command grammar: a keyword followed by one approval identifier.
//!
//! ```text
//! approve k8s/project/repo:1.2.3
//! lgtm    k8s/project/repo:1.2.3
//! reject  k8s/project/repo:1.2.3
//! help
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::approval::{is_valid_identifier, Decision};

pub const APPROVE_KEYWORD: &str = "approve";
pub const APPROVE_ALIAS: &str = "lgtm";
pub const REJECT_KEYWORD: &str = "reject";
pub const HELP_KEYWORD: &str = "help";

/// Leading `<@U123>` mention of the bot, as Slack renders it.
static MENTION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@[A-Za-z0-9]+>:?\s*").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Vote {
        decision: Decision,
        identifier: String,
    },
    Help,
}

/// Returns `None` for anything that is not exactly one command. Chat is
/// mostly people talking to each other, so unknown text is not an error.
pub fn parse(text: &str) -> Option<Command> {
    let text = MENTION_REGEX.replace(text.trim(), "");
    let mut tokens = text.split_whitespace();

    let keyword = tokens.next()?.to_lowercase();
    let argument = tokens.next().map(|t| t.trim_matches('`'));
    if tokens.next().is_some() {
        return None;
    }

    let decision = match (keyword.as_str(), argument) {
        (HELP_KEYWORD, None) => return Some(Command::Help),
        (APPROVE_KEYWORD | APPROVE_ALIAS, Some(_)) => Decision::Approve,
        (REJECT_KEYWORD, Some(_)) => Decision::Reject,
        _ => return None,
    };

    let identifier = argument?;
    if !is_valid_identifier(identifier) {
        return None;
    }
    Some(Command::Vote {
        decision,
        identifier: identifier.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(decision: Decision, id: &str) -> Option<Command> {
        Some(Command::Vote {
            decision,
            identifier: id.to_string(),
        })
    }

    #[test]
    fn test_parse_approve_and_alias() {
        assert_eq!(parse("approve p/r:1.2.3"), vote(Decision::Approve, "p/r:1.2.3"));
        assert_eq!(parse("lgtm p/r:1.2.3"), vote(Decision::Approve, "p/r:1.2.3"));
        assert_eq!(parse("  LGTM   p/r:1.2.3 "), vote(Decision::Approve, "p/r:1.2.3"));
    }

    #[test]
    fn test_parse_reject() {
        assert_eq!(
            parse("reject k8s/project/repo:1.2.3"),
            vote(Decision::Reject, "k8s/project/repo:1.2.3")
        );
    }

    #[test]
    fn test_parse_strips_mention_and_backticks() {
        assert_eq!(
            parse("<@U024BE7LH> approve `p/r:1.2.3`"),
            vote(Decision::Approve, "p/r:1.2.3")
        );
        assert_eq!(parse("<@U024BE7LH>: help"), Some(Command::Help));
    }

    #[test]
    fn test_parse_ignores_noise() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("good morning"), None);
        assert_eq!(parse("approve"), None);
        assert_eq!(parse("approve not-an-id"), None);
        assert_eq!(parse("approve p/r:1.2.3 please"), None);
        assert_eq!(parse("approved p/r:1.2.3"), None);
        assert_eq!(parse("help me"), None);
    }
}
