//! The command capability interface.

use async_trait::async_trait;

use relay_core::types::{Claim, UserId};

use crate::error::CommandError;

/// One invocation of a command.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    /// Full message content, prefix included.
    pub content: String,
    /// Verified identity of the issuer.
    pub sender: Claim,
    /// Target of the carrying message, if directed.
    pub target: Option<UserId>,
}

impl CommandInvocation {
    /// The first word of the content, e.g. `/echo`.
    pub fn command_word(&self) -> &str {
        self.content.split_whitespace().next().unwrap_or("")
    }

    /// Everything after the command word, trimmed.
    pub fn args(&self) -> &str {
        let trimmed = self.content.trim_start();
        match trimmed.find(char::is_whitespace) {
            Some(idx) => trimmed[idx..].trim(),
            None => "",
        }
    }
}

/// A command contributed by a plugin.
///
/// `claims` must be cheap and side-effect free; it is asked for every
/// prefixed message until some handler says yes.
#[async_trait]
pub trait CommandHandler: Send + Sync + std::fmt::Debug {
    /// Canonical name shown in help output, e.g. `/echo`.
    fn name(&self) -> &str;

    /// One-line description for help output.
    fn description(&self) -> &str {
        ""
    }

    /// Whether this handler takes the content.
    fn claims(&self, content: &str) -> bool;

    /// Runs the command. `Some(reply)` is delivered to the issuer.
    async fn execute(&self, invocation: &CommandInvocation) -> Result<Option<String>, CommandError>;
}

/// `true` if the first word of `content` equals one of `names`, ignoring ASCII case.
pub fn matches_command(content: &str, names: &[&str]) -> bool {
    content
        .split_whitespace()
        .next()
        .is_some_and(|word| names.iter().any(|name| word.eq_ignore_ascii_case(name)))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use relay_core::types::Role;

    use super::*;

    fn invocation(content: &str) -> CommandInvocation {
        CommandInvocation {
            content: content.to_string(),
            sender: Claim {
                user_id: UserId::from("alice"),
                display_name: "alice".to_string(),
                role: Role::User,
                token_id: Default::default(),
                issued_at: Utc::now(),
                expires_at: Utc::now(),
            },
            target: None,
        }
    }

    #[test]
    fn test_args_split() {
        assert_eq!(invocation("/echo  hello world ").args(), "hello world");
        assert_eq!(invocation("/echo").args(), "");
        assert_eq!(invocation("/kick bob").command_word(), "/kick");
    }

    #[test]
    fn test_matches_command() {
        assert!(matches_command("/help", &["/help", "/?"]));
        assert!(matches_command("/HELP me", &["/help"]));
        assert!(!matches_command("/helpme", &["/help"]));
        assert!(!matches_command("", &["/help"]));
    }
}
