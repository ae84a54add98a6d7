//! Operator command line parsing.

use clap::{Parser, Subcommand};

/// One line typed at the console prompt.
#[derive(Debug, Parser)]
#[command(multicall = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: Command,
}

/// Commands understood by the console.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Show which lockers are occupied
    Status,

    /// Show the assignment of one locker
    Show { locker: String },

    /// Assign a locker and lock it
    Occupy {
        locker: String,
        /// Name or job number of the occupant
        occupant: String,
        /// Where to send the passcode
        email: Option<String>,
        /// Use this passcode instead of generating one
        #[arg(long)]
        passcode: Option<String>,
        /// Do not send the passcode notice
        #[arg(long)]
        no_notify: bool,
    },

    /// Open a locker and release its assignment
    Unlock { locker: String },

    /// Replace local records with the controller's state
    Sync,

    /// Replace the controller's state with local records
    Push,

    /// Leave the console
    #[command(alias = "exit")]
    Quit,
}

impl Command {
    /// The question to confirm before running, for commands that change state.
    pub fn confirmation(&self) -> Option<String> {
        match self {
            Command::Occupy {
                locker,
                occupant,
                email,
                no_notify,
                ..
            } => {
                let notice = match (email, no_notify) {
                    (Some(email), false) => format!(", passcode sent to {email}"),
                    _ => String::new(),
                };
                Some(format!("Occupy locker {locker} for {occupant}{notice}?"))
            }
            Command::Unlock { locker } => Some(format!("Unlock locker {locker}?")),
            Command::Sync => Some("Replace local records with the controller's state?".to_string()),
            Command::Push => Some("Overwrite the controller's state with local records?".to_string()),
            Command::Status | Command::Show { .. } | Command::Quit => None,
        }
    }
}

/// Parses one input line. Blank lines yield `None`.
///
/// `help` and malformed input come back as a [`clap::Error`] whose text is
/// meant for the operator.
pub fn parse_line(line: &str) -> Result<Option<Command>, clap::Error> {
    let words = split_words(line);
    if words.is_empty() {
        return Ok(None);
    }
    ConsoleLine::try_parse_from(words).map(|parsed| Some(parsed.command))
}

/// Splits on whitespace; double quotes group words, so `"jane doe"` is one.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// Only an explicit yes confirms.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
