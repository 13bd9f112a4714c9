//! Interactive control lines read from stdin during `draftbox get`.
//! Protocol: one command per line, e.g. "pause <id>" or "status".

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Pause(String),
    Resume(String),
    Cancel(String),
    /// Start (or restart) another draft into the same destination.
    Start(String),
    Status,
}

/// Why a control line was not understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlParseError {
    Empty,
    MissingId(&'static str),
    Unknown(String),
}

impl fmt::Display for ControlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlParseError::Empty => f.write_str("empty command"),
            ControlParseError::MissingId(verb) => write!(f, "usage: {verb} <id>"),
            ControlParseError::Unknown(word) => write!(
                f,
                "unknown command {word:?} (try pause, resume, cancel, start, status)"
            ),
        }
    }
}

pub fn parse_control_line(line: &str) -> Result<ControlCommand, ControlParseError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(ControlParseError::Empty);
    };
    let verb = verb.to_ascii_lowercase();
    let (name, build): (&'static str, fn(String) -> ControlCommand) = match verb.as_str() {
        "status" => return Ok(ControlCommand::Status),
        "pause" => ("pause", ControlCommand::Pause),
        "resume" => ("resume", ControlCommand::Resume),
        "cancel" => ("cancel", ControlCommand::Cancel),
        "start" => ("start", ControlCommand::Start),
        _ => return Err(ControlParseError::Unknown(verb)),
    };
    words
        .next()
        .map(|id| build(id.to_string()))
        .ok_or(ControlParseError::MissingId(name))
}
