use std::fmt::Write;

use sharepane_core::{DisplayRow, OutboundPayload, UserIntent, progress_ratio};
use thiserror::Error;

/// One line typed on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Action { id: String, intent: UserIntent },
    Send { id: String },
    Stage(OutboundPayload),
    Clear,
    Dismiss { id: String },
    List,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("{0} needs an id")]
    MissingId(&'static str),
    #[error("stage needs at least one file path")]
    NoFiles,
    #[error("unknown command {0:?}; try accept reject cancel send stage clear dismiss list quit")]
    Unknown(String),
}

pub fn parse_user_command(line: &str) -> Result<UserCommand, ParseError> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or(ParseError::Empty)?;

    let command = match verb {
        "accept" | "reject" | "decline" | "cancel" => {
            let intent = verb
                .parse::<UserIntent>()
                .map_err(|_| ParseError::Unknown(verb.to_owned()))?;
            let id = words.next().ok_or(ParseError::MissingId("action"))?;
            UserCommand::Action {
                id: id.to_owned(),
                intent,
            }
        }
        "send" => UserCommand::Send {
            id: words
                .next()
                .ok_or(ParseError::MissingId("send"))?
                .to_owned(),
        },
        "dismiss" => UserCommand::Dismiss {
            id: words
                .next()
                .ok_or(ParseError::MissingId("dismiss"))?
                .to_owned(),
        },
        "stage" => {
            let files: Vec<String> = words.map(str::to_owned).collect();
            if files.is_empty() {
                return Err(ParseError::NoFiles);
            }
            UserCommand::Stage(OutboundPayload::Files(files))
        }
        "clear" => UserCommand::Clear,
        "list" | "ls" => UserCommand::List,
        "quit" | "exit" => UserCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_owned())),
    };

    Ok(command)
}

/// Plain-text rendering, one row per line.
pub fn render_rows(rows: &[DisplayRow]) -> String {
    if rows.is_empty() {
        return "(nothing to show)\n".to_owned();
    }

    let mut out = String::new();
    for row in rows {
        let _ = write!(out, "{:<12} {} ({})", row.id, row.name, row.device_type);
        match row.state {
            None => out.push_str("  available"),
            Some(state) => {
                let _ = write!(out, "  {state:?}");
            }
        }
        if let Some(pin) = &row.pin_code {
            let _ = write!(out, "  PIN {pin}");
        }
        if row.total_bytes.is_some() {
            let _ = write!(out, "  {:.0}%", progress_ratio(row));
        }
        if let Some(description) = &row.text_description {
            let _ = write!(out, "  {description}");
        }
        if let Some(files) = &row.files {
            let _ = write!(out, "  {}", files.join(", "));
        }
        out.push('\n');
    }
    out
}
