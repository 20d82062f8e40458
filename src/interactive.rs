//! Parses `:`-prefixed interactive commands typed at the prompt.

/// The kind of action an interactive input line requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run `command` as a Normal job on every connected host.
    Run { command: String },
    /// Run `command` as an Async job on every connected host.
    Async { command: String },
    /// Show status for one job, or every retained job when `job_id` is `None`.
    Status { job_id: Option<u64> },
    /// List the current host roster and connection state.
    List,
    /// Show interactive command help.
    Help,
    /// Toggle or jump the output viewport's scroll mode.
    Scroll,
    /// Quit the program.
    Exit,
}

/// Parses one line of input typed at the interactive prompt.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed {
        ":bye" | "exit" => return Command::Exit,
        ":help" => return Command::Help,
        ":scroll" => return Command::Scroll,
        ":list" => return Command::List,
        _ => {}
    }
    if let Some(rest) = trimmed.strip_prefix(":status") {
        let arg = rest.trim();
        return if arg.is_empty() {
            Command::Status { job_id: None }
        } else {
            Command::Status { job_id: arg.parse().ok() }
        };
    }
    if let Some(rest) = trimmed.strip_prefix(":async") {
        return Command::Async { command: rest.trim().to_string() };
    }
    Command::Run { command: trimmed.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_run_command() {
        assert_eq!(parse_command("uptime"), Command::Run { command: "uptime".into() });
    }

    #[test]
    fn exit_aliases() {
        assert_eq!(parse_command(":bye"), Command::Exit);
        assert_eq!(parse_command("exit"), Command::Exit);
    }

    #[test]
    fn status_without_job_id() {
        assert_eq!(parse_command(":status"), Command::Status { job_id: None });
        assert_eq!(parse_command("  :status  "), Command::Status { job_id: None });
    }

    #[test]
    fn status_with_job_id() {
        assert_eq!(parse_command(":status 7"), Command::Status { job_id: Some(7) });
    }

    #[test]
    fn status_with_garbage_id_falls_back_to_none() {
        assert_eq!(parse_command(":status nope"), Command::Status { job_id: None });
    }

    #[test]
    fn async_captures_trimmed_remainder() {
        assert_eq!(parse_command(":async  echo hi  "), Command::Async { command: "echo hi".into() });
    }

    #[test]
    fn async_with_no_remainder_is_empty_command() {
        assert_eq!(parse_command(":async"), Command::Async { command: String::new() });
    }

    #[test]
    fn list_help_scroll() {
        assert_eq!(parse_command(":list"), Command::List);
        assert_eq!(parse_command(":help"), Command::Help);
        assert_eq!(parse_command(":scroll"), Command::Scroll);
    }
}
