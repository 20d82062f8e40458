//! Wraps a user command with the sentinel-emitting `printf` suffix.

use crate::sentinel::sentinel_for;

/// Appends the sentinel emitter to `command`, choosing `;`-separation or a
/// bare newline depending on the command's trailing shell operator so the
/// emitter is always syntactically valid regardless of how the command ends.
pub fn wrap_command(command: &str, job_id: u64) -> String {
    let trimmed_right = command.trim_end();
    let needs_newline = ["&&", "||", "&", ";"].iter().any(|op| trimmed_right.ends_with(op));
    let sep = if needs_newline { "\n" } else { "; " };
    format!("{command}{sep}printf '{}:%d\\n' $?", sentinel_for(job_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_trailing_and_operator_uses_newline() {
        let wrapped = wrap_command("echo ok &&", 7);
        assert!(wrapped.contains("echo ok &&\nprintf '__PRETTY_EXIT__7:%d\\n' $?"));
        assert!(!wrapped.contains("&&;"));
    }

    #[test]
    fn plain_command_uses_semicolon_separator() {
        let wrapped = wrap_command("echo hi", 3);
        assert_eq!(wrapped, "echo hi; printf '__PRETTY_EXIT__3:%d\\n' $?");
    }

    #[test]
    fn trailing_semicolon_uses_newline() {
        let wrapped = wrap_command("echo hi;", 3);
        assert!(wrapped.starts_with("echo hi;\nprintf"));
    }

    #[test]
    fn trailing_background_ampersand_uses_newline() {
        let wrapped = wrap_command("sleep 5 &", 3);
        assert!(wrapped.starts_with("sleep 5 &\nprintf"));
    }

    #[test]
    fn trailing_or_operator_uses_newline() {
        let wrapped = wrap_command("false ||", 3);
        assert!(wrapped.starts_with("false ||\nprintf"));
    }

    #[test]
    fn trailing_whitespace_is_trimmed_before_checking_operator() {
        let wrapped = wrap_command("echo hi &&   ", 3);
        assert!(wrapped.contains("echo hi &&   \nprintf"));
    }
}
