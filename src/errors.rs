//! Crate-wide error classification for startup-fatal failures.
//!
//! Runtime per-host failures (dial, session, stdin write) are not modeled as
//! `CoreError` — they surface as `system` [`crate::host::OutputEvent`]s instead,
//! per the non-fatal-at-runtime policy.

use std::fmt;

/// Errors that can abort startup before the UI runs.
#[derive(Debug)]
pub enum CoreError {
    /// A host spec string, or a line in a hosts file, failed to parse.
    InvalidHostSpec {
        /// The offending text.
        text: String,
        /// 1-based line number, when the spec came from a file.
        line: Option<usize>,
        /// Human-readable reason.
        reason: String,
    },
    /// A host name failed resolution against the SSH config chain.
    Resolve {
        /// The alias that failed to resolve.
        alias: String,
        /// Human-readable reason.
        reason: String,
    },
    /// Neither positional hosts, `--hosts-file`, nor `--host-group` was given.
    NoHosts,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHostSpec { text, line: Some(n), reason } => {
                write!(f, "invalid hosts file entry on line {n}: {text:?}: {reason}")
            }
            Self::InvalidHostSpec { text, line: None, reason } => {
                write!(f, "invalid host {text:?}: {reason}")
            }
            Self::Resolve { alias, reason } => {
                write!(f, "failed to resolve host {alias:?}: {reason}")
            }
            Self::NoHosts => {
                write!(f, "requires at least one host, hostGroup or hostsFile")
            }
        }
    }
}

impl std::error::Error for CoreError {}
