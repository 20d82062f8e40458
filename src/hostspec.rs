//! Parsing of `[user@]host[:port]` host-spec strings and hosts files.

use crate::errors::CoreError;

/// One parsed host spec, before config-file resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    /// Display alias; equal to `host` until config resolution overrides it.
    pub alias: String,
    /// Hostname or address as written in the spec.
    pub host: String,
    /// Port number, defaulting to 22 when not given.
    pub port: u16,
    /// User, when given explicitly.
    pub user: Option<String>,
    /// Whether the port was present in the original spec text.
    pub port_set: bool,
    /// Whether the user was present in the original spec text.
    pub user_set: bool,
}

const DEFAULT_PORT: u16 = 22;

/// Parses one `[user@]host[:port]` spec string.
pub fn parse_host_spec(input: &str) -> Result<HostSpec, CoreError> {
    let trimmed = input.trim();
    let (user, host_part) = split_user_host(trimmed)?;

    if host_part.is_empty() {
        return Err(invalid(input, "host is empty"));
    }

    if let Some(rest) = host_part.strip_prefix('[') {
        let close = rest.find(']').ok_or_else(|| invalid(input, "unterminated '[' in host"))?;
        let host = rest[..close].to_string();
        if host.is_empty() {
            return Err(invalid(input, "host is empty"));
        }
        let after = &rest[close + 1..];
        let (port, port_set) = if let Some(port_str) = after.strip_prefix(':') {
            (parse_port(input, port_str)?, true)
        } else if after.is_empty() {
            (DEFAULT_PORT, false)
        } else {
            return Err(invalid(input, "unexpected trailing characters after ']'"));
        };
        return Ok(HostSpec {
            alias: host.clone(),
            host,
            port,
            user_set: user.is_some(),
            user,
            port_set,
        });
    }

    let colon_count = host_part.matches(':').count();
    let (host, port, port_set) = match colon_count {
        0 => (host_part.to_string(), DEFAULT_PORT, false),
        1 => {
            let (h, p) = host_part.split_once(':').expect("one colon present");
            if h.is_empty() {
                return Err(invalid(input, "host is empty"));
            }
            (h.to_string(), parse_port(input, p)?, true)
        }
        // Two or more unbracketed colons: treat the whole remainder as a
        // literal host (e.g. a bare IPv6 address) rather than erroring.
        _ => (host_part.to_string(), DEFAULT_PORT, false),
    };

    Ok(HostSpec {
        alias: host.clone(),
        host,
        port,
        user_set: user.is_some(),
        user,
        port_set,
    })
}

/// Splits on the *last* `@` to separate an optional user from the host part.
fn split_user_host(input: &str) -> Result<(Option<String>, &str), CoreError> {
    match input.rfind('@') {
        None => Ok((None, input)),
        Some(idx) => {
            let (user, rest) = (&input[..idx], &input[idx + 1..]);
            if user.is_empty() || rest.is_empty() {
                return Err(invalid(input, "invalid user@host"));
            }
            Ok((Some(user.to_string()), rest))
        }
    }
}

fn parse_port(original: &str, text: &str) -> Result<u16, CoreError> {
    let value: u32 = text
        .parse()
        .map_err(|_| invalid(original, format!("invalid port {text:?}")))?;
    if value == 0 || value > 65535 {
        return Err(invalid(original, format!("port {value} out of range")));
    }
    Ok(value as u16)
}

fn invalid(text: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidHostSpec {
        text: text.to_string(),
        line: None,
        reason: reason.into(),
    }
}

/// Parses a hosts file: one spec per non-blank line, blank lines ignored.
/// Errors carry the 1-based line number.
pub fn parse_hosts_file(data: &str) -> Result<Vec<HostSpec>, CoreError> {
    let mut specs = Vec::new();
    for (idx, raw_line) in data.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let spec = parse_host_spec(line).map_err(|err| match err {
            CoreError::InvalidHostSpec { text, reason, .. } => CoreError::InvalidHostSpec {
                text,
                line: Some(idx + 1),
                reason,
            },
            other => other,
        })?;
        specs.push(spec);
    }
    Ok(specs)
}

/// Applies a group-level fallback user to specs that didn't set their own.
pub fn apply_group_user(specs: &mut [HostSpec], group_user: Option<&str>) {
    let Some(user) = group_user else { return };
    for spec in specs {
        if !spec.user_set {
            spec.user = Some(user.to_string());
            spec.user_set = true;
        }
    }
}
