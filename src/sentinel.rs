//! End-of-job marker embedded in an interactive shell's output stream.

/// Literal prefix preceding `<jobID>:<exitCode>`.
pub const SENTINEL_PREFIX: &str = "__PRETTY_EXIT__";

/// Builds the marker text for `job_id` (prefix + id only; the exit code is
/// appended at shell runtime by the wrapped command's own `printf`).
pub fn sentinel_for(job_id: u64) -> String {
    format!("{SENTINEL_PREFIX}{job_id}")
}

/// Result of locating a sentinel marker within a line, wherever it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Text preceding the marker (may be empty; this is real command output).
    pub prefix: String,
    /// Parsed job id.
    pub job_id: u64,
    /// Parsed exit code.
    pub exit_code: i32,
}

/// Locates `__PRETTY_EXIT__<jobID>:<exitCode>` anywhere in `line`.
///
/// The payload after `:` must be a canonical decimal integer (no leading
/// zeros, no embedded whitespace, no trailing text) or the match is rejected.
pub fn extract_sentinel(line: &str) -> Option<Extracted> {
    let idx = line.find(SENTINEL_PREFIX)?;
    let prefix = line[..idx].to_string();
    let payload = &line[idx + SENTINEL_PREFIX.len()..];

    let colon = payload.find(':')?;
    let (job_part, rest) = (&payload[..colon], &payload[colon + 1..]);

    let job_id: u64 = job_part.parse().ok()?;
    if job_id.to_string() != job_part {
        return None;
    }

    let exit_code: i32 = rest.parse().ok()?;
    if exit_code.to_string() != rest {
        return None;
    }

    Some(Extracted { prefix, job_id, exit_code })
}

/// Like [`extract_sentinel`] but only succeeds when the marker fills the
/// entire line (no leading prefix text).
pub fn parse_sentinel_exact(line: &str) -> Option<(u64, i32)> {
    let extracted = extract_sentinel(line)?;
    if extracted.prefix.is_empty() {
        Some((extracted.job_id, extracted.exit_code))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_roundtrip() {
        for job_id in [1u64, 7, 9999] {
            for exit_code in [0i32, 1, 127, -1] {
                let line = format!("{}{}:{}", SENTINEL_PREFIX, job_id, exit_code);
                let (j, e) = parse_sentinel_exact(&line).unwrap();
                assert_eq!(j, job_id);
                assert_eq!(e, exit_code);
            }
        }
    }

    #[test]
    fn s4_inline_prefix_is_extracted() {
        let extracted = extract_sentinel("whoami__PRETTY_EXIT__7:0").unwrap();
        assert_eq!(extracted.prefix, "whoami");
        assert_eq!(extracted.job_id, 7);
        assert_eq!(extracted.exit_code, 0);
    }

    #[test]
    fn s4_trailing_text_rejects_exact_and_extract() {
        assert!(extract_sentinel("__PRETTY_EXIT__7:0 extra").is_none());
    }

    #[test]
    fn non_canonical_decimal_is_rejected() {
        assert!(extract_sentinel("__PRETTY_EXIT__07:0").is_none());
        assert!(extract_sentinel("__PRETTY_EXIT__7:00").is_none());
        assert!(extract_sentinel("__PRETTY_EXIT__ 7:0").is_none());
        assert!(extract_sentinel("__PRETTY_EXIT__7: 0").is_none());
    }

    #[test]
    fn parse_exact_rejects_nonempty_prefix() {
        assert!(parse_sentinel_exact("whoami__PRETTY_EXIT__7:0").is_none());
    }

    #[test]
    fn no_marker_present() {
        assert!(extract_sentinel("plain output line").is_none());
    }

    #[test]
    fn sentinel_for_has_no_colon() {
        assert_eq!(sentinel_for(42), "__PRETTY_EXIT__42");
    }
}
