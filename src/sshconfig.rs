//! Minimal OpenSSH-style config file parser and host resolution chain.
//!
//! Recognizes `Host` pattern blocks and the four directives this crate needs:
//! `HostName`, `User`, `Port`, `IdentityFile` (repeatable), `ProxyJump`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::CoreError;
use crate::hostspec::HostSpec;

/// One `Host <patterns>` block and its directives, in file order.
#[derive(Debug, Clone, Default)]
struct HostBlock {
    patterns: Vec<String>,
    host_name: Option<String>,
    user: Option<String>,
    port: Option<u16>,
    identity_files: Vec<String>,
    proxy_jump: Option<String>,
}

impl HostBlock {
    fn matches(&self, alias: &str) -> bool {
        self.patterns.iter().any(|p| glob_match(p, alias))
    }
}

/// A parsed config file (may be absent entirely).
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<HostBlock>,
}

impl SshConfig {
    /// Loads a config file. A missing file yields `Ok(None)`; an existing but
    /// unreadable file is an error.
    pub fn load(path: &Path) -> Result<Option<Self>, CoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|err| CoreError::Resolve {
            alias: path.display().to_string(),
            reason: format!("cannot read ssh config: {err}"),
        })?;
        Ok(Some(Self::parse(&content)))
    }

    /// Parses already-loaded config text (exposed for composing test fixtures).
    pub fn parse(content: &str) -> Self {
        let mut blocks = Vec::new();
        let mut current: Option<HostBlock> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((k, v)) => (k, v.trim()),
                None => continue,
            };
            let key_lower = key.to_ascii_lowercase();

            if key_lower == "host" {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                current = Some(HostBlock {
                    patterns: value.split_whitespace().map(str::to_string).collect(),
                    ..Default::default()
                });
                continue;
            }

            let Some(block) = current.as_mut() else { continue };
            match key_lower.as_str() {
                "hostname" => block.host_name = Some(value.to_string()),
                "user" => block.user = Some(value.to_string()),
                "port" => block.port = value.parse().ok(),
                "identityfile" => {
                    if !value.is_empty() {
                        block.identity_files.push(value.to_string());
                    }
                }
                "proxyjump" => block.proxy_jump = Some(value.to_string()),
                _ => {}
            }
        }
        if let Some(block) = current {
            blocks.push(block);
        }
        Self { blocks }
    }

    /// Returns the first non-blank value for `f` across matching blocks, in file order.
    fn get_value<T: Clone>(&self, alias: &str, f: impl Fn(&HostBlock) -> Option<T>) -> Option<T> {
        self.blocks.iter().filter(|b| b.matches(alias)).find_map(&f)
    }

    /// Returns all identity files from matching blocks, preserving file order.
    fn get_all_identity_files(&self, alias: &str) -> Vec<String> {
        self.blocks
            .iter()
            .filter(|b| b.matches(alias))
            .flat_map(|b| b.identity_files.iter().cloned())
            .collect()
    }
}

/// `~`/`~/` prefix expansion against `$HOME`.
fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Very small subset of OpenSSH pattern matching: `*` and `?` wildcards, else exact match.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pat: &[u8], txt: &[u8]) -> bool {
        match (pat.first(), txt.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&pat[1..], txt) || (!txt.is_empty() && inner(pat, &txt[1..])),
            (Some(b'?'), Some(_)) => inner(&pat[1..], &txt[1..]),
            (Some(p), Some(t)) if p == t => inner(&pat[1..], &txt[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

/// Host after full config-chain resolution, ready to dial.
#[derive(Debug, Clone)]
pub struct ResolvedHost {
    /// Display alias (unaffected by `HostName` overrides).
    pub alias: String,
    /// Dial target hostname/address.
    pub host: String,
    /// Dial target port.
    pub port: u16,
    /// Resolved user.
    pub user: String,
    /// Ordered identity file paths (user config first, then system).
    pub identity_files: Vec<PathBuf>,
    /// Ordered chain of proxy-jump aliases (unresolved; resolve recursively as needed).
    pub proxy_jump: Vec<String>,
}

/// Resolves one host spec against user and system SSH config, in that precedence.
pub fn resolve_host(
    spec: &HostSpec,
    user_config: Option<&SshConfig>,
    system_config: Option<&SshConfig>,
    fallback_user: Option<&str>,
) -> ResolvedHost {
    let alias = spec.alias.clone();

    let mut host = spec.host.clone();
    if let Some(name) = user_config
        .and_then(|c| c.get_value(&alias, |b| b.host_name.clone()))
        .or_else(|| system_config.and_then(|c| c.get_value(&alias, |b| b.host_name.clone())))
    {
        host = name;
    }

    let user = if spec.user_set {
        spec.user.clone().unwrap_or_default()
    } else if let Some(u) = user_config
        .and_then(|c| c.get_value(&alias, |b| b.user.clone()))
        .or_else(|| system_config.and_then(|c| c.get_value(&alias, |b| b.user.clone())))
    {
        u
    } else if let Some(u) = fallback_user {
        u.to_string()
    } else {
        whoami::username()
    };

    let port = if spec.port_set {
        spec.port
    } else {
        user_config
            .and_then(|c| c.get_value(&alias, |b| b.port))
            .or_else(|| system_config.and_then(|c| c.get_value(&alias, |b| b.port)))
            .unwrap_or(22)
    };

    let mut identity_files = Vec::new();
    if let Some(c) = user_config {
        identity_files.extend(c.get_all_identity_files(&alias));
    }
    if let Some(c) = system_config {
        identity_files.extend(c.get_all_identity_files(&alias));
    }
    let identity_files = identity_files.iter().map(|p| expand_path(p)).collect();

    let proxy_jump = user_config
        .and_then(|c| c.get_value(&alias, |b| b.proxy_jump.clone()))
        .or_else(|| system_config.and_then(|c| c.get_value(&alias, |b| b.proxy_jump.clone())))
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ResolvedHost { alias, host, port, user, identity_files, proxy_jump }
}

/// Recursively resolves a proxy-jump chain, following each resolved jump
/// host's own `ProxyJump` directive in turn, failing on a cycle rather than
/// recursing unboundedly (see open question in the design notes).
pub fn resolve_jump_chain(
    jump_aliases: &[String],
    user_config: Option<&SshConfig>,
    system_config: Option<&SshConfig>,
    fallback_user: Option<&str>,
) -> Result<Vec<ResolvedHost>, CoreError> {
    let mut visited = std::collections::HashSet::new();
    let mut chain = Vec::new();
    resolve_jump_chain_into(jump_aliases, user_config, system_config, fallback_user, &mut visited, &mut chain)?;
    Ok(chain)
}

fn resolve_jump_chain_into(
    jump_aliases: &[String],
    user_config: Option<&SshConfig>,
    system_config: Option<&SshConfig>,
    fallback_user: Option<&str>,
    visited: &mut std::collections::HashSet<String>,
    chain: &mut Vec<ResolvedHost>,
) -> Result<(), CoreError> {
    for alias in jump_aliases {
        if !visited.insert(alias.clone()) {
            return Err(CoreError::Resolve {
                alias: alias.clone(),
                reason: "cycle detected in ProxyJump chain".to_string(),
            });
        }
        let spec = crate::hostspec::parse_host_spec(alias).map_err(|_| CoreError::Resolve {
            alias: alias.clone(),
            reason: "invalid proxy-jump alias".to_string(),
        })?;
        let resolved = resolve_host(&spec, user_config, system_config, fallback_user);
        let nested = resolved.proxy_jump.clone();
        chain.push(resolved);
        if !nested.is_empty() {
            resolve_jump_chain_into(&nested, user_config, system_config, fallback_user, visited, chain)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> HostSpec {
        crate::hostspec::parse_host_spec(s).unwrap()
    }

    #[test]
    fn resolution_falls_back_through_chain() {
        let cfg = SshConfig::parse(
            "Host web*\n  User deploy\n  Port 2200\n  IdentityFile ~/.ssh/web_key\n",
        );
        let resolved = resolve_host(&spec("web1"), Some(&cfg), None, Some("fallback"));
        assert_eq!(resolved.user, "deploy");
        assert_eq!(resolved.port, 2200);
        assert_eq!(resolved.identity_files.len(), 1);
    }

    #[test]
    fn spec_explicit_values_win_over_config() {
        let cfg = SshConfig::parse("Host host1\n  User fromconfig\n  Port 9999\n");
        let resolved = resolve_host(&spec("deploy@host1:22"), Some(&cfg), None, None);
        assert_eq!(resolved.user, "deploy");
        assert_eq!(resolved.port, 22);
    }

    #[test]
    fn hostname_override_changes_dial_target_not_alias() {
        let cfg = SshConfig::parse("Host box1\n  HostName 10.0.0.5\n");
        let resolved = resolve_host(&spec("box1"), Some(&cfg), None, None);
        assert_eq!(resolved.alias, "box1");
        assert_eq!(resolved.host, "10.0.0.5");
    }

    #[test]
    fn identity_files_accumulate_user_then_system() {
        let user = SshConfig::parse("Host *\n  IdentityFile ~/.ssh/id_user\n");
        let system = SshConfig::parse("Host *\n  IdentityFile ~/.ssh/id_system\n");
        let resolved = resolve_host(&spec("host1"), Some(&user), Some(&system), None);
        assert_eq!(resolved.identity_files.len(), 2);
        assert!(resolved.identity_files[0].to_string_lossy().contains("id_user"));
        assert!(resolved.identity_files[1].to_string_lossy().contains("id_system"));
    }

    #[test]
    fn get_value_prefers_user_config_over_system() {
        let user = SshConfig::parse("Host *\n  User fromuser\n");
        let system = SshConfig::parse("Host *\n  User fromsystem\n");
        let resolved = resolve_host(&spec("host1"), Some(&user), Some(&system), None);
        assert_eq!(resolved.user, "fromuser");
    }

    #[test]
    fn proxy_jump_parses_comma_list() {
        let cfg = SshConfig::parse("Host target\n  ProxyJump jump1, jump2\n");
        let resolved = resolve_host(&spec("target"), Some(&cfg), None, None);
        assert_eq!(resolved.proxy_jump, vec!["jump1".to_string(), "jump2".to_string()]);
    }

    #[test]
    fn cycle_in_proxy_jump_is_rejected() {
        let aliases = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let err = resolve_jump_chain(&aliases, None, None, None).unwrap_err();
        assert!(matches!(err, CoreError::Resolve { .. }));
    }

    #[test]
    fn transitive_cycle_through_nested_proxy_jump_is_rejected() {
        let cfg = SshConfig::parse("Host a\n  ProxyJump b\nHost b\n  ProxyJump a\n");
        let aliases = vec!["a".to_string()];
        let err = resolve_jump_chain(&aliases, Some(&cfg), None, None).unwrap_err();
        assert!(matches!(err, CoreError::Resolve { .. }));
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let result = SshConfig::load(Path::new("/nonexistent/path/to/ssh_config")).unwrap();
        assert!(result.is_none());
    }
}
