//! Command-line surface: argument parsing and the host-list assembly it feeds.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::errors::CoreError;
use crate::hostspec::{self, HostSpec};

/// Run one command concurrently across a fleet of SSH hosts.
#[derive(Parser, Debug)]
#[command(name = "fleetsh", version, about)]
pub struct Cli {
    /// Host specs, `[user@]host[:port]`, space separated.
    pub hosts: Vec<String>,

    /// Path to a YAML config file (default: `~/.fleetsh.yaml`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to a newline-delimited hosts file.
    #[arg(short = 'H', long = "hosts-file")]
    pub hosts_file: Option<PathBuf>,

    /// Name of a host group defined in the config file.
    #[arg(short = 'G', long = "host-group")]
    pub host_group: Option<String>,

    /// Overrides the interactive prompt string.
    #[arg(long)]
    pub prompt: Option<String>,
}

/// Resolves the CLI's host arguments, config-file host group, and hosts-file
/// into one ordered list of parsed specs, applying the config's fallback user.
pub fn collect_host_specs(cli: &Cli, config: &Config) -> Result<Vec<HostSpec>, CoreError> {
    let mut specs = Vec::new();

    for arg in &cli.hosts {
        specs.push(hostspec::parse_host_spec(arg)?);
    }

    if let Some(path) = &cli.hosts_file {
        let data = std::fs::read_to_string(path).map_err(|err| CoreError::Resolve {
            alias: path.display().to_string(),
            reason: format!("cannot read hosts file: {err}"),
        })?;
        specs.extend(hostspec::parse_hosts_file(&data)?);
    }

    if let Some(name) = &cli.host_group {
        let group = config.groups.get(name).ok_or_else(|| CoreError::Resolve {
            alias: name.clone(),
            reason: "no such host group in config".to_string(),
        })?;
        let mut group_specs = group
            .hosts
            .iter()
            .map(|h| hostspec::parse_host_spec(h))
            .collect::<Result<Vec<_>, _>>()?;
        hostspec::apply_group_user(&mut group_specs, group.user.as_deref());
        specs.extend(group_specs);
    }

    if specs.is_empty() {
        return Err(CoreError::NoHosts);
    }

    hostspec::apply_group_user(&mut specs, config.username.as_deref());
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostGroup;

    fn cli(hosts: Vec<&str>) -> Cli {
        Cli {
            hosts: hosts.into_iter().map(str::to_string).collect(),
            config: None,
            hosts_file: None,
            host_group: None,
            prompt: None,
        }
    }

    #[test]
    fn positional_hosts_alone() {
        let specs = collect_host_specs(&cli(vec!["host1", "deploy@host2:2222"]), &Config::default()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].user.as_deref(), Some("deploy"));
    }

    #[test]
    fn no_hosts_anywhere_is_an_error() {
        let err = collect_host_specs(&cli(vec![]), &Config::default()).unwrap_err();
        assert!(matches!(err, CoreError::NoHosts));
    }

    #[test]
    fn host_group_from_config_expands() {
        let mut config = Config::default();
        config.groups.insert(
            "web".into(),
            HostGroup { user: Some("ops".into()), hosts: vec!["host1".into(), "host2".into()] },
        );
        let mut args = cli(vec![]);
        args.host_group = Some("web".into());
        let specs = collect_host_specs(&args, &config).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].user.as_deref(), Some("ops"));
    }

    #[test]
    fn unknown_host_group_is_an_error() {
        let mut args = cli(vec![]);
        args.host_group = Some("missing".into());
        let err = collect_host_specs(&args, &Config::default()).unwrap_err();
        assert!(matches!(err, CoreError::Resolve { .. }));
    }

    #[test]
    fn config_username_fills_specs_without_their_own() {
        let mut config = Config::default();
        config.username = Some("fallback".into());
        let specs = collect_host_specs(&cli(vec!["host1"]), &config).unwrap();
        assert_eq!(specs[0].user.as_deref(), Some("fallback"));
    }
}
