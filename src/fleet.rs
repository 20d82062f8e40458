//! Builds the runtime host roster from parsed specs and SSH config.

use std::sync::Arc;

use crate::errors::CoreError;
use crate::host::{color_for_position, Host};
use crate::hostspec::HostSpec;
use crate::sshconfig::{self, SshConfig};

/// Resolves each spec against the user/system SSH config chain, resolves its
/// proxy-jump chain, and assigns a round-robin UI colour by position.
pub fn build_hosts(
    specs: &[HostSpec],
    user_config: Option<&SshConfig>,
    system_config: Option<&SshConfig>,
    fallback_user: Option<&str>,
) -> Result<Vec<Arc<Host>>, CoreError> {
    specs
        .iter()
        .enumerate()
        .map(|(position, spec)| {
            let resolved = sshconfig::resolve_host(spec, user_config, system_config, fallback_user);
            let proxy_chain = sshconfig::resolve_jump_chain(
                &resolved.proxy_jump,
                user_config,
                system_config,
                fallback_user,
            )?;
            Ok(Arc::new(Host::new(resolved, proxy_chain, color_for_position(position))))
        })
        .collect()
}
