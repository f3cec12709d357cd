//! SSH port forwarding to reach a cluster behind a bastion host.
//!
//! The tunnel is an `ssh -N -L` child process; the client then talks to
//! `http://localhost:<localport>`.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::search::normalize_url;

/// Local port used when the tunnel spec does not name one.
pub const DEFAULT_LOCAL_PORT: u16 = 9199;

/// SSH port used when the tunnel spec does not name one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Remote port used when the cluster URL carries none.
const DEFAULT_REMOTE_PORT: u16 = 9200;

/// Time given to ssh to set up the forward before the first request.
pub const STARTUP_GRACE: Duration = Duration::from_secs(1);

#[derive(thiserror::Error, Debug)]
pub enum TunnelError {
    #[error("Invalid ssh tunnel specification '{0}', expected [localport:][user@]sshhost[:sshport]")]
    Parse(String),

    #[error("Failed to parse hostname/port from given URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to start ssh: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Parsed `[localport:][user@]sshhost[:sshport]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    pub local_port: u16,
    pub user: Option<String>,
    pub ssh_host: String,
    pub ssh_port: u16,
}

impl TunnelSpec {
    /// Parse a tunnel specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or a port is not a number.
    pub fn parse(spec: &str) -> Result<Self, TunnelError> {
        let invalid = || TunnelError::Parse(spec.to_string());
        let spec_trimmed = spec.trim();

        let (local_port, rest) = match spec_trimmed.split_once(':') {
            Some((head, tail)) if !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) => {
                (head.parse().map_err(|_| invalid())?, tail)
            }
            _ => (DEFAULT_LOCAL_PORT, spec_trimmed),
        };

        let (user, host_port) = match rest.split_once('@') {
            Some((user, host_port)) if !user.is_empty() => (Some(user.to_string()), host_port),
            Some(_) => return Err(invalid()),
            None => (None, rest),
        };

        let (ssh_host, ssh_port) = match host_port.split_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
            None => (host_port, DEFAULT_SSH_PORT),
        };
        if ssh_host.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            local_port,
            user,
            ssh_host: ssh_host.to_string(),
            ssh_port,
        })
    }

    /// URL the search client connects to while the tunnel is up.
    #[must_use]
    pub fn tunnel_url(&self) -> String {
        format!("http://localhost:{}", self.local_port)
    }

    /// `[user@]host` as passed to ssh.
    #[must_use]
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.ssh_host),
            None => self.ssh_host.clone(),
        }
    }
}

/// Host and port of the cluster as seen from the ssh server.
///
/// A URL without a port forwards to 9200; an explicit port, including the
/// scheme's default, is kept.
///
/// # Errors
///
/// Returns an error if the URL cannot be parsed or has no host.
pub fn remote_endpoint(cluster_url: &str) -> Result<(String, u16), TunnelError> {
    let normalized = normalize_url(cluster_url);
    let parsed =
        url::Url::parse(&normalized).map_err(|_| TunnelError::InvalidUrl(cluster_url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| TunnelError::InvalidUrl(cluster_url.to_string()))?;
    let port = if has_explicit_port(&normalized) {
        parsed.port_or_known_default()
    } else {
        None
    };
    Ok((host.to_string(), port.unwrap_or(DEFAULT_REMOTE_PORT)))
}

/// Whether the authority of `url` names a port.
fn has_explicit_port(url: &str) -> bool {
    let authority = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let after_host = host_port.rsplit_once(']').map_or(host_port, |(_, rest)| rest);
    after_host
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

/// Arguments for `ssh` that forward the local port to the cluster.
#[must_use]
pub fn ssh_args(spec: &TunnelSpec, remote_host: &str, remote_port: u16) -> Vec<String> {
    vec![
        "-N".to_string(),
        "-p".to_string(),
        spec.ssh_port.to_string(),
        "-L".to_string(),
        format!("{}:{remote_host}:{remote_port}", spec.local_port),
        spec.destination(),
    ]
}

/// A running ssh forward. The child is killed when this is dropped.
#[derive(Debug)]
pub struct SshTunnel {
    spec: TunnelSpec,
    child: Child,
}

impl SshTunnel {
    /// Spawn ssh forwarding `spec.local_port` to the host of `cluster_url`.
    ///
    /// Does not wait for the forward to be established; see [`STARTUP_GRACE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the spec or URL is invalid or ssh cannot be started.
    pub fn start(spec: TunnelSpec, cluster_url: &str) -> Result<Self, TunnelError> {
        let (remote_host, remote_port) = remote_endpoint(cluster_url)?;
        tracing::trace!(remote_host = %remote_host, remote_port, "SSH tunnel remote endpoint");
        tracing::info!(
            local_port = spec.local_port,
            user = spec.user.as_deref().unwrap_or(""),
            ssh_host = %spec.ssh_host,
            ssh_port = spec.ssh_port,
            remote_host = %remote_host,
            remote_port,
            "Starting SSH tunnel"
        );

        let child = Command::new("ssh")
            .args(ssh_args(&spec, &remote_host, remote_port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        Ok(Self { spec, child })
    }

    #[must_use]
    pub fn spec(&self) -> &TunnelSpec {
        &self.spec
    }

    #[must_use]
    pub fn tunnel_url(&self) -> String {
        self.spec.tunnel_url()
    }

    /// Process id of the ssh child, if it is still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_only() {
        let spec = TunnelSpec::parse("bastion.example.com").unwrap();
        assert_eq!(
            spec,
            TunnelSpec {
                local_port: DEFAULT_LOCAL_PORT,
                user: None,
                ssh_host: "bastion.example.com".to_string(),
                ssh_port: DEFAULT_SSH_PORT,
            }
        );
        assert_eq!(spec.tunnel_url(), "http://localhost:9199");
    }

    #[test]
    fn test_parse_full_spec() {
        let spec = TunnelSpec::parse("9300:deploy@bastion:2222").unwrap();
        assert_eq!(spec.local_port, 9300);
        assert_eq!(spec.user.as_deref(), Some("deploy"));
        assert_eq!(spec.ssh_host, "bastion");
        assert_eq!(spec.ssh_port, 2222);
        assert_eq!(spec.destination(), "deploy@bastion");
    }

    #[test]
    fn test_parse_user_and_port() {
        let spec = TunnelSpec::parse("ops@jump:2200").unwrap();
        assert_eq!(spec.local_port, DEFAULT_LOCAL_PORT);
        assert_eq!(spec.ssh_port, 2200);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(TunnelSpec::parse("").is_err());
        assert!(TunnelSpec::parse("@host").is_err());
        assert!(TunnelSpec::parse("host:ssh").is_err());
        assert!(TunnelSpec::parse("99999:host").is_err());
    }

    #[test]
    fn test_remote_endpoint() {
        assert_eq!(
            remote_endpoint("http://es.internal:9201").unwrap(),
            ("es.internal".to_string(), 9201)
        );
        assert_eq!(
            remote_endpoint("es.internal").unwrap(),
            ("es.internal".to_string(), 9200)
        );
        assert_eq!(
            remote_endpoint("https://es.internal/").unwrap(),
            ("es.internal".to_string(), 9200)
        );
    }

    #[test]
    fn test_remote_endpoint_keeps_scheme_default_port() {
        assert_eq!(
            remote_endpoint("https://es.example.com:443").unwrap(),
            ("es.example.com".to_string(), 443)
        );
        assert_eq!(
            remote_endpoint("http://es.example.com:80").unwrap(),
            ("es.example.com".to_string(), 80)
        );
    }

    #[test]
    fn test_ssh_args() {
        let spec = TunnelSpec::parse("9300:deploy@bastion").unwrap();
        assert_eq!(
            ssh_args(&spec, "es.internal", 9200),
            vec!["-N", "-p", "22", "-L", "9300:es.internal:9200", "deploy@bastion"]
        );
    }
}
