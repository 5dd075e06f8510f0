//! Node configuration.

use std::path::Path;

use serde::Deserialize;

/// Default TCP port agents connect to.
pub const DEFAULT_AGENT_PORT: u16 = 3333;

/// Default number of runtime worker threads.
pub const DEFAULT_THREADS: usize = 4;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: u32 = 256;

/// Default cap on a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Error raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for a [`NodeConfig`].
    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables of a node, loadable from a TOML file.
///
/// Every field has a default, so an empty file (or no file at all) yields
/// a working configuration. CLI flags override file values in the
/// launcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// TCP port to listen on. Port `0` asks the OS for an ephemeral port.
    pub port: u16,
    /// Number of worker threads driving the I/O runtime.
    pub threads: usize,
    /// Listen backlog handed to the socket.
    pub backlog: u32,
    /// Upper bound on a single wire frame, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_AGENT_PORT,
            threads: DEFAULT_THREADS,
            backlog: DEFAULT_BACKLOG,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl NodeConfig {
    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, DEFAULT_AGENT_PORT);
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.backlog, DEFAULT_BACKLOG);
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config: NodeConfig = toml::from_str("port = 4000\nthreads = 2\n").unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.threads, 2);
        assert_eq!(config.backlog, DEFAULT_BACKLOG);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<NodeConfig>("ports = 4000\n").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 4242").unwrap();
        let config = NodeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 4242);
    }
}
