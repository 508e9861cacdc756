//! Server tuning knobs.

use serde::Deserialize;

/// Maximum size of a request head (request line + headers + terminator)
/// before the connection is rejected with `413 Payload Too Large`.
pub const DEFAULT_MAX_HEAD_BYTES: usize = 8192;

/// How many bytes a single transport read may deliver.
pub const DEFAULT_READ_CHUNK_BYTES: usize = 4096;

/// Per-connection limits.
///
/// Deserializable so deployments can load limits from a config file;
/// [`Default`] gives the protocol defaults.
///
/// # Examples
///
/// ```
/// use filament::config::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(r#"{"max_head_bytes": 16384}"#).unwrap();
/// assert_eq!(config.max_head_bytes, 16384);
/// assert_eq!(config.read_chunk_bytes, 4096);
/// ```
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Reject request heads larger than this many bytes.
    pub max_head_bytes: usize,

    /// Upper bound on the size of one transport read.
    pub read_chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: DEFAULT_MAX_HEAD_BYTES,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_head_bytes, 8192);
        assert_eq!(config.read_chunk_bytes, 4096);
    }

    #[test]
    fn deserialize_partial_json() {
        let config: ServerConfig = serde_json::from_str(r#"{"read_chunk_bytes": 512}"#).unwrap();
        assert_eq!(config.max_head_bytes, DEFAULT_MAX_HEAD_BYTES);
        assert_eq!(config.read_chunk_bytes, 512);
    }

    #[test]
    fn deserialize_empty_json_gives_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_head_bytes, DEFAULT_MAX_HEAD_BYTES);
    }
}
