//! Client-construction configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP Basic credentials.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BasicAuth {
    pub user: String,
    pub pass: String,
}

/// Options recognised at `Client` construction. The wire protocol version is
/// fixed at v2; there is no `default_protocol_version` knob to flip.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientConfig {
    pub basic_auth: Option<BasicAuth>,
    pub user_agent: String,
    pub http_headers: HashMap<String, String>,
    /// Concurrent in-flight blob-fetch batches.
    pub max_in_flight: usize,
    /// Hashes per `fetch want=...` batch.
    pub batch_size: usize,
    /// Combined `want` line byte threshold before a batch is split further.
    pub batch_byte_threshold: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            basic_auth: None,
            user_agent: format!("git-smart-core/{}", env!("CARGO_PKG_VERSION")),
            http_headers: HashMap::new(),
            max_in_flight: 10,
            batch_size: 100,
            batch_byte_threshold: 64 * 1024,
        }
    }
}
