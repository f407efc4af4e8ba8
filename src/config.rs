//! Configuration for sharevote

use crate::cluster::auth::{DEFAULT_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS};
use crate::cluster::{NodeDescriptor, SchemaSummary};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Environment variable overriding the signing key
pub const SECRET_KEY_ENV: &str = "SHAREVOTE_SECRET_KEY";

/// Environment variable overriding the request timeout, in seconds
pub const REQUEST_TIMEOUT_ENV: &str = "SHAREVOTE_REQUEST_TIMEOUT";

/// Hex-encoded signing key, wiped from memory on drop
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        SecretKey(Zeroizing::new(key.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl Serialize for SecretKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretKey::new)
    }
}

/// One storage node as configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Endpoint root
    pub url: String,

    /// Node identifier (token audience)
    #[serde(rename = "did", alias = "node_id")]
    pub node_id: String,

    /// Organization identifier (token issuer)
    #[serde(rename = "org", alias = "org_id")]
    pub org_id: String,

    /// Access token, written after initialization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Schema id, written after initialization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<Uuid>,
}

impl NodeConfig {
    pub fn new(url: impl Into<String>, node_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        NodeConfig {
            url: url.into(),
            node_id: node_id.into(),
            org_id: org_id.into(),
            bearer_token: None,
            schema_id: None,
        }
    }

    /// Identity of this node
    pub fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(self.url.clone(), self.node_id.clone(), self.org_id.clone())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, e.g. "info" or "sharevote=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// Cluster client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Storage nodes, in share order
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Organization signing key (hex secp256k1 scalar)
    #[serde(default, alias = "org_secret_key", skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<SecretKey>,

    /// Vote vector length, written after initialization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_count: Option<usize>,

    /// Lifetime of issued access tokens
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,

    /// Upper bound for every node request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retry policy for schema creation
    #[serde(default)]
    pub provisioning_retry: RetryPolicy,

    /// Retry policy for share uploads
    #[serde(default = "RetryPolicy::none")]
    pub upload_retry: RetryPolicy,

    /// Retry policy for reads
    #[serde(default = "RetryPolicy::none")]
    pub read_retry: RetryPolicy,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_token_ttl_secs() -> i64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_request_timeout_secs() -> u64 {
    crate::transport::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            nodes: Vec::new(),
            secret_key: None,
            slot_count: None,
            token_ttl_secs: default_token_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            provisioning_retry: RetryPolicy::default(),
            upload_retry: RetryPolicy::none(),
            read_retry: RetryPolicy::none(),
            logging: LoggingConfig::default(),
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl ClusterConfig {
    /// Load configuration from a file (YAML or JSON), with environment
    /// variable substitution and overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path_ref.display(), e))
        })?;

        let content = Self::substitute_env_vars(&content)?;

        let mut config: ClusterConfig = if is_yaml(path_ref) {
            serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse YAML config: {}", e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse JSON config: {}", e))
            })?
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Substitute `${VAR_NAME}` with the variable's value when it is set
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| Error::Config(format!("Invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        });

        Ok(result.into_owned())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(SECRET_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                self.secret_key = Some(SecretKey::new(key));
            }
        }

        if let Some(timeout) = lookup(REQUEST_TIMEOUT_ENV) {
            if let Ok(secs) = timeout.trim().parse::<u64>() {
                self.request_timeout_secs = secs;
            }
        }
    }

    /// Save configuration to a file (format determined by extension)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        let content = if is_yaml(path_ref) {
            serde_yaml::to_string(self).map_err(|e| {
                Error::Config(format!("Failed to serialize config to YAML: {}", e))
            })?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| {
                Error::Config(format!("Failed to serialize config to JSON: {}", e))
            })?
        };

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path_ref, content).map_err(|e| {
            Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one node is required".to_string(),
            ));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if !(node.url.starts_with("http://") || node.url.starts_with("https://")) {
                return Err(Error::InvalidConfig(format!(
                    "Node {}: url '{}' must start with http:// or https://",
                    index, node.url
                )));
            }
            if node.node_id.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "Node {}: node id is required",
                    index
                )));
            }
        }

        // Nodes must agree on one schema once any has one
        let mut schema_ids = self.nodes.iter().filter_map(|n| n.schema_id);
        if let Some(first) = schema_ids.next() {
            if schema_ids.any(|id| id != first) {
                return Err(Error::InvalidConfig(
                    "Nodes are configured with different schema ids".to_string(),
                ));
            }
        }

        if self.slot_count == Some(0) {
            return Err(Error::InvalidConfig(
                "Slot count must be greater than 0".to_string(),
            ));
        }

        if self.token_ttl_secs <= 0 {
            return Err(Error::InvalidConfig(
                "Token lifetime must be greater than 0".to_string(),
            ));
        }
        if self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(Error::InvalidConfig(format!(
                "Token lifetime must be at most {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        for (name, policy) in [
            ("provisioning_retry", &self.provisioning_retry),
            ("upload_retry", &self.upload_retry),
            ("read_retry", &self.read_retry),
        ] {
            if policy.max_attempts == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{}: max_attempts must be at least 1",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Node identities, in share order
    pub fn descriptors(&self) -> Vec<NodeDescriptor> {
        self.nodes.iter().map(NodeConfig::descriptor).collect()
    }

    /// The signing key, required for initialization
    pub fn require_secret_key(&self) -> Result<&str> {
        self.secret_key
            .as_ref()
            .map(SecretKey::expose)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "No secret key configured; set secret_key or {}",
                    SECRET_KEY_ENV
                ))
            })
    }

    /// Whether initialization results are recorded
    pub fn is_provisioned(&self) -> bool {
        self.slot_count.is_some()
            && self
                .nodes
                .iter()
                .all(|n| n.bearer_token.is_some() && n.schema_id.is_some())
    }

    /// Store initialization results so later runs can reach the cluster
    /// without the signing key
    pub fn record_provisioning(&mut self, summary: &SchemaSummary) -> Result<()> {
        if summary.nodes.len() != self.nodes.len() {
            return Err(Error::InvalidConfig(format!(
                "Schema summary covers {} nodes, config has {}",
                summary.nodes.len(),
                self.nodes.len()
            )));
        }

        for (node, provisioned) in self.nodes.iter_mut().zip(&summary.nodes) {
            node.schema_id = Some(summary.schema_id);
            node.bearer_token = Some(provisioned.bearer_token.clone());
        }
        self.slot_count = Some(summary.slot_count);

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_seconds(self.token_ttl_secs).ok_or_else(|| {
            Error::Config(format!(
                "Token lifetime of {} seconds is out of range",
                self.token_ttl_secs
            ))
        })
    }
}
