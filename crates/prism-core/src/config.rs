//! Gateway configuration
//!
//! Configuration is assembled from three JSON sources plus environment
//! overrides:
//! - `providers.json` — map of provider name to descriptor
//! - `tenants/<tenant_id>.json` — one tenant record per file
//! - `policies/routing.json` — optional overrides for the built-in
//!   routing policies
//!
//! Environment: `PORT`, `HEALTH_CHECK_INTERVAL` (ms),
//! `RATE_LIMIT_WINDOW_MS`, and one key variable per provider as named by
//! its `api_key_env`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{GatewayError, GatewayResult};

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
    #[serde(default)]
    pub policies: PolicySettings,
    /// Prober cadence in milliseconds
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    /// Rate-limit window in milliseconds
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: HashMap::new(),
            tenants: Vec::new(),
            policies: PolicySettings::default(),
            health_check_interval_ms: default_health_check_interval_ms(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_health_check_interval_ms() -> u64 {
    300_000
}

fn default_rate_limit_window_ms() -> u64 {
    60_000
}

/// Provider descriptor. The map key in `providers.json` is the provider's
/// unique name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// Override the adapter's default API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Upstream model the adapter targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// USD per token, used by the cost-aware policies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_token: Option<f64>,
    /// Adapter-internal request timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// Provider type tag, selects the adapter implementation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Groq,
    #[serde(rename = "huggingface")]
    HuggingFace,
}

/// Tenant record, one per `tenants/<tenant_id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub api_keys: Vec<String>,
    /// Provider names this tenant may use. Unknown names are ignored at
    /// routing time.
    #[serde(default)]
    pub allowed_providers: Vec<String>,
    #[serde(default)]
    pub routing_policy: PolicyName,
    #[serde(default)]
    pub quotas: TenantQuotas,
}

/// Per-tenant quota limits. Absent limits are unlimited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantQuotas {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_requests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_requests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
}

/// Built-in routing policy names. The canonical identifier for the
/// latency policy is `performance-first`; the underscore spelling is
/// accepted as a synonym.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyName {
    CostOptimized,
    #[serde(alias = "performance_first")]
    PerformanceFirst,
    #[default]
    Balanced,
}

impl PolicyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CostOptimized => "cost-optimized",
            Self::PerformanceFirst => "performance-first",
            Self::Balanced => "balanced",
        }
    }
}

/// Tunable parameters shared by all policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyParams {
    /// Providers below this uptime are filtered out, unless the filter
    /// would empty the candidate set.
    #[serde(default = "default_min_uptime")]
    pub min_uptime: f64,
    #[serde(default)]
    pub weights: BalancedWeights,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            min_uptime: default_min_uptime(),
            weights: BalancedWeights::default(),
        }
    }
}

fn default_min_uptime() -> f64 {
    0.90
}

/// Scoring weights for the balanced policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalancedWeights {
    pub uptime: f64,
    pub latency: f64,
    pub cost: f64,
}

impl Default for BalancedWeights {
    fn default() -> Self {
        Self {
            uptime: 0.3,
            latency: 0.4,
            cost: 0.3,
        }
    }
}

/// Per-policy parameter overrides, loaded from `policies/routing.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicySettings {
    #[serde(default)]
    pub cost_optimized: PolicyParams,
    #[serde(default, alias = "performance_first")]
    pub performance_first: PolicyParams,
    #[serde(default)]
    pub balanced: PolicyParams,
}

impl PolicySettings {
    pub fn params_for(&self, policy: PolicyName) -> &PolicyParams {
        match policy {
            PolicyName::CostOptimized => &self.cost_optimized,
            PolicyName::PerformanceFirst => &self.performance_first,
            PolicyName::Balanced => &self.balanced,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a directory containing `providers.json`,
    /// a `tenants/` directory, and optionally `policies/routing.json`,
    /// then apply environment overrides.
    pub fn load(dir: impl AsRef<Path>) -> GatewayResult<Self> {
        let dir = dir.as_ref();

        let providers_path = dir.join("providers.json");
        let providers_raw = std::fs::read_to_string(&providers_path).map_err(|e| {
            GatewayError::Config(format!("cannot read {}: {e}", providers_path.display()))
        })?;
        let providers: HashMap<String, ProviderConfig> = serde_json::from_str(&providers_raw)
            .map_err(|e| {
                GatewayError::Config(format!("invalid {}: {e}", providers_path.display()))
            })?;

        let mut tenants = Vec::new();
        let tenants_dir = dir.join("tenants");
        if tenants_dir.is_dir() {
            let mut entries: Vec<_> = std::fs::read_dir(&tenants_dir)
                .map_err(|e| {
                    GatewayError::Config(format!("cannot read {}: {e}", tenants_dir.display()))
                })?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            entries.sort();
            for path in entries {
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    GatewayError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                let tenant: TenantConfig = serde_json::from_str(&raw).map_err(|e| {
                    GatewayError::Config(format!("invalid {}: {e}", path.display()))
                })?;
                tenants.push(tenant);
            }
        }

        let mut policies = PolicySettings::default();
        let policies_path = dir.join("policies").join("routing.json");
        if policies_path.is_file() {
            let raw = std::fs::read_to_string(&policies_path).map_err(|e| {
                GatewayError::Config(format!("cannot read {}: {e}", policies_path.display()))
            })?;
            policies = serde_json::from_str(&raw).map_err(|e| {
                GatewayError::Config(format!("invalid {}: {e}", policies_path.display()))
            })?;
        }

        let mut config = Self {
            server: ServerConfig::default(),
            providers,
            tenants,
            policies,
            health_check_interval_ms: default_health_check_interval_ms(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT`, `HEALTH_CHECK_INTERVAL`, and `RATE_LIMIT_WINDOW_MS`
    /// environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(port) = env_parse::<u16>("PORT") {
            self.server.port = port;
        }
        if let Some(interval) = env_parse::<u64>("HEALTH_CHECK_INTERVAL") {
            self.health_check_interval_ms = interval;
        }
        if let Some(window) = env_parse::<u64>("RATE_LIMIT_WINDOW_MS") {
            self.rate_limit_window_ms = window;
        }
    }

    /// Startup invariants: API keys are unique across all tenants, and
    /// tenant ids do not collide.
    pub fn validate(&self) -> GatewayResult<()> {
        let mut seen_keys: HashSet<&str> = HashSet::new();
        let mut seen_tenants: HashSet<&str> = HashSet::new();
        for tenant in &self.tenants {
            if !seen_tenants.insert(&tenant.tenant_id) {
                return Err(GatewayError::Config(format!(
                    "duplicate tenant id: {}",
                    tenant.tenant_id
                )));
            }
            for key in &tenant.api_keys {
                if !seen_keys.insert(key) {
                    return Err(GatewayError::Config(format!(
                        "API key {} assigned to more than one tenant",
                        redact_key(key)
                    )));
                }
            }
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Render an API key as a short prefix for logs. Keys never appear in
/// full in logs or error messages.
pub fn redact_key(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{prefix}\u{2026}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_name_aliases() {
        let canonical: PolicyName = serde_json::from_str("\"performance-first\"").unwrap();
        let synonym: PolicyName = serde_json::from_str("\"performance_first\"").unwrap();
        assert_eq!(canonical, PolicyName::PerformanceFirst);
        assert_eq!(synonym, PolicyName::PerformanceFirst);
        assert_eq!(canonical.as_str(), "performance-first");
    }

    #[test]
    fn test_provider_descriptor_parses() {
        let raw = r#"{
            "type": "groq",
            "api_key_env": "GROQ_API_KEY",
            "model": "llama-3.3-70b-versatile",
            "cost_per_token": 0.0001
        }"#;
        let config: ProviderConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.kind, ProviderKind::Groq);
        assert!(config.enabled);
        assert_eq!(config.cost_per_token, Some(0.0001));
    }

    #[test]
    fn test_duplicate_api_key_is_config_error() {
        let config = GatewayConfig {
            tenants: vec![
                TenantConfig {
                    tenant_id: "a".into(),
                    api_keys: vec!["ak-shared".into()],
                    allowed_providers: vec![],
                    routing_policy: PolicyName::default(),
                    quotas: TenantQuotas::default(),
                },
                TenantConfig {
                    tenant_id: "b".into(),
                    api_keys: vec!["ak-shared".into()],
                    allowed_providers: vec![],
                    routing_policy: PolicyName::default(),
                    quotas: TenantQuotas::default(),
                },
            ],
            ..GatewayConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_redact_key_keeps_prefix_only() {
        let redacted = redact_key("ak-demo123456");
        assert!(redacted.starts_with("ak-dem"));
        assert!(!redacted.contains("123456"));
    }

    #[test]
    fn test_default_policy_is_balanced() {
        assert_eq!(PolicyName::default(), PolicyName::Balanced);
    }
}
