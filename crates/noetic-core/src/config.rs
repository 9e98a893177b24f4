//! Ambient configuration
//!
//! Holds the numeric knobs scattered across §4.2–§4.9 of the specification
//! plus the environment-variable overrides from §6. JSONC file loading and
//! CLI argument parsing live in the host application, not here — this is the
//! in-process config surface the engine itself owns.

/// Token budget knobs (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBudgetConfig {
    pub max_tokens: usize,
    pub safety_buffer: f64,
    pub chars_per_token: f64,
    pub min_items: usize,
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: 25_000,
            safety_buffer: 0.8,
            chars_per_token: 3.5,
            min_items: 1,
        }
    }
}

/// Pre-flight gate knobs (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct PreflightConfig {
    pub min_content_length: usize,
    pub max_content_length: usize,
    pub max_memory_tokens: usize,
    pub token_warning_threshold: f64,
    pub duplicate_similarity_threshold: f32,
    pub anchor_strict: bool,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            min_content_length: 10,
            max_content_length: 100_000,
            max_memory_tokens: 25_000,
            token_warning_threshold: 0.8,
            duplicate_similarity_threshold: 0.95,
            anchor_strict: false,
        }
    }
}

/// Retry engine knobs (§4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 4000,
            backoff_base: 2.0,
        }
    }
}

/// Decay & tiering knobs (§4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayConfig {
    pub default_half_life_days: f32,
    pub temporary_expiry_days: i64,
    pub normal_expiry_days: i64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            default_half_life_days: 90.0,
            temporary_expiry_days: 7,
            normal_expiry_days: 90,
        }
    }
}

/// Cache knobs shared by the search cache (C6) and constitutional cache (C9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    pub search_cache_capacity: usize,
    pub search_cache_ttl_secs: u64,
    pub constitutional_cache_ttl_secs: u64,
    pub constitutional_cache_capacity_per_key: usize,
    pub constitutional_token_budget: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_cache_capacity: 500,
            search_cache_ttl_secs: 15 * 60,
            constitutional_cache_ttl_secs: 5 * 60,
            constitutional_cache_capacity_per_key: 20,
            constitutional_token_budget: 2_000,
        }
    }
}

/// Ranking knobs (§4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingConfig {
    pub similarity_weight: f32,
    pub recency_weight: f32,
    pub usage_weight: f32,
    pub mmr_lambda: f32,
    pub mmr_min_results: usize,
    pub max_triggers_per_memory: usize,
    pub max_new_triggers_per_learn: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            similarity_weight: 0.5,
            recency_weight: 0.3,
            usage_weight: 0.2,
            mmr_lambda: 0.3,
            mmr_min_results: 4,
            max_triggers_per_memory: 10,
            max_new_triggers_per_learn: 3,
        }
    }
}

/// Top-level configuration aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub token_budget: TokenBudgetConfig,
    pub preflight: PreflightConfig,
    pub retry: RetryConfig,
    pub decay: DecayConfig,
    pub cache: CacheConfig,
    pub ranking: RankingConfig,
    /// Allow-listed base directories for path resolution (§4.1).
    pub allowed_paths: Vec<std::path::PathBuf>,
    /// Base directory under which per-profile database files are created.
    pub db_dir: Option<std::path::PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_budget: TokenBudgetConfig::default(),
            preflight: PreflightConfig::default(),
            retry: RetryConfig::default(),
            decay: DecayConfig::default(),
            cache: CacheConfig::default(),
            ranking: RankingConfig::default(),
            allowed_paths: Vec::new(),
            db_dir: None,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl Config {
    /// Build a `Config` from defaults overridden by the environment
    /// variables enumerated in §6.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.token_budget.max_tokens = env_usize("MCP_MAX_TOKENS", cfg.token_budget.max_tokens);
        cfg.token_budget.safety_buffer =
            env_f64("MCP_TOKEN_SAFETY_BUFFER", cfg.token_budget.safety_buffer);
        cfg.token_budget.chars_per_token =
            env_f64("MCP_CHARS_PER_TOKEN", cfg.token_budget.chars_per_token);
        cfg.token_budget.min_items = env_usize("MCP_MIN_ITEMS", cfg.token_budget.min_items);

        cfg.preflight.max_memory_tokens =
            env_usize("MCP_MAX_MEMORY_TOKENS", cfg.preflight.max_memory_tokens);
        cfg.preflight.token_warning_threshold = env_f64(
            "MCP_TOKEN_WARNING_THRESHOLD",
            cfg.preflight.token_warning_threshold,
        );
        cfg.preflight.min_content_length =
            env_usize("MCP_MIN_CONTENT_LENGTH", cfg.preflight.min_content_length);
        cfg.preflight.max_content_length =
            env_usize("MCP_MAX_CONTENT_LENGTH", cfg.preflight.max_content_length);
        cfg.preflight.duplicate_similarity_threshold = env_f64(
            "MCP_DUPLICATE_THRESHOLD",
            cfg.preflight.duplicate_similarity_threshold as f64,
        ) as f32;
        cfg.preflight.anchor_strict = env_bool("MCP_ANCHOR_STRICT", cfg.preflight.anchor_strict);

        if let Ok(dir) = std::env::var("MEMORY_DB_DIR") {
            cfg.db_dir = Some(std::path::PathBuf::from(dir));
        }
        if let Ok(paths) = std::env::var("MEMORY_ALLOWED_PATHS") {
            cfg.allowed_paths = std::env::split_paths(&paths).collect();
        }

        cfg
    }
}
