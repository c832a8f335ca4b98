use std::time::Duration;

use crate::non_empty_env;
use crate::poll::PollPolicy;
use crate::request::DimensionLimits;
use crate::retry::RetryPolicy;

pub const DEFAULT_VISION_API_BASE: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DEFAULT_VISION_MODEL: &str = "glm-4v-flash";
pub const DEFAULT_VISION_MAX_TOKENS: u32 = 512;

pub const DEFAULT_GENERATION_API_BASE: &str = "https://cloud.leonardo.ai/api/rest/v1";
/// Quality pipeline model (Leonardo Diffusion XL tier).
pub const DEFAULT_MODEL_ID: &str = "b24e16ff-06e3-43eb-8d33-4416c2d75876";
/// Fast pipeline model (Lightning XL tier).
pub const DEFAULT_FAST_MODEL_ID: &str = "1e60896f-3c26-4296-8ecc-53e2afecc132";
pub const DEFAULT_INIT_STRENGTH: f64 = 0.55;

/// Vision-service settings, resolved once and passed into the client.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_VISION_API_BASE.to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            max_tokens: DEFAULT_VISION_MAX_TOKENS,
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl VisionConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_env("VISION_API_KEY").or_else(|| non_empty_env("GLM_API_KEY")),
            api_base: env_api_base("VISION_API_BASE", DEFAULT_VISION_API_BASE),
            model: non_empty_env("VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            ..Self::default()
        }
    }
}

/// Generation-provider settings plus the numeric policies the pipeline
/// derives from them.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model_id: String,
    pub fast_model_id: String,
    pub default_init_strength: f64,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub retry: RetryPolicy,
    pub poll: PollPolicy,
    pub limits: DimensionLimits,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_GENERATION_API_BASE.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            fast_model_id: DEFAULT_FAST_MODEL_ID.to_string(),
            default_init_strength: DEFAULT_INIT_STRENGTH,
            request_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
            limits: DimensionLimits::default(),
        }
    }
}

impl GenerationConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_env("LEONARDO_API_KEY"),
            api_base: env_api_base("LEONARDO_API_BASE", DEFAULT_GENERATION_API_BASE),
            model_id: non_empty_env("LEONARDO_MODEL_ID")
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            fast_model_id: non_empty_env("LEONARDO_FAST_MODEL_ID")
                .unwrap_or_else(|| DEFAULT_FAST_MODEL_ID.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub vision: VisionConfig,
    pub generation: GenerationConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            vision: VisionConfig::from_env(),
            generation: GenerationConfig::from_env(),
        }
    }
}

fn env_api_base(key: &str, fallback: &str) -> String {
    non_empty_env(key)
        .map(|value| normalize_api_base(&value))
        .unwrap_or_else(|| fallback.to_string())
}

pub(crate) fn normalize_api_base(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}
