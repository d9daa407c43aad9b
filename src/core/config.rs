use crate::core::error::ExchangeError;
use serde::Deserialize;
use std::fmt;
use std::fs;

/// 币安期货测试网
pub const DEFAULT_BASE_URL: &str = "https://testnet.binancefuture.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_FILE: &str = "bot.log";

/// 运行配置（不含密钥）
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub recv_window: Option<u64>,
    pub log_file: String,
    pub sync_time: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            recv_window: None,
            log_file: DEFAULT_LOG_FILE.to_string(),
            sync_time: false,
        }
    }
}

impl BotConfig {
    /// 从YAML文件加载配置，缺省字段使用默认值
    pub fn from_file(path: &str) -> Result<Self, ExchangeError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ExchangeError::ConfigError(format!("读取配置文件失败: {}", e)))?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ExchangeError> {
        let config: BotConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// 环境变量 BASE_URL 优先于配置文件
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("BASE_URL") {
            if !base_url.trim().is_empty() {
                self.base_url = base_url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ExchangeError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ExchangeError::ConfigError(format!(
                "base_url 必须以 http:// 或 https:// 开头: {}",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ExchangeError::ConfigError(
                "request_timeout_secs 必须大于0".to_string(),
            ));
        }
        Ok(())
    }
}

/// API密钥配置
#[derive(Clone)]
pub struct ApiKeys {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

impl ApiKeys {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// 从环境变量加载API密钥
    pub fn from_env() -> Result<Self, ExchangeError> {
        dotenv::dotenv().ok(); // 加载.env文件，忽略错误
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExchangeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("BINANCE_API_KEY").ok_or_else(|| {
            ExchangeError::ConfigError("未找到 BINANCE_API_KEY 环境变量".to_string())
        })?;

        // 兼容两种密钥名称
        let api_secret = non_empty("BINANCE_SECRET_KEY")
            .or_else(|| non_empty("BINANCE_API_SECRET"))
            .ok_or_else(|| {
                ExchangeError::ConfigError(
                    "未找到 BINANCE_SECRET_KEY 或 BINANCE_API_SECRET 环境变量".to_string(),
                )
            })?;

        Ok(ApiKeys {
            api_key,
            api_secret,
        })
    }
}
