use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("参数验证错误: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("HTTP错误: 状态码 {status}, 响应: {body}")]
    HttpError {
        status: u16,
        body: String,
        /// 币安错误体中的 code 字段（如 -2019）
        code: Option<i64>,
        /// 币安错误体中的 msg 字段
        message: Option<String>,
    },

    #[error("网络请求错误: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("数据解析错误: {0}")]
    ParseError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("YAML配置错误: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl ExchangeError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        ExchangeError::ValidationError {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// 由非2xx响应构造，尽量解析币安的 {"code":..,"msg":..} 错误体
    pub fn from_http_response(status: u16, body: String) -> Self {
        #[derive(serde::Deserialize)]
        struct BinanceErrorBody {
            code: i64,
            msg: String,
        }

        let (code, message) = match serde_json::from_str::<BinanceErrorBody>(&body) {
            Ok(parsed) => (Some(parsed.code), Some(parsed.msg)),
            Err(_) => (None, None),
        };

        ExchangeError::HttpError {
            status,
            body,
            code,
            message,
        }
    }

    /// 交易所明确拒绝（4xx），区别于服务端故障
    pub fn is_exchange_rejection(&self) -> bool {
        matches!(self, ExchangeError::HttpError { status, .. } if (400..500).contains(status))
    }

    /// 获取用户友好的错误描述
    pub fn user_friendly_message(&self) -> String {
        match self {
            ExchangeError::HttpError {
                status,
                code: Some(code),
                message: Some(message),
                ..
            } => format!("交易所拒绝请求 (HTTP {}): [{}] {}", status, code, message),
            ExchangeError::HttpError { status, .. } if *status >= 500 => {
                format!("交易所服务异常 (HTTP {})，请稍后重试", status)
            }
            ExchangeError::TransportError(e) if e.is_timeout() => {
                "请求超时，请检查网络状态".to_string()
            }
            ExchangeError::TransportError(_) => "网络连接问题，请检查网络状态".to_string(),
            _ => self.to_string(),
        }
    }
}
