use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::core::{
    config::{ApiKeys, BotConfig},
    error::ExchangeError,
    types::{normalize_symbol, OrderRequest, OrderResponse, OrderSide, OrderType, Params, Result},
};
use crate::exchanges::OrderExecutor;
use crate::utils::SignatureHelper;

pub const ORDER_ENDPOINT: &str = "/fapi/v1/order";
pub const TIME_ENDPOINT: &str = "/fapi/v1/time";
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// 签名请求支持的HTTP方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// 币安U本位期货签名客户端
pub struct BinanceFuturesClient {
    client: reqwest::Client,
    api_keys: ApiKeys,
    base_url: String,
    recv_window: Option<u64>,
    /// 时间偏移量（毫秒），服务器时间 - 本地时间
    time_offset: AtomicI64,
}

impl BinanceFuturesClient {
    pub fn new(config: &BotConfig, api_keys: ApiKeys) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        log::info!(
            "创建 BinanceFuturesClient: {} (超时 {}秒)",
            config.base_url,
            config.request_timeout_secs
        );

        Ok(Self {
            client,
            api_keys,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            recv_window: config.recv_window,
            time_offset: AtomicI64::new(0),
        })
    }

    /// 对规范化查询串计算 HMAC-SHA256 签名
    pub fn sign(&self, params: &[(String, String)]) -> String {
        let query_string = SignatureHelper::build_query_string(params);
        SignatureHelper::binance_signature(&self.api_keys.api_secret, &query_string)
    }

    /// 追加 recvWindow、timestamp 与 signature，返回最终查询串
    pub fn build_signed_query(&self, mut params: Params, timestamp: i64) -> String {
        if let Some(recv_window) = self.recv_window {
            params.push(("recvWindow".to_string(), recv_window.to_string()));
        }
        params.push(("timestamp".to_string(), timestamp.to_string()));

        let signature = self.sign(&params);
        params.push(("signature".to_string(), signature));

        SignatureHelper::build_query_string(&params)
    }

    /// 获取校正后的时间戳（毫秒）
    pub fn current_timestamp(&self) -> i64 {
        SignatureHelper::timestamp() + self.time_offset.load(Ordering::Relaxed)
    }

    /// 发送认证请求，每次调用只进行一次网络往返
    pub async fn send_signed_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        params: Params,
    ) -> Result<serde_json::Value> {
        let timestamp = self.current_timestamp();
        log::debug!(
            "签名请求 {} {} 参数: {}",
            method,
            endpoint,
            SignatureHelper::build_query_string(&params)
        );

        let query = self.build_signed_query(params, timestamp);
        let url = format!("{}{}?{}", self.base_url, endpoint, query);

        let request = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded"),
        };

        let response = request
            .header(API_KEY_HEADER, &self.api_keys.api_key)
            .send()
            .await?;

        Self::read_json(response).await
    }

    /// 发送公共请求（无需签名）
    async fn send_public_request(&self, endpoint: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.get(&url).send().await?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::from_http_response(status.as_u16(), body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ExchangeError::ParseError(format!("响应不是有效JSON: {} ({})", e, body)))
    }

    /// 下单：构造订单请求并校验 price 与 LIMIT 的对应关系
    pub async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<OrderResponse> {
        let request = OrderRequest::new(symbol, side, order_type, quantity, price)?;
        self.create_order(&request).await
    }

    /// 查询订单状态
    pub async fn query_order(&self, symbol: &str, order_id: i64) -> Result<OrderResponse> {
        let params: Params = vec![
            ("symbol".to_string(), normalize_symbol(symbol)?),
            ("orderId".to_string(), order_id.to_string()),
        ];

        log::info!("查询订单: {} {}", symbol, order_id);
        let value = self
            .send_signed_request(HttpMethod::Get, ORDER_ENDPOINT, params)
            .await?;
        parse_order_response(value)
    }

    /// 获取服务器时间（毫秒）
    pub async fn server_time(&self) -> Result<i64> {
        #[derive(Deserialize)]
        struct ServerTime {
            #[serde(rename = "serverTime")]
            server_time: i64,
        }

        let value = self.send_public_request(TIME_ENDPOINT).await?;
        let time: ServerTime = serde_json::from_value(value)
            .map_err(|e| ExchangeError::ParseError(format!("服务器时间解析失败: {}", e)))?;
        Ok(time.server_time)
    }

    /// 同步服务器时间，计算本地时间与服务器时间的偏移
    pub async fn sync_server_time(&self) -> Result<i64> {
        let before = SignatureHelper::timestamp();
        let server_time = self.server_time().await?;
        let after = SignatureHelper::timestamp();

        // 假设网络延迟对称，取中点
        let local_time = before + (after - before) / 2;
        let offset = server_time - local_time;
        self.time_offset.store(offset, Ordering::Relaxed);

        log::info!("✅ Binance时间同步成功，时间偏移: {}ms", offset);
        if offset.abs() > 1000 {
            log::warn!("⚠️ 系统时间与服务器相差 {}ms，建议同步系统时间", offset);
        }

        Ok(offset)
    }
}

#[async_trait]
impl OrderExecutor for BinanceFuturesClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderResponse> {
        log::info!(
            "发送 {} 订单: {} {} {}",
            request.order_type(),
            request.side(),
            request.quantity(),
            request.symbol()
        );

        let result = self
            .send_signed_request(HttpMethod::Post, ORDER_ENDPOINT, request.to_params())
            .await
            .and_then(parse_order_response);

        match &result {
            Ok(response) => log::info!(
                "✅ 下单成功: ID {} ({} {})",
                response.order_id,
                request.symbol(),
                response.status.as_deref().unwrap_or("UNKNOWN")
            ),
            Err(ExchangeError::HttpError { status, body, .. }) => {
                log::error!("❌ HTTP错误 {}: {}", status, body)
            }
            Err(e) => log::error!("❌ 请求失败: {}", e),
        }

        result
    }
}

fn parse_order_response(value: serde_json::Value) -> Result<OrderResponse> {
    serde_json::from_value(value)
        .map_err(|e| ExchangeError::ParseError(format!("订单响应解析失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(base_url: &str, recv_window: Option<u64>) -> BinanceFuturesClient {
        let config = BotConfig {
            base_url: base_url.to_string(),
            recv_window,
            ..BotConfig::default()
        };
        BinanceFuturesClient::new(&config, ApiKeys::new("test-key", "test-secret")).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sign_is_deterministic() {
        let client = client_for("http://localhost", None);
        let base = params(&[("symbol", "BTCUSDT"), ("side", "BUY"), ("quantity", "0.001")]);

        assert_eq!(client.sign(&base), client.sign(&base));
        assert_eq!(client.sign(&base).len(), 64);

        let changed = params(&[("symbol", "BTCUSDT"), ("side", "SELL"), ("quantity", "0.001")]);
        assert_ne!(client.sign(&base), client.sign(&changed));

        let other_secret = BinanceFuturesClient::new(
            &BotConfig::default(),
            ApiKeys::new("test-key", "other-secret"),
        )
        .unwrap();
        assert_ne!(client.sign(&base), other_secret.sign(&base));
    }

    #[test]
    fn test_signed_query_covers_timestamp() {
        let client = client_for("http://localhost", None);
        let query = client.build_signed_query(params(&[("symbol", "BTCUSDT")]), 1_700_000_000_000);

        let (unsigned, signature) = query.rsplit_once("&signature=").unwrap();
        assert_eq!(unsigned, "symbol=BTCUSDT&timestamp=1700000000000");
        assert_eq!(
            signature,
            SignatureHelper::binance_signature("test-secret", unsigned)
        );

        let later = client.build_signed_query(params(&[("symbol", "BTCUSDT")]), 1_700_000_000_001);
        assert_ne!(query, later);
    }

    #[test]
    fn test_recv_window_precedes_timestamp() {
        let client = client_for("http://localhost", Some(5000));
        let query = client.build_signed_query(params(&[("symbol", "BTCUSDT")]), 1);
        assert!(query.starts_with("symbol=BTCUSDT&recvWindow=5000&timestamp=1&signature="));
    }

    #[tokio::test]
    async fn test_market_order_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(ORDER_ENDPOINT)
                    .header("x-mbx-apikey", "test-key")
                    .query_param("symbol", "BTCUSDT")
                    .query_param("side", "BUY")
                    .query_param("type", "MARKET")
                    .query_param("quantity", "0.001")
                    .query_param_exists("timestamp")
                    .query_param_exists("signature");
                then.status(200)
                    .json_body(json!({"orderId": 101, "symbol": "BTCUSDT", "status": "NEW"}));
            })
            .await;

        let client = client_for(&server.base_url(), None);
        let response = client
            .place_order("btcusdt", OrderSide::Buy, OrderType::Market, 0.001, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.order_id, 101);
        assert_eq!(response.status.as_deref(), Some("NEW"));
    }

    #[tokio::test]
    async fn test_limit_order_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(ORDER_ENDPOINT)
                    .query_param("side", "SELL")
                    .query_param("type", "LIMIT")
                    .query_param("quantity", "0.002")
                    .query_param("price", "50000")
                    .query_param("timeInForce", "GTC");
                then.status(200).json_body(json!({"orderId": 202}));
            })
            .await;

        let client = client_for(&server.base_url(), None);
        let response = client
            .place_order("BTCUSDT", OrderSide::Sell, OrderType::Limit, 0.002, Some(50000.0))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.order_id, 202);
    }

    #[tokio::test]
    async fn test_http_error_is_returned_not_raised() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ORDER_ENDPOINT);
                then.status(400)
                    .body(r#"{"code":-1111,"msg":"Precision is over the maximum defined for this asset."}"#);
            })
            .await;

        let client = client_for(&server.base_url(), None);
        let err = client
            .place_order("BTCUSDT", OrderSide::Buy, OrderType::Market, 0.0001, None)
            .await
            .unwrap_err();

        match err {
            ExchangeError::HttpError {
                status, code, body, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(-1111));
                assert!(body.contains("Precision"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ORDER_ENDPOINT);
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let client = client_for(&server.base_url(), None);
        let err = client
            .place_order("BTCUSDT", OrderSide::Buy, OrderType::Market, 0.001, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_missing_order_id_is_parse_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ORDER_ENDPOINT);
                then.status(200).json_body(json!({"status": "NEW"}));
            })
            .await;

        let client = client_for(&server.base_url(), None);
        let err = client
            .place_order("BTCUSDT", OrderSide::Buy, OrderType::Market, 0.001, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = client_for("http://127.0.0.1:1", None);
        let err = client
            .place_order("BTCUSDT", OrderSide::Buy, OrderType::Market, 0.001, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::TransportError(_)));
    }

    #[tokio::test]
    async fn test_validation_happens_before_network() {
        let client = client_for("http://127.0.0.1:1", None);
        let err = client
            .place_order("BTCUSDT", OrderSide::Buy, OrderType::Limit, 0.001, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_query_order_rejects_bad_symbol_before_network() {
        let client = client_for("http://127.0.0.1:1", None);
        for symbol in ["", "   ", "BTC/USDT"] {
            let err = client.query_order(symbol, 1).await.unwrap_err();
            assert!(
                matches!(err, ExchangeError::ValidationError { ref field, .. } if field == "symbol"),
                "{:?}: {:?}",
                symbol,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_query_order_uses_get() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(ORDER_ENDPOINT)
                    .header("x-mbx-apikey", "test-key")
                    .query_param("symbol", "ETHUSDT")
                    .query_param("orderId", "303")
                    .query_param_exists("signature");
                then.status(200)
                    .json_body(json!({"orderId": 303, "status": "FILLED", "executedQty": "0.001"}));
            })
            .await;

        let client = client_for(&server.base_url(), None);
        let response = client.query_order("ethusdt", 303).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status.as_deref(), Some("FILLED"));
        assert_eq!(response.executed_qty.as_deref(), Some("0.001"));
    }

    #[tokio::test]
    async fn test_sync_server_time_sets_offset() {
        let server = MockServer::start_async().await;
        let server_time = SignatureHelper::timestamp() + 60_000;
        server
            .mock_async(|when, then| {
                when.method(GET).path(TIME_ENDPOINT);
                then.status(200).json_body(json!({"serverTime": server_time}));
            })
            .await;

        let client = client_for(&server.base_url(), None);
        let offset = client.sync_server_time().await.unwrap();

        // 本地请求耗时远小于 5 秒
        assert!((offset - 60_000).abs() < 5_000);
        assert!(client.current_timestamp() > SignatureHelper::timestamp() + 50_000);
    }
}
