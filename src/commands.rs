//! 命令行子命令的执行逻辑：调用核心组件，并把结果写入日志与控制台

use tokio::sync::watch;

use crate::core::error::ExchangeError;
use crate::core::types::{format_decimal, OrderResponse, OrderSide, OrderType, Result};
use crate::exchanges::{BinanceFuturesClient, OrderExecutor};
use crate::strategies::{TwapExecutor, TwapPlan, TwapReport};

/// 失败描述：交易所拒绝（4xx）与网络、服务端等其他故障分开措辞
fn failure_summary(action: &str, e: &ExchangeError) -> String {
    if e.is_exchange_rejection() {
        format!("{} Rejected by exchange: {}", action, e.user_friendly_message())
    } else {
        format!("{} Failed: {}", action, e.user_friendly_message())
    }
}

/// 市价单
pub async fn execute_market_order(
    client: &BinanceFuturesClient,
    symbol: &str,
    side: OrderSide,
    quantity: f64,
) -> Result<OrderResponse> {
    let result = client
        .place_order(symbol, side, OrderType::Market, quantity, None)
        .await;

    match &result {
        Ok(response) => {
            log::info!("Market Order Success: ID {}", response.order_id);
            println!("Order Placed! ID: {}", response.order_id);
        }
        Err(e) => {
            let summary = failure_summary("Market Order", e);
            log::error!("{}", summary);
            println!("{}", summary);
        }
    }

    result
}

/// 限价单（GTC）
pub async fn execute_limit_order(
    client: &BinanceFuturesClient,
    symbol: &str,
    side: OrderSide,
    quantity: f64,
    price: f64,
) -> Result<OrderResponse> {
    let result = client
        .place_order(symbol, side, OrderType::Limit, quantity, Some(price))
        .await;

    match &result {
        Ok(response) => {
            log::info!(
                "Limit Order Success: ID {} at {}",
                response.order_id,
                format_decimal(price)
            );
            println!("Limit Order Placed! ID: {}", response.order_id);
        }
        Err(e) => {
            let summary = failure_summary("Limit Order", e);
            log::error!("{}", summary);
            println!("{}", summary);
        }
    }

    result
}

/// TWAP拆单，返回逐片结果汇总
pub async fn execute_twap_order<E: OrderExecutor + ?Sized>(
    executor: &E,
    plan: TwapPlan,
    stop: watch::Receiver<bool>,
) -> TwapReport {
    println!(
        "TWAP Strategy: {} {} {} every {:.3} seconds ({} slices)",
        plan.side(),
        format_decimal(plan.quantity_per_slice()),
        plan.symbol(),
        plan.slice_delay().as_secs_f64(),
        plan.slices()
    );

    let twap = TwapExecutor::new(executor, plan);
    let report = twap.run(stop).await;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(response) => println!(
                "Slice {} Executed: {} {} (ID {})",
                outcome.index + 1,
                format_decimal(outcome.quantity),
                twap.plan().symbol(),
                response.order_id
            ),
            Err(e) => println!(
                "{}",
                failure_summary(&format!("Slice {}", outcome.index + 1), e)
            ),
        }
    }

    println!(
        "TWAP {}: {}/{} slices succeeded, filled {} of {} {}",
        if report.cancelled { "Stopped" } else { "Completed" },
        report.succeeded(),
        report.planned_slices,
        format_decimal(report.filled_quantity()),
        format_decimal(twap.plan().total_quantity()),
        twap.plan().symbol()
    );

    report
}

/// 查询订单状态
pub async fn execute_order_status(
    client: &BinanceFuturesClient,
    symbol: &str,
    order_id: i64,
) -> Result<OrderResponse> {
    let result = client.query_order(symbol, order_id).await;

    match &result {
        Ok(response) => {
            log::info!(
                "Order {} status: {}",
                response.order_id,
                response.status.as_deref().unwrap_or("UNKNOWN")
            );
            println!(
                "Order {}: status={} executedQty={} avgPrice={}",
                response.order_id,
                response.status.as_deref().unwrap_or("UNKNOWN"),
                response.executed_qty.as_deref().unwrap_or("-"),
                response.avg_price.as_deref().unwrap_or("-")
            );
        }
        Err(e) => {
            let summary = failure_summary("Order Query", e);
            log::error!("{}", summary);
            println!("{}", summary);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ApiKeys, BotConfig};
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(base_url: &str) -> BinanceFuturesClient {
        let config = BotConfig {
            base_url: base_url.to_string(),
            ..BotConfig::default()
        };
        BinanceFuturesClient::new(&config, ApiKeys::new("key", "secret")).unwrap()
    }

    #[tokio::test]
    async fn test_market_command_reports_order_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/fapi/v1/order")
                    .query_param("type", "MARKET");
                then.status(200).json_body(json!({"orderId": 42}));
            })
            .await;

        let client = client_for(&server.base_url());
        let response = execute_market_order(&client, "BTCUSDT", OrderSide::Buy, 0.001)
            .await
            .unwrap();
        assert_eq!(response.order_id, 42);
    }

    #[tokio::test]
    async fn test_limit_command_surfaces_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/fapi/v1/order")
                    .query_param("type", "LIMIT");
                then.status(400)
                    .body(r#"{"code":-4003,"msg":"Quantity less than or equal to zero."}"#);
            })
            .await;

        let client = client_for(&server.base_url());
        let err = execute_limit_order(&client, "BTCUSDT", OrderSide::Sell, 0.002, 50000.0)
            .await
            .unwrap_err();
        assert!(err.is_exchange_rejection());
    }

    #[tokio::test]
    async fn test_twap_command_against_exchange() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/fapi/v1/order")
                    .query_param("symbol", "ETHUSDT")
                    .query_param("type", "MARKET")
                    .query_param("quantity", "0.001");
                then.status(200).json_body(json!({"orderId": 7, "status": "FILLED"}));
            })
            .await;

        let client = client_for(&server.base_url());
        let plan = TwapPlan::new("ETHUSDT", OrderSide::Buy, 0.003, 0.0, 3).unwrap();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let report = execute_twap_order(&client, plan, stop_rx).await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.is_complete());
    }

    #[test]
    fn test_failure_summary_separates_rejections() {
        let rejected = ExchangeError::from_http_response(
            400,
            r#"{"code":-2019,"msg":"Margin is insufficient."}"#.to_string(),
        );
        let summary = failure_summary("Market Order", &rejected);
        assert!(summary.starts_with("Market Order Rejected by exchange:"));
        assert!(summary.contains("-2019"));

        let server_fault = ExchangeError::from_http_response(503, "unavailable".to_string());
        let summary = failure_summary("Market Order", &server_fault);
        assert!(summary.starts_with("Market Order Failed:"));
        assert!(summary.contains("503"));

        let invalid = ExchangeError::validation("quantity", "必须大于0");
        assert!(failure_summary("Slice 2", &invalid).starts_with("Slice 2 Failed:"));
    }

    #[tokio::test]
    async fn test_status_command_transport_failure() {
        let client = client_for("http://127.0.0.1:1");
        let err = execute_order_status(&client, "BTCUSDT", 1).await.unwrap_err();
        assert!(matches!(err, ExchangeError::TransportError(_)));
    }
}
