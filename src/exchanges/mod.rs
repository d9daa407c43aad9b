pub mod binance;

pub use binance::{BinanceFuturesClient, HttpMethod};

use crate::core::types::{OrderRequest, OrderResponse, Result};
use async_trait::async_trait;

/// 下单接口，策略通过它提交订单
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// 提交单个订单，失败以错误返回而不是panic
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderResponse>;
}
