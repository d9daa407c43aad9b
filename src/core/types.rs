/// 下单相关的类型定义
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::ExchangeError;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// 按插入顺序保存的请求参数，签名与发送使用同一顺序
pub type Params = Vec<(String, String)>;

/// 订单方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(ExchangeError::validation(
                "side",
                format!("未知的订单方向: {}", other),
            )),
        }
    }
}

/// 订单类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 时间有效性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GTC, // Good Till Cancel
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GTC => "GTC",
        }
    }
}

/// 订单种类：限价单必须携带价格，市价单不能携带价格
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderKind {
    Market,
    Limit {
        price: f64,
        time_in_force: TimeInForce,
    },
}

/// 订单请求
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    symbol: String,
    side: OrderSide,
    quantity: f64,
    kind: OrderKind,
}

impl OrderRequest {
    pub fn market(symbol: &str, side: OrderSide, quantity: f64) -> Result<Self> {
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            side,
            quantity: positive("quantity", quantity)?,
            kind: OrderKind::Market,
        })
    }

    pub fn limit(symbol: &str, side: OrderSide, quantity: f64, price: f64) -> Result<Self> {
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            side,
            quantity: positive("quantity", quantity)?,
            kind: OrderKind::Limit {
                price: positive("price", price)?,
                time_in_force: TimeInForce::GTC,
            },
        })
    }

    /// 按订单类型构造，校验 price 与 LIMIT 必须同时出现
    pub fn new(
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<Self> {
        match (order_type, price) {
            (OrderType::Market, None) => Self::market(symbol, side, quantity),
            (OrderType::Limit, Some(price)) => Self::limit(symbol, side, quantity, price),
            (OrderType::Market, Some(_)) => Err(ExchangeError::validation(
                "price",
                "市价单不能指定价格",
            )),
            (OrderType::Limit, None) => Err(ExchangeError::validation(
                "price",
                "限价单必须指定价格",
            )),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn order_type(&self) -> OrderType {
        match self.kind {
            OrderKind::Market => OrderType::Market,
            OrderKind::Limit { .. } => OrderType::Limit,
        }
    }

    pub fn price(&self) -> Option<f64> {
        match self.kind {
            OrderKind::Market => None,
            OrderKind::Limit { price, .. } => Some(price),
        }
    }

    /// 转换为 /fapi/v1/order 的请求参数（不含 timestamp 与 signature）
    pub fn to_params(&self) -> Params {
        let mut params: Params = vec![
            ("symbol".to_string(), self.symbol.clone()),
            ("side".to_string(), self.side.as_str().to_string()),
            ("type".to_string(), self.order_type().as_str().to_string()),
            ("quantity".to_string(), format_decimal(self.quantity)),
        ];

        if let OrderKind::Limit {
            price,
            time_in_force,
        } = self.kind
        {
            params.push(("price".to_string(), format_decimal(price)));
            params.push(("timeInForce".to_string(), time_in_force.as_str().to_string()));
        }

        params
    }
}

/// 币安期货下单/查单响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: i64,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default, rename = "type")]
    pub order_type: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub avg_price: Option<String>,
    #[serde(default)]
    pub orig_qty: Option<String>,
    #[serde(default)]
    pub executed_qty: Option<String>,
    #[serde(default)]
    pub update_time: Option<i64>,
}

/// 数量/价格的最短十进制表示，例如 0.001、50000
pub fn format_decimal(value: f64) -> String {
    format!("{}", value)
}

/// 保留指定位数小数（四舍五入）
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// 交易对去空白并转大写，只允许字母数字
pub(crate) fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ExchangeError::validation("symbol", "交易对不能为空"));
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ExchangeError::validation(
            "symbol",
            format!("交易对格式错误: {}", symbol),
        ));
    }
    Ok(symbol.to_uppercase())
}

fn positive(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ExchangeError::validation(
            field,
            format!("必须为正数，实际为 {}", value),
        ))
    }
}
