// 核心模块 - 配置、错误与下单类型
pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::{
    OrderKind, OrderRequest, OrderResponse, OrderSide, OrderType, Params, TimeInForce,
};
