// 工具模块 - 签名与日志
pub mod logger;
pub mod signature;

pub use logger::init_logger;
pub use signature::*;
