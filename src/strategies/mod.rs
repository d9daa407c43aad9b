// 执行策略模块
pub mod twap;

pub use twap::{SliceOutcome, TwapExecutor, TwapPlan, TwapReport};
