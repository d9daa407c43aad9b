//! TWAP（时间加权平均价格）拆单执行
//!
//! 把总数量平均拆成若干市价分片，按固定间隔顺序下单。分片之间的等待可被
//! 停止信号打断；正在进行中的下单请求不会被打断。单个分片失败只记录，
//! 不影响后续分片。

use std::time::Duration;
use tokio::sync::watch;

use crate::core::{
    error::ExchangeError,
    types::{format_decimal, round_to, OrderRequest, OrderResponse, OrderSide, Result},
};
use crate::exchanges::OrderExecutor;

/// 分片数量保留的小数位
pub const SLICE_QUANTITY_DECIMALS: u32 = 3;

/// TWAP执行计划
#[derive(Debug, Clone, PartialEq)]
pub struct TwapPlan {
    total_quantity: f64,
    slices: u32,
    slice_delay: Duration,
    slice_order: OrderRequest,
}

impl TwapPlan {
    pub fn new(
        symbol: &str,
        side: OrderSide,
        total_quantity: f64,
        duration_minutes: f64,
        slices: u32,
    ) -> Result<Self> {
        if slices == 0 {
            return Err(ExchangeError::validation("slices", "分片数必须大于0"));
        }
        if !duration_minutes.is_finite() || duration_minutes < 0.0 {
            return Err(ExchangeError::validation(
                "duration_minutes",
                format!("持续时间必须为非负数，实际为 {}", duration_minutes),
            ));
        }
        if !total_quantity.is_finite() || total_quantity <= 0.0 {
            return Err(ExchangeError::validation(
                "quantity",
                format!("总数量必须为正数，实际为 {}", total_quantity),
            ));
        }

        // 不把舍入误差补到最后一片，分片总和允许与总数量略有偏差
        let quantity_per_slice = round_to(total_quantity / slices as f64, SLICE_QUANTITY_DECIMALS);
        if quantity_per_slice <= 0.0 {
            return Err(ExchangeError::validation(
                "quantity",
                format!(
                    "总数量 {} 拆成 {} 片后不足 {} 位小数精度",
                    total_quantity, slices, SLICE_QUANTITY_DECIMALS
                ),
            ));
        }

        let slice_delay = Duration::try_from_secs_f64(duration_minutes * 60.0 / slices as f64)
            .map_err(|_| {
                ExchangeError::validation(
                    "duration_minutes",
                    format!("持续时间超出可表示范围: {} 分钟", duration_minutes),
                )
            })?;

        let slice_order = OrderRequest::market(symbol, side, quantity_per_slice)?;

        Ok(Self {
            total_quantity,
            slices,
            slice_delay,
            slice_order,
        })
    }

    pub fn symbol(&self) -> &str {
        self.slice_order.symbol()
    }

    pub fn side(&self) -> OrderSide {
        self.slice_order.side()
    }

    pub fn total_quantity(&self) -> f64 {
        self.total_quantity
    }

    pub fn slices(&self) -> u32 {
        self.slices
    }

    pub fn quantity_per_slice(&self) -> f64 {
        self.slice_order.quantity()
    }

    /// 所有分片实际下单数量之和
    pub fn planned_total(&self) -> f64 {
        round_to(
            self.quantity_per_slice() * self.slices as f64,
            SLICE_QUANTITY_DECIMALS,
        )
    }

    /// 相邻两个分片之间的等待时间
    pub fn slice_delay(&self) -> Duration {
        self.slice_delay
    }

    pub fn slice_order(&self) -> &OrderRequest {
        &self.slice_order
    }
}

/// 单个分片的执行结果
#[derive(Debug)]
pub struct SliceOutcome {
    pub index: u32,
    pub quantity: f64,
    pub result: Result<OrderResponse>,
}

impl SliceOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// TWAP执行汇总
#[derive(Debug)]
pub struct TwapReport {
    pub planned_slices: u32,
    pub outcomes: Vec<SliceOutcome>,
    pub cancelled: bool,
}

impl TwapReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// 全部分片都已执行且成功
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.outcomes.len() == self.planned_slices as usize
            && self.failed() == 0
    }

    pub fn filled_quantity(&self) -> f64 {
        let total: f64 = self
            .outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.quantity)
            .sum();
        round_to(total, SLICE_QUANTITY_DECIMALS)
    }
}

/// TWAP执行器，严格顺序执行分片
pub struct TwapExecutor<'a, E: OrderExecutor + ?Sized> {
    executor: &'a E,
    plan: TwapPlan,
}

impl<'a, E: OrderExecutor + ?Sized> TwapExecutor<'a, E> {
    pub fn new(executor: &'a E, plan: TwapPlan) -> Self {
        Self { executor, plan }
    }

    pub fn plan(&self) -> &TwapPlan {
        &self.plan
    }

    /// 执行全部分片；stop 变为 true 时在下一个分片前停止
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> TwapReport {
        let plan = &self.plan;
        let delay = plan.slice_delay();
        let mut outcomes = Vec::with_capacity(plan.slices as usize);
        let mut cancelled = false;

        log::info!(
            "开始TWAP: {} {} {} 分 {} 片执行，每片 {}，间隔 {:.3}秒",
            plan.side(),
            format_decimal(plan.total_quantity),
            plan.symbol(),
            plan.slices,
            format_decimal(plan.quantity_per_slice()),
            delay.as_secs_f64()
        );

        for index in 0..plan.slices {
            if *stop.borrow() {
                cancelled = true;
                break;
            }

            log::info!("执行TWAP分片 {}/{}", index + 1, plan.slices);
            let result = self.executor.create_order(&plan.slice_order).await;

            match &result {
                Ok(response) => log::info!(
                    "分片 {} 成功: {} {} (订单ID {})",
                    index + 1,
                    format_decimal(plan.quantity_per_slice()),
                    plan.symbol(),
                    response.order_id
                ),
                Err(e) => log::error!("分片 {} 失败，继续执行下一分片: {}", index + 1, e),
            }

            outcomes.push(SliceOutcome {
                index,
                quantity: plan.quantity_per_slice(),
                result,
            });

            let is_last = index + 1 == plan.slices;
            if !is_last && !delay.is_zero() && wait_or_stop(delay, &mut stop).await {
                cancelled = true;
                break;
            }
        }

        let report = TwapReport {
            planned_slices: plan.slices,
            outcomes,
            cancelled,
        };

        if report.cancelled {
            log::warn!(
                "TWAP已停止: 已执行 {}/{} 片 (成功 {}, 失败 {})",
                report.outcomes.len(),
                plan.slices,
                report.succeeded(),
                report.failed()
            );
        } else {
            log::info!(
                "TWAP完成: 成功 {}, 失败 {}, 成交数量 {}",
                report.succeeded(),
                report.failed(),
                format_decimal(report.filled_quantity())
            );
        }

        report
    }
}

/// 等待 delay；期间收到停止信号返回 true
async fn wait_or_stop(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = stop_requested(stop) => true,
    }
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            // 发送端已释放，不会再有停止信号
            std::future::pending::<()>().await;
        }
    }
}
