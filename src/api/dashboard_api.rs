// ==========================================
// 农场区块生命周期 - 驾驶舱 API
// ==========================================
// 职责: 农场汇总 + 定时轮询订阅
// 口径: 每次轮询反映当时已提交的最新状态, 不保证与并发写入的先后
// ==========================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::error::ApiResult;
use crate::api::now_ts;
use crate::domain::block::Block;
use crate::engine::{DashboardAggregator, DashboardSummary, FarmingYear};
use crate::repository::{retry_once, AlertRepository, BlockRepository};

// ==========================================
// DashboardApi
// ==========================================
pub struct DashboardApi {
    block_repo: Arc<BlockRepository>,
    alert_repo: Arc<AlertRepository>,
    farming_year_start_month: u32,
}

impl DashboardApi {
    /// # 参数
    /// - `farming_year_start_month`: 农业年度起始月 (config: dashboard.farming_year_start_month)
    pub fn new(
        block_repo: Arc<BlockRepository>,
        alert_repo: Arc<AlertRepository>,
        farming_year_start_month: u32,
    ) -> Self {
        Self {
            block_repo,
            alert_repo,
            farming_year_start_month,
        }
    }

    /// 农场驾驶舱汇总
    ///
    /// # 参数
    /// - `farming_year`: 指定时只统计种植日期落在该农业年度内的区块
    pub fn summarize(&self, farm_id: &str, farming_year: Option<i32>) -> ApiResult<DashboardSummary> {
        let mut blocks: Vec<Block> =
            retry_once("block.find_by_farm", || self.block_repo.find_by_farm(farm_id))?;
        let active = retry_once("alert.find_active_by_farm", || {
            self.alert_repo.find_active_by_farm(farm_id)
        })?;

        for alert in active {
            if let Some(block) = blocks.iter_mut().find(|b| b.block_id == alert.block_id) {
                block.active_alerts.push(alert);
            }
        }

        let fy = farming_year.map(|y| FarmingYear::new(y, self.farming_year_start_month));
        let summary = DashboardAggregator::summarize(farm_id, &blocks, fy, now_ts());

        debug!(
            farm_id,
            total_blocks = summary.total_blocks,
            active_alerts = summary.active_alerts.total,
            "驾驶舱汇总完成"
        );
        Ok(summary)
    }

    /// 订阅驾驶舱定时刷新
    ///
    /// 立即计算一次，之后每个 `interval` 重新计算并发布到 watch 通道。
    /// 调用 `cancel()`、丢弃订阅或所有接收端被丢弃时停止。
    pub fn subscribe(
        self: &Arc<Self>,
        farm_id: &str,
        farming_year: Option<i32>,
        interval: Duration,
    ) -> DashboardSubscription {
        let (tx, rx) = watch::channel::<Option<DashboardSummary>>(None);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let api = Arc::clone(self);
        let farm_id = farm_id.to_string();
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            info!(farm_id = %farm_id, interval_ms = period.as_millis() as u64, "驾驶舱轮询已启动");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!(farm_id = %farm_id, "收到取消信号");
                        break;
                    }
                    _ = tx.closed() => {
                        debug!(farm_id = %farm_id, "所有订阅者已离开");
                        break;
                    }
                    _ = ticker.tick() => {
                        let api = Arc::clone(&api);
                        let fid = farm_id.clone();
                        let result =
                            tokio::task::spawn_blocking(move || api.summarize(&fid, farming_year)).await;

                        match result {
                            Ok(Ok(summary)) => {
                                if tx.send(Some(summary)).is_err() {
                                    break;
                                }
                            }
                            Ok(Err(e)) => {
                                warn!(farm_id = %farm_id, error = %e, code = e.code(), "驾驶舱刷新失败，保留上次结果");
                            }
                            Err(e) => {
                                warn!(farm_id = %farm_id, error = %e, "驾驶舱刷新任务异常");
                            }
                        }
                    }
                }
            }

            info!(farm_id = %farm_id, "驾驶舱轮询已停止");
        });

        DashboardSubscription {
            receiver: rx,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

// ==========================================
// DashboardSubscription - 轮询订阅句柄
// ==========================================
pub struct DashboardSubscription {
    receiver: watch::Receiver<Option<DashboardSummary>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DashboardSubscription {
    /// 最近一次发布的汇总（首次计算前为 None）
    pub fn latest(&self) -> Option<DashboardSummary> {
        self.receiver.borrow().clone()
    }

    /// 克隆接收端，可独立 `changed().await`
    pub fn receiver(&self) -> watch::Receiver<Option<DashboardSummary>> {
        self.receiver.clone()
    }

    /// 等待下一次发布
    ///
    /// # 返回
    /// - None: 轮询已停止
    pub async fn next(&mut self) -> Option<DashboardSummary> {
        match self.receiver.changed().await {
            Ok(()) => self.receiver.borrow_and_update().clone(),
            Err(_) => None,
        }
    }

    /// 停止轮询（幂等）
    pub fn cancel(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// 停止并等待后台任务退出
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "驾驶舱轮询任务退出异常");
            }
        }
    }
}

impl Drop for DashboardSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
