// ==========================================
// 农场区块生命周期 - 命令行入口
// ==========================================
// 用法: farm-block-lifecycle <farm_id> [farming_year] [--watch]
// - 打印农场驾驶舱汇总 (JSON)
// - --watch: 按 dashboard.poll_interval_secs 持续刷新, Ctrl-C 退出
// ==========================================

use std::time::Duration;

use anyhow::{anyhow, Context};
use farm_block_lifecycle::app::{get_default_db_path, AppState};
use farm_block_lifecycle::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", farm_block_lifecycle::APP_NAME, farm_block_lifecycle::VERSION);
    tracing::info!("==================================================");

    let mut watch = false;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--watch" {
            watch = true;
        } else {
            positional.push(arg);
        }
    }

    let farm_id = positional
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("用法: farm-block-lifecycle <farm_id> [farming_year] [--watch]"))?;
    let farming_year = match positional.get(1) {
        Some(raw) => Some(
            raw.parse::<i32>()
                .with_context(|| format!("farming_year 不是有效年份: {}", raw))?,
        ),
        None => None,
    };

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, "使用数据库");
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    let summary = state.dashboard_api.summarize(&farm_id, farming_year)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !watch {
        return Ok(());
    }

    let interval = Duration::from_secs(state.config.dashboard_poll_interval_secs);
    let mut subscription = state
        .dashboard_api
        .subscribe(&farm_id, farming_year, interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("收到 Ctrl-C，停止轮询");
                break;
            }
            next = subscription.next() => match next {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => break,
            }
        }
    }

    subscription.shutdown().await;
    Ok(())
}
