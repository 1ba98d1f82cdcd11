// ==========================================
// 农场区块生命周期 - 归档 API
// ==========================================
// 职责: 归档分页查询、详情、管理员删除
// 红线: 删除仅限管理员, 非管理员请求不得改动任何记录
// ==========================================

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::now_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::archive::{ArchivePage, BlockArchive};
use crate::domain::types::UserRole;
use crate::repository::{retry_once, ActionLogRepository, ArchiveRepository};

pub struct ArchiveApi {
    archive_repo: Arc<ArchiveRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    default_page_size: u32,
    max_page_size: u32,
}

impl ArchiveApi {
    pub fn new(
        archive_repo: Arc<ArchiveRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            archive_repo,
            action_log_repo,
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }

    /// 分页查询归档（archived_at 倒序）
    ///
    /// # 参数
    /// - `page`: 从 1 开始，None 或 0 视为第 1 页
    /// - `page_size`: None 使用默认页大小，超过上限时截断
    pub fn list_archives(
        &self,
        farm_id: &str,
        block_id: Option<&str>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ApiResult<ArchivePage> {
        if farm_id.trim().is_empty() {
            return Err(ApiError::ValidationError("farm_id 不能为空".to_string()));
        }

        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let (items, total) = retry_once("archive.list_by_farm", || {
            self.archive_repo
                .list_by_farm(farm_id, block_id, offset, i64::from(page_size))
        })?;

        Ok(ArchivePage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub fn get_archive(&self, archive_id: &str) -> ApiResult<BlockArchive> {
        retry_once("archive.find_by_id", || self.archive_repo.find_by_id(archive_id))?
            .ok_or_else(|| ApiError::NotFound(format!("BlockArchive(id={})不存在", archive_id)))
    }

    /// 永久删除归档
    ///
    /// # 错误
    /// - `Forbidden`: 非管理员
    /// - `NotFound`: 归档不存在
    pub fn delete_archive(&self, archive_id: &str, role: UserRole, actor: &str) -> ApiResult<()> {
        if !role.is_admin() {
            warn!(archive_id, %role, actor, "非管理员尝试删除归档");
            return Err(ApiError::Forbidden(format!(
                "删除归档需要管理员权限: role={}",
                role
            )));
        }

        let archive = self.get_archive(archive_id)?;
        let deleted = retry_once("archive.delete", || self.archive_repo.delete(archive_id))?;
        if !deleted {
            return Err(ApiError::NotFound(format!(
                "BlockArchive(id={})不存在",
                archive_id
            )));
        }

        info!(archive_id, block_id = %archive.block_id, cycle_no = archive.cycle_no, "归档已删除");
        let log = ActionLog::new(ActionType::DeleteArchive, actor, now_ts())
            .for_block(&archive.farm_id, &archive.block_id)
            .with_payload(json!({
                "archiveId": archive.archive_id,
                "cycleNo": archive.cycle_no,
                "blockCode": archive.block_code,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "记录操作日志失败");
        }

        Ok(())
    }
}
