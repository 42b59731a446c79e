// ==========================================
// 审计日志API
// ==========================================
// 职责: 审计日志查询与按龄清理入口
// 约束: 清理动作本身也要留审计记录
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::audit_log::{AuditAction, AuditCleanupResult, AuditLog, AuditLogQuery};
use crate::repository::AuditLogRepository;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 审计API
pub struct AuditApi {
    db_path: String,
}

impl AuditApi {
    /// 创建新的AuditApi实例
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    fn connect(&self) -> ApiResult<Arc<Mutex<Connection>>> {
        let conn = open_sqlite_connection(&self.db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Ok(Arc::new(Mutex::new(conn)))
    }

    /// 审计日志列表 (按时间倒序)
    pub async fn list(&self, query: &AuditLogQuery) -> ApiResult<Vec<AuditLog>> {
        let conn = self.connect()?;
        let repo = AuditLogRepository::new(conn);
        Ok(repo.list(query)?)
    }

    /// 查询单条审计记录
    pub async fn get(&self, audit_id: &str) -> ApiResult<AuditLog> {
        let conn = self.connect()?;
        let repo = AuditLogRepository::new(conn);
        Ok(repo.get(audit_id)?)
    }

    /// 按龄清理审计日志
    ///
    /// # 参数
    /// - older_than_days: 清理阈值 (天); None 时取配置 audit/retention_days
    ///
    /// # 返回
    /// - 删除条数与截止日期
    pub async fn cleanup(
        &self,
        older_than_days: Option<i64>,
        actor: &str,
    ) -> ApiResult<AuditCleanupResult> {
        let conn = self.connect()?;
        let days = match older_than_days {
            Some(d) if d > 0 => d,
            Some(d) => {
                return Err(ApiError::InvalidInput(format!(
                    "清理阈值必须为正数天数, 收到: {}",
                    d
                )))
            }
            None => {
                let config = ConfigManager::from_connection(conn.clone())
                    .map_err(|e| ApiError::InternalError(e.to_string()))?;
                config
                    .get_audit_retention_days()
                    .await
                    .map_err(|e| ApiError::InternalError(e.to_string()))?
            }
        };

        let repo = AuditLogRepository::new(conn);
        let deleted_count = repo.cleanup_older_than(days)?;
        info!(days, deleted_count, "审计日志按龄清理完成");

        // 清理动作本身追加审计记录 (entity_type 无对应目录实体, 直接落字符串)
        let cleanup_log = AuditLog {
            audit_id: uuid::Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            action: AuditAction::Cleanup,
            entity_type: "audit_log".to_string(),
            entity_id: "retention".to_string(),
            entity_label: None,
            before_json: None,
            after_json: Some(json!({
                "deleted_count": deleted_count,
                "older_than_days": days,
            })),
            metadata_json: Some(json!({"source": "audit_cleanup"})),
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        };
        repo.insert(&cleanup_log)?;

        Ok(AuditCleanupResult {
            deleted_count,
            older_than_days: days,
            cutoff_date: (Utc::now() - Duration::days(days)).date_naive(),
        })
    }
}
