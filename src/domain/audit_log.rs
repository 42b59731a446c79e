// ==========================================
// 商品目录导入系统 - 审计日志领域模型
// ==========================================
// 红线: 提交器的每次实体变更必须追加一条审计记录
// 约束: 追加后不可编辑, 仅可通过按龄清理操作删除
// ==========================================

use crate::domain::types::EntityType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// AuditAction - 审计动作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Cleanup,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Cleanup => "cleanup",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "create" => Some(AuditAction::Create),
            "update" => Some(AuditAction::Update),
            "delete" => Some(AuditAction::Delete),
            "cleanup" => Some(AuditAction::Cleanup),
            _ => None,
        }
    }
}

// ==========================================
// AuditLog - 审计日志 (append-only)
// ==========================================
// 对齐: audit_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub audit_id: String,
    pub actor: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    /// 人类可读标识 (名称/型号)
    pub entity_label: Option<String>,
    pub before_json: Option<JsonValue>,
    pub after_json: Option<JsonValue>,
    /// 请求元数据 (job_id / source=bulk_import 等)
    pub metadata_json: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    /// 创建新的审计记录
    pub fn new(actor: String, action: AuditAction, entity_type: EntityType, entity_id: String) -> Self {
        Self {
            audit_id: uuid::Uuid::new_v4().to_string(),
            actor,
            action,
            entity_type: entity_type.as_str().to_string(),
            entity_id,
            entity_label: None,
            before_json: None,
            after_json: None,
            metadata_json: None,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.entity_label = Some(label.to_string());
        self
    }

    /// 设置变更前快照 (转换为JSON)
    pub fn with_before<T: Serialize>(mut self, before: &T) -> Self {
        self.before_json = serde_json::to_value(before).ok();
        self
    }

    /// 设置变更后快照 (转换为JSON)
    pub fn with_after<T: Serialize>(mut self, after: &T) -> Self {
        self.after_json = serde_json::to_value(after).ok();
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata_json = Some(metadata);
        self
    }

    pub fn with_request_info(
        mut self,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

// ==========================================
// AuditLogQuery - 审计日志查询过滤
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct AuditLogQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<AuditAction>,
    pub actor: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditLogQuery {
    pub fn new() -> Self {
        Self {
            limit: 50,
            ..Default::default()
        }
    }
}

// ==========================================
// AuditCleanupResult - 按龄清理结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditCleanupResult {
    pub deleted_count: usize,
    pub older_than_days: i64,
    pub cutoff_date: NaiveDate,
}
