// ==========================================
// 商品目录导入系统 - API层
// ==========================================
// 职责: 面向调用方的稳定入口 (校验/提交/查询/审计)
// 约束: 每次调用按 db_path 独立建连, 不跨调用持有连接
// ==========================================

pub mod audit_api;
pub mod error;
pub mod import_api;

// 重导出API入口与错误类型
pub use audit_api::AuditApi;
pub use error::{ApiError, ApiResult};
pub use import_api::{CommitRequest, CommitResponse, ImportApi, ValidateOutcome, ValidateRequest};
