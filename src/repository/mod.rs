// ==========================================
// 商品目录导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod audit_log_repo;
pub mod catalog_repo;
pub mod error;
pub mod import_job_repo;

// 重导出核心仓储
pub use audit_log_repo::AuditLogRepository;
pub use catalog_repo::CatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use import_job_repo::ImportJobRepository;

// ==========================================
// 时间戳列格式 (统一 "%Y-%m-%d %H:%M:%S", UTC)
// ==========================================

pub(crate) fn format_ts(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn parse_ts(raw: &str) -> RepositoryResult<chrono::DateTime<chrono::Utc>> {
    use chrono::{NaiveDateTime, TimeZone, Utc};
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| RepositoryError::ValidationError(format!("时间戳解析失败 {}: {}", raw, e)))?;
    Ok(Utc.from_utc_datetime(&naive))
}
