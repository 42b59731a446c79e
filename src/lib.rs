// ==========================================
// 商品目录导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 批量目录数据导入 (先校验出报告, 确认后提交)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 提交状态机
pub mod engine;

// 导入层 - 文件解析与校验流水线
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 文件指纹
pub mod hashing;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    EntityType, FieldType, ImportKind, ImportMode, IssueSeverity, JobStatus, RowType,
};

// 领域实体
pub use domain::{
    AuditAction, AuditCleanupResult, AuditLog, AuditLogQuery, Brand, Category, CommitResult,
    ImportJob, ImportReport, Product, Series, Variant,
};

// 引擎
pub use engine::{CommitEngine, CommitOptions, DbVerifier};

// 导入流水线
pub use importer::{CatalogValidator, CatalogValidatorImpl, ValidateOptions};

// API
pub use api::{AuditApi, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "商品目录导入系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "商品目录导入系统");
    }
}
