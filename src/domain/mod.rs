// ==========================================
// 商品目录导入系统 - 领域层
// ==========================================
// 职责: 实体与类型定义, 不含 I/O
// ==========================================

pub mod audit_log;
pub mod catalog;
pub mod import_job;
pub mod types;

// 重导出核心类型
pub use audit_log::{AuditAction, AuditCleanupResult, AuditLog, AuditLogQuery};
pub use catalog::{
    Brand, Category, Product, Series, StagedCategory, StagedProduct, StagedVariant, Variant,
};
pub use import_job::{
    Candidate, CandidateSet, CommitResult, CommitSkip, DbVerifyResult, DisambiguatedCode,
    ImportIssue, ImportJob, ImportReport, MergedRowPair, NormalizationLog, ReportCounts,
    ReportStatus, ValidRow,
};
pub use types::{
    EntityType, FieldType, ImportKind, ImportMode, IssueSeverity, JobStatus, RowType,
};
