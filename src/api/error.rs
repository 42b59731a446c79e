// ==========================================
// 商品目录导入系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为用户友好的错误消息
// 约束: 所有错误信息必须包含显式原因
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 提交互斥: 任务已被他方提交或处于终态
    #[error("提交冲突: 任务 {job_id} 当前状态为 {status}")]
    CommitConflict { job_id: String, status: String },

    /// strict 阻断 / 无报告 / 预览任务
    #[error("提交被拒绝: {0}")]
    CommitBlocked(String),

    #[error("导入失败: {0}")]
    ImportFailed(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::JobStateConflict {
                job_id,
                actual,
                ..
            } => ApiError::CommitConflict {
                job_id,
                status: actual,
            },
            RepositoryError::DatabaseConnectionError(msg) => {
                ApiError::DatabaseConnectionError(msg)
            }
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

// 实现 From<ImportError>
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::JobNotFound(id) => ApiError::NotFound(format!("导入任务 {}", id)),
            ImportError::CommitConflict { job_id, status } => {
                ApiError::CommitConflict { job_id, status }
            }
            ImportError::CommitBlocked(msg) => ApiError::CommitBlocked(msg),
            ImportError::FileNotFound(path) => {
                ApiError::InvalidInput(format!("文件不存在: {}", path))
            }
            ImportError::UnsupportedFormat(ext) => {
                ApiError::InvalidInput(format!("文件格式不支持: {}", ext))
            }
            other => ApiError::ImportFailed(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
