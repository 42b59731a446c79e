// ==========================================
// 商品目录导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 (致命: 任务直接 failed, 无行级报告) =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("表头与 {kind} 模板不符, 缺少必需列: {missing:?}")]
    ColumnSchemaError { kind: String, missing: Vec<String> },

    #[error("文件无数据行")]
    EmptyFile,

    // ===== 任务状态错误 =====
    #[error("导入任务不存在: {0}")]
    JobNotFound(String),

    #[error("提交冲突: 任务 {job_id} 当前状态为 {status}, 不可重复提交")]
    CommitConflict { job_id: String, status: String },

    #[error("提交被拒绝: {0}")]
    CommitBlocked(String),

    // ===== 数据库错误 =====
    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

// 实现 From<RepositoryError>（提交/校验期的仓储错误统一上抛）
impl From<crate::repository::RepositoryError> for ImportError {
    fn from(err: crate::repository::RepositoryError) -> Self {
        match err {
            crate::repository::RepositoryError::NotFound { entity, id } => {
                ImportError::DatabaseQueryError(format!("记录未找到: {} with id={}", entity, id))
            }
            crate::repository::RepositoryError::DatabaseTransactionError(msg) => {
                ImportError::DatabaseTransactionError(msg)
            }
            other => ImportError::DatabaseQueryError(other.to_string()),
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::InternalError(format!("JSON 序列化失败: {}", err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
