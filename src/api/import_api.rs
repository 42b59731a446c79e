// ==========================================
// 目录导入API
// ==========================================
// 职责: 封装校验/提交/查询/模板下载入口
// 约束: 每次调用独立建连; 后台校验任务自行开连接
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::import_job::{CommitResult, ImportJob};
use crate::domain::types::{ImportKind, ImportMode, JobStatus};
use crate::engine::{CommitEngine, CommitOptions};
use crate::hashing;
use crate::importer::{
    CatalogValidator, CatalogValidatorImpl, TemplateFormat, ValidateOptions,
};
use crate::repository::{CatalogRepository, ImportJobRepository};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// 校验请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub file_path: String,
    pub kind: ImportKind,
    pub mode: ImportMode,
    pub created_by: String,
    /// 仅出报告, 任务不可提交
    #[serde(default)]
    pub is_preview: bool,
    /// 提交期容忍行级失败
    #[serde(default)]
    pub allow_partial: bool,
    #[serde(default = "default_true")]
    pub treat_slash_as_hierarchy: bool,
    #[serde(default = "default_true")]
    pub allow_create_missing_categories: bool,
}

fn default_true() -> bool {
    true
}

/// 校验入口响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidateOutcome {
    /// 新任务已创建
    Created { job: ImportJob },
    /// 时间窗内命中同 (file_hash, kind, mode) 的既有任务
    Duplicate {
        message: String,
        existing_job_id: String,
        job: ImportJob,
    },
}

/// 提交请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub actor: String,
    /// None 沿用校验期登记值; 存在校验失败行时须为 true
    #[serde(default)]
    pub allow_partial: Option<bool>,
    /// 请求来源, 原样写入审计记录
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl CommitRequest {
    pub fn new(actor: &str) -> Self {
        Self {
            actor: actor.to_string(),
            allow_partial: None,
            ip_address: None,
            user_agent: None,
        }
    }
}

/// 提交响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub message: String,
    pub job_id: String,
    pub status: String,
    pub result: CommitResult,
}

/// 导入API
pub struct ImportApi {
    db_path: String,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    fn connect(&self) -> ApiResult<Arc<Mutex<Connection>>> {
        let conn = open_sqlite_connection(&self.db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Ok(Arc::new(Mutex::new(conn)))
    }

    /// 按配置组装校验选项
    async fn build_options(
        config: &ConfigManager,
        request: &ValidateRequest,
    ) -> ApiResult<ValidateOptions> {
        let mut options = ValidateOptions::new(request.kind, request.mode);
        options.treat_slash_as_hierarchy = request.treat_slash_as_hierarchy;
        options.allow_create_missing_categories = request.allow_create_missing_categories;
        options.price_max = config
            .get_price_max()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        options.max_report_issues = config
            .get_max_report_issues()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        Ok(options)
    }

    /// 幂等去重 + 任务登记
    ///
    /// # 返回
    /// - Ok(Ok(job)): 新任务 (status=validating)
    /// - Ok(Err(existing)): 时间窗内的重复任务
    async fn register_job(
        &self,
        conn: &Arc<Mutex<Connection>>,
        config: &ConfigManager,
        request: &ValidateRequest,
    ) -> ApiResult<Result<ImportJob, ImportJob>> {
        let bytes = std::fs::read(&request.file_path)
            .map_err(|e| ApiError::InvalidInput(format!("文件读取失败: {}", e)))?;
        let file_hash = hashing::sha256_hex(&bytes);

        let job_repo = ImportJobRepository::new(conn.clone());
        let window_hours = config
            .get_job_dedup_window_hours()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        if let Some(existing) =
            job_repo.find_duplicate(&file_hash, request.kind, request.mode, window_hours)?
        {
            info!(
                existing_job_id = %existing.job_id,
                "同一文件在去重时间窗内已有任务, 复用"
            );
            return Ok(Err(existing));
        }

        let mut job = ImportJob::new(
            request.kind,
            request.mode,
            request.created_by.clone(),
            file_hash,
        );
        job.file_name = Path::new(&request.file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string());
        job.file_path = Some(request.file_path.clone());
        job.is_preview = request.is_preview;
        job.allow_partial = request.allow_partial;
        job_repo.insert(&job)?;
        Ok(Ok(job))
    }

    /// 执行校验流水线并挂载报告
    async fn run_pipeline(
        conn: Arc<Mutex<Connection>>,
        job_id: &str,
        file_path: &Path,
        options: &ValidateOptions,
    ) -> crate::importer::ImportResult<()> {
        let validator = CatalogValidatorImpl::new(CatalogRepository::new(conn.clone()));
        let output = validator.validate_file(file_path, options).await?;

        let job_repo = ImportJobRepository::new(conn);
        job_repo.attach_report(job_id, &output.report, output.total_rows as i64)?;
        Ok(())
    }

    /// 校验上传文件 (同步等待报告)
    ///
    /// # 返回
    /// - Created: 新任务, 报告已挂载 (status=pending)
    /// - Duplicate: 去重时间窗内命中既有任务
    pub async fn validate_file(&self, request: ValidateRequest) -> ApiResult<ValidateOutcome> {
        let conn = self.connect()?;
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let job = match self.register_job(&conn, &config, &request).await? {
            Ok(job) => job,
            Err(existing) => {
                return Ok(ValidateOutcome::Duplicate {
                    message: "同一文件近期已校验, 返回既有任务".to_string(),
                    existing_job_id: existing.job_id.clone(),
                    job: existing,
                })
            }
        };

        let options = Self::build_options(&config, &request).await?;
        let job_repo = ImportJobRepository::new(conn.clone());
        match Self::run_pipeline(conn, &job.job_id, Path::new(&request.file_path), &options).await
        {
            Ok(()) => Ok(ValidateOutcome::Created {
                job: job_repo.get(&job.job_id)?,
            }),
            Err(e) => {
                // 文件级致命失败: 任务置为 failed, 错误上抛
                error!(job_id = %job.job_id, error = %e, "校验失败");
                job_repo.mark_failed(&job.job_id, &e.to_string())?;
                Err(e.into())
            }
        }
    }

    /// 校验上传文件 (后台执行, 立即返回 validating 任务)
    pub async fn spawn_validate(&self, request: ValidateRequest) -> ApiResult<ValidateOutcome> {
        let conn = self.connect()?;
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let job = match self.register_job(&conn, &config, &request).await? {
            Ok(job) => job,
            Err(existing) => {
                return Ok(ValidateOutcome::Duplicate {
                    message: "同一文件近期已校验, 返回既有任务".to_string(),
                    existing_job_id: existing.job_id.clone(),
                    job: existing,
                })
            }
        };

        let options = Self::build_options(&config, &request).await?;
        let db_path = self.db_path.clone();
        let job_id = job.job_id.clone();
        let file_path = request.file_path.clone();

        tokio::spawn(async move {
            let conn = match open_sqlite_connection(&db_path) {
                Ok(conn) => Arc::new(Mutex::new(conn)),
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "后台校验建连失败");
                    return;
                }
            };
            let job_repo = ImportJobRepository::new(conn.clone());
            if let Err(e) =
                Self::run_pipeline(conn, &job_id, Path::new(&file_path), &options).await
            {
                error!(job_id = %job_id, error = %e, "后台校验失败");
                let _ = job_repo.mark_failed(&job_id, &e.to_string());
            }
        });

        Ok(ValidateOutcome::Created { job })
    }

    /// 查询单个任务
    pub async fn get_job(&self, job_id: &str) -> ApiResult<ImportJob> {
        let conn = self.connect()?;
        let job_repo = ImportJobRepository::new(conn);
        Ok(job_repo.get(job_id)?)
    }

    /// 任务列表 (按创建时间倒序)
    pub async fn list_jobs(
        &self,
        kind: Option<&str>,
        status: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> ApiResult<Vec<ImportJob>> {
        let kind = kind
            .map(|s| {
                ImportKind::from_str(s)
                    .ok_or_else(|| ApiError::InvalidInput(format!("未知文件种类: {}", s)))
            })
            .transpose()?;
        let status = status
            .map(|s| {
                JobStatus::from_str(s)
                    .ok_or_else(|| ApiError::InvalidInput(format!("未知任务状态: {}", s)))
            })
            .transpose()?;

        let conn = self.connect()?;
        let job_repo = ImportJobRepository::new(conn);
        Ok(job_repo.list(kind, status, limit, offset)?)
    }

    /// 提交任务
    ///
    /// # 返回
    /// - Ok(CommitResponse): 提交结果 (success / partial / failed)
    /// - Err(CommitConflict): 并发提交或状态不允许
    /// - Err(CommitBlocked): strict 阻断 / 校验失败行未确认 / 无报告 / 预览任务
    pub async fn commit(&self, job_id: &str, request: CommitRequest) -> ApiResult<CommitResponse> {
        let conn = self.connect()?;
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let verify_enabled = config
            .get_db_verify_enabled()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let options = CommitOptions {
            actor: request.actor,
            allow_partial: request.allow_partial,
            ip_address: request.ip_address,
            user_agent: request.user_agent,
            verify_enabled,
        };
        let engine = CommitEngine::new(conn);
        let result = engine.commit(job_id, &options)?;

        Ok(CommitResponse {
            message: format!(
                "提交完成: 创建 {} 条, 更新 {} 条, 跳过 {} 条",
                result.total_created(),
                result.total_updated(),
                result.skipped.len()
            ),
            job_id: job_id.to_string(),
            status: result.status.as_str().to_string(),
            result,
        })
    }

    /// 下载完整报告 (JSON 字节流)
    pub async fn report_blob(&self, job_id: &str) -> ApiResult<Vec<u8>> {
        let conn = self.connect()?;
        let job_repo = ImportJobRepository::new(conn);
        let job = job_repo.get(job_id)?;
        let report = job
            .report
            .ok_or_else(|| ApiError::NotFound(format!("任务 {} 尚无校验报告", job_id)))?;
        serde_json::to_vec_pretty(&report)
            .map_err(|e| ApiError::InternalError(format!("报告序列化失败: {}", e)))
    }

    /// 下载导入模板 (csv / json)
    pub fn template(
        &self,
        kind: &str,
        format: &str,
        include_examples: bool,
    ) -> ApiResult<Vec<u8>> {
        let kind = ImportKind::from_str(kind)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知文件种类: {}", kind)))?;
        let format = TemplateFormat::from_str(format).ok_or_else(|| {
            ApiError::InvalidInput(format!("模板格式仅支持 csv/json, 收到: {}", format))
        })?;
        Ok(crate::importer::schema::template(kind, format, include_examples)?)
    }
}
