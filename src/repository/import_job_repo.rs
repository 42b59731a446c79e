// ==========================================
// 商品目录导入系统 - 导入任务仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 关键: try_begin_commit 是提交互斥的唯一闸口 (条件更新 CAS)
// ==========================================

use crate::domain::import_job::{CommitResult, ImportJob, ImportReport};
use crate::domain::types::{ImportKind, ImportMode, JobStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{format_ts, parse_ts};
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ImportJobRepository - 导入任务仓储
// ==========================================
pub struct ImportJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportJobRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_row(row: &Row) -> RepositoryResult<ImportJob> {
        let kind_raw: String = row.get("kind")?;
        let status_raw: String = row.get("status")?;
        let mode_raw: String = row.get("mode")?;
        let report_json: Option<String> = row.get("report_json")?;
        let commit_result_json: Option<String> = row.get("commit_result_json")?;
        let started_at: Option<String> = row.get("started_at")?;
        let completed_at: Option<String> = row.get("completed_at")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        let report: Option<ImportReport> = report_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let commit_result: Option<CommitResult> = commit_result_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(ImportJob {
            job_id: row.get("job_id")?,
            kind: ImportKind::from_str(&kind_raw).ok_or_else(|| {
                RepositoryError::ValidationError(format!("未知文件种类: {}", kind_raw))
            })?,
            status: JobStatus::from_str(&status_raw).ok_or_else(|| {
                RepositoryError::ValidationError(format!("未知任务状态: {}", status_raw))
            })?,
            mode: ImportMode::from_str(&mode_raw).ok_or_else(|| {
                RepositoryError::ValidationError(format!("未知校验模式: {}", mode_raw))
            })?,
            created_by: row.get("created_by")?,
            file_name: row.get("file_name")?,
            file_path: row.get("file_path")?,
            file_hash: row.get("file_hash")?,
            is_preview: row.get::<_, i64>("is_preview")? != 0,
            allow_partial: row.get::<_, i64>("allow_partial")? != 0,
            report,
            total_rows: row.get("total_rows")?,
            created_count: row.get("created_count")?,
            updated_count: row.get("updated_count")?,
            skipped_count: row.get("skipped_count")?,
            error_count: row.get("error_count")?,
            warning_count: row.get("warning_count")?,
            commit_result,
            fail_reason: row.get("fail_reason")?,
            started_at: started_at.as_deref().map(parse_ts).transpose()?,
            completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        job_id, kind, status, mode, created_by,
        file_name, file_path, file_hash,
        is_preview, allow_partial, report_json,
        total_rows, created_count, updated_count, skipped_count,
        error_count, warning_count, commit_result_json, fail_reason,
        started_at, completed_at, created_at, updated_at
    "#;

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入新任务
    pub fn insert(&self, job: &ImportJob) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO import_job (
                job_id, kind, status, mode, created_by,
                file_name, file_path, file_hash,
                is_preview, allow_partial, report_json,
                total_rows, created_count, updated_count, skipped_count,
                error_count, warning_count, commit_result_json, fail_reason,
                started_at, completed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                job.job_id,
                job.kind.as_str(),
                job.status.as_str(),
                job.mode.as_str(),
                job.created_by,
                job.file_name,
                job.file_path,
                job.file_hash,
                job.is_preview as i64,
                job.allow_partial as i64,
                job.report.as_ref().map(serde_json::to_string).transpose()?,
                job.total_rows,
                job.created_count,
                job.updated_count,
                job.skipped_count,
                job.error_count,
                job.warning_count,
                job.commit_result
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                job.fail_reason,
                job.started_at.as_ref().map(format_ts),
                job.completed_at.as_ref().map(format_ts),
                format_ts(&job.created_at),
                format_ts(&job.updated_at),
            ],
        )?;

        Ok(job.job_id.clone())
    }

    /// 校验完成: 挂载报告, 状态 validating → pending
    pub fn attach_report(
        &self,
        job_id: &str,
        report: &ImportReport,
        total_rows: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE import_job
            SET status = 'pending',
                report_json = ?1,
                total_rows = ?2,
                error_count = ?3,
                warning_count = ?4,
                updated_at = ?5
            WHERE job_id = ?6 AND status = 'validating'
            "#,
            params![
                serde_json::to_string(report)?,
                total_rows,
                report.error_count() as i64,
                report.warning_count() as i64,
                format_ts(&Utc::now()),
                job_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportJob(validating)".to_string(),
                id: job_id.to_string(),
            });
        }
        Ok(())
    }

    /// 校验/提交致命失败: 置为终态 failed
    pub fn mark_failed(&self, job_id: &str, reason: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = format_ts(&Utc::now());
        conn.execute(
            r#"
            UPDATE import_job
            SET status = 'failed', fail_reason = ?1, completed_at = ?2, updated_at = ?2
            WHERE job_id = ?3
            "#,
            params![reason, now, job_id],
        )?;
        Ok(())
    }

    /// 提交闸口: 仅当状态仍为 pending 时抢占为 running
    ///
    /// # 返回
    /// - Ok(true): 抢占成功, 本调用方获得提交权
    /// - Ok(false): 状态已被他方改变 (并发提交 / 已终态)
    pub fn try_begin_commit(&self, job_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let now = format_ts(&Utc::now());
        let rows = conn.execute(
            r#"
            UPDATE import_job
            SET status = 'running', started_at = ?1, updated_at = ?1
            WHERE job_id = ?2 AND status = 'pending'
            "#,
            params![now, job_id],
        )?;
        Ok(rows == 1)
    }

    /// 提交收尾: 写入结果与终态 (success / partial / failed)
    ///
    /// status=failed 时 fail_reason 说明一行未落的原因
    pub fn finish_commit(
        &self,
        job_id: &str,
        status: JobStatus,
        result: &CommitResult,
        fail_reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = format_ts(&Utc::now());
        conn.execute(
            r#"
            UPDATE import_job
            SET status = ?1,
                commit_result_json = ?2,
                created_count = ?3,
                updated_count = ?4,
                skipped_count = ?5,
                fail_reason = ?6,
                completed_at = ?7,
                updated_at = ?7
            WHERE job_id = ?8 AND status = 'running'
            "#,
            params![
                status.as_str(),
                serde_json::to_string(result)?,
                result.total_created() as i64,
                result.total_updated() as i64,
                result.skipped.len() as i64,
                fail_reason,
                now,
                job_id,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 ID 查询 (不存在则 NotFound)
    pub fn get(&self, job_id: &str) -> RepositoryResult<ImportJob> {
        self.find(job_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "ImportJob".to_string(),
            id: job_id.to_string(),
        })
    }

    /// 按 ID 查询
    pub fn find(&self, job_id: &str) -> RepositoryResult<Option<ImportJob>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM import_job WHERE job_id = ?1",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![job_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::map_row(row)?)),
            None => Ok(None),
        }
    }

    /// 任务列表 (按创建时间倒序, 可按种类/状态过滤)
    pub fn list(
        &self,
        kind: Option<ImportKind>,
        status: Option<JobStatus>,
        limit: usize,
        offset: usize,
    ) -> RepositoryResult<Vec<ImportJob>> {
        let conn = self.get_conn()?;

        let mut sql = format!("SELECT {} FROM import_job WHERE 1=1", Self::SELECT_COLUMNS);
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(kind) = kind {
            sql.push_str(" AND kind = ?");
            args.push(Box::new(kind.as_str().to_string()));
        }
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, job_id DESC LIMIT ? OFFSET ?");
        args.push(Box::new(limit as i64));
        args.push(Box::new(offset as i64));

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows.next()? {
            jobs.push(Self::map_row(row)?);
        }
        Ok(jobs)
    }

    /// 幂等去重: 时间窗内同 (file_hash, kind, mode) 的未失败任务
    ///
    /// failed 任务不占坑, 同文件可重新校验
    pub fn find_duplicate(
        &self,
        file_hash: &str,
        kind: ImportKind,
        mode: ImportMode,
        window_hours: i64,
    ) -> RepositoryResult<Option<ImportJob>> {
        let conn = self.get_conn()?;
        let cutoff = format_ts(&(Utc::now() - Duration::hours(window_hours)));

        let sql = format!(
            r#"
            SELECT {} FROM import_job
            WHERE file_hash = ?1 AND kind = ?2 AND mode = ?3
              AND status != 'failed'
              AND created_at >= ?4
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![file_hash, kind.as_str(), mode.as_str(), cutoff])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::map_row(row)?)),
            None => Ok(None),
        }
    }
}
