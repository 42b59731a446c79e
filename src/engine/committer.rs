// ==========================================
// 商品目录导入系统 - 提交引擎
// ==========================================
// 职责: 把 pending 任务的报告产物落库为目录实体
// 红线:
// - 提交权由条件更新抢占 (pending → running), 并发提交只有一方成功
// - 实体写入按依赖顺序: 类目 → 品牌 → 系列 → 商品 → 规格
// - 每次实体变更追加一条审计记录, 与数据变更同事务
// - 校验失败的行计入跳过; 存在此类行时提交需显式确认 allow_partial
// - allow_partial=false: 任一行失败整单回滚, 任务 failed
// - allow_partial=true: 失败行跳过并记录原因, 任务 partial;
//   一行未落则任务 failed
// ==========================================

use crate::domain::audit_log::{AuditAction, AuditLog};
use crate::domain::catalog::{StagedProduct, StagedVariant};
use crate::domain::import_job::{
    Candidate, CommitResult, CommitSkip, DbVerifyResult, ImportJob, ImportReport, ReportStatus,
};
use crate::domain::types::{EntityType, JobStatus, RowType};
use crate::engine::db_verifier::DbVerifier;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{AuditLogRepository, CatalogRepository, ImportJobRepository};
use rusqlite::Connection;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

// ==========================================
// CommitOptions - 提交期选项
// ==========================================
// allow_partial 为 None 时沿用校验期登记值
#[derive(Debug, Clone)]
pub struct CommitOptions {
    pub actor: String,
    pub allow_partial: Option<bool>,
    /// 审计记录的请求来源 (ip / 客户端标识)
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub verify_enabled: bool,
}

impl CommitOptions {
    pub fn new(actor: &str) -> Self {
        Self {
            actor: actor.to_string(),
            allow_partial: None,
            ip_address: None,
            user_agent: None,
            verify_enabled: false,
        }
    }
}

// 提交事务内累积的写入产物
struct CommitOutcome {
    created: BTreeMap<String, usize>,
    updated: BTreeMap<String, usize>,
    skipped: Vec<CommitSkip>,
}

impl CommitOutcome {
    fn new() -> Self {
        Self {
            created: BTreeMap::new(),
            updated: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    fn bump_created(&mut self, entity: EntityType) {
        *self.created.entry(entity.as_str().to_string()).or_insert(0) += 1;
    }

    fn bump_updated(&mut self, entity: EntityType) {
        *self.updated.entry(entity.as_str().to_string()).or_insert(0) += 1;
    }
}

// ==========================================
// CommitEngine - 提交引擎
// ==========================================
pub struct CommitEngine {
    conn: Arc<Mutex<Connection>>,
    job_repo: ImportJobRepository,
}

impl CommitEngine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            job_repo: ImportJobRepository::new(conn.clone()),
            conn,
        }
    }

    /// 提交任务
    ///
    /// # 参数
    /// - job_id: 任务 ID (必须处于 pending 且报告未被阻断)
    /// - options: 操作者 / allow_partial 覆盖 / 请求来源 / 读回验证开关
    ///
    /// # 返回
    /// - Ok(CommitResult): 提交结果 (success / partial / failed)
    /// - Err(CommitConflict): 并发提交或状态不允许
    /// - Err(CommitBlocked): 报告被阻断 / 校验失败行未确认 / 预览任务 / 无报告
    #[instrument(skip(self, options), fields(job_id = %job_id, actor = %options.actor))]
    pub fn commit(&self, job_id: &str, options: &CommitOptions) -> ImportResult<CommitResult> {
        // === 步骤 1: 读取任务与准入检查 ===
        debug!("步骤 1: 准入检查");
        let job = match self.job_repo.find(job_id)? {
            Some(job) => job,
            None => return Err(ImportError::JobNotFound(job_id.to_string())),
        };

        if job.is_preview {
            return Err(ImportError::CommitBlocked("预览任务不可提交".to_string()));
        }
        if job.status != JobStatus::Pending {
            return Err(ImportError::CommitConflict {
                job_id: job_id.to_string(),
                status: job.status.as_str().to_string(),
            });
        }
        let Some(report) = job.report.clone() else {
            return Err(ImportError::CommitBlocked("任务无校验报告".to_string()));
        };
        let allow_partial = options.allow_partial.unwrap_or(job.allow_partial);
        if !job.committable_with(allow_partial) {
            let reason = if report.status == ReportStatus::Blocked {
                "报告存在 error 级问题且处于 strict 模式"
            } else {
                "报告存在校验失败行, 提交需显式确认 allow_partial"
            };
            return Err(ImportError::CommitBlocked(reason.to_string()));
        }

        // === 步骤 2: 抢占提交权 (pending → running) ===
        debug!("步骤 2: 抢占提交权");
        if !self.job_repo.try_begin_commit(job_id)? {
            let status = self
                .job_repo
                .find(job_id)?
                .map(|j| j.status.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            warn!(status = %status, "提交权抢占失败");
            return Err(ImportError::CommitConflict {
                job_id: job_id.to_string(),
                status,
            });
        }
        info!("提交权抢占成功, 开始落库");

        // === 步骤 3: 事务化写入 ===
        let outcome = match self.apply_writes(&job, &report, options, allow_partial) {
            Ok(outcome) => outcome,
            Err(e) => {
                // 事务已回滚, 任务终态 failed
                warn!(error = %e, "提交失败, 整单回滚");
                self.job_repo.mark_failed(job_id, &e.to_string())?;
                return Err(e);
            }
        };

        // === 步骤 4: 读回验证 (非致命) ===
        let db_verify = if options.verify_enabled {
            debug!("步骤 4: 读回验证");
            let verifier = DbVerifier::new(CatalogRepository::new(self.conn.clone()));
            match verifier.verify(&report) {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "读回验证执行失败");
                    DbVerifyResult {
                        enabled: true,
                        verified_at: Some(chrono::Utc::now()),
                        mismatches: vec![format!("verify_error:{}", e)],
                        ..Default::default()
                    }
                }
            }
        } else {
            DbVerifyResult::default()
        };
        if db_verify.enabled && !db_verify.mismatches.is_empty() {
            warn!(mismatches = ?db_verify.mismatches, "读回验证存在不一致");
        }

        // === 步骤 5: 收尾 ===
        let committed: usize =
            outcome.created.values().sum::<usize>() + outcome.updated.values().sum::<usize>();
        let status = if outcome.skipped.is_empty() {
            JobStatus::Success
        } else if committed == 0 {
            // 一行未落
            JobStatus::Failed
        } else {
            JobStatus::Partial
        };
        let result = CommitResult {
            status,
            job_id: job_id.to_string(),
            created: outcome.created,
            updated: outcome.updated,
            skipped: outcome.skipped,
            db_verify,
        };
        let fail_reason = (status == JobStatus::Failed)
            .then(|| format!("全部 {} 行被跳过, 未提交任何实体", result.skipped.len()));
        self.job_repo
            .finish_commit(job_id, status, &result, fail_reason.as_deref())?;

        info!(
            status = status.as_str(),
            created = result.total_created(),
            updated = result.total_updated(),
            skipped = result.skipped.len(),
            "提交完成"
        );
        Ok(result)
    }

    /// 单事务内按依赖顺序写入全部实体
    ///
    /// 返回 Err 即整单回滚 (事务随作用域丢弃)
    fn apply_writes(
        &self,
        job: &ImportJob,
        report: &ImportReport,
        options: &CommitOptions,
        allow_partial: bool,
    ) -> ImportResult<CommitOutcome> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))?;
        let tx = guard
            .transaction()
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        let metadata = json!({ "job_id": job.job_id, "source": "bulk_import" });
        let mut outcome = CommitOutcome::new();
        // 本次提交已解析的类目 slug → id
        let mut category_ids: HashMap<String, i64> = HashMap::new();

        // === 校验失败的行先行计入跳过 ===
        // 准入已要求 allow_partial 确认, 走到这里即为跳过语义
        for err_row in &report.error_rows {
            outcome.skipped.push(CommitSkip {
                row_num: err_row.row_num,
                reason: err_row.reason.clone(),
            });
        }

        // === 类目 (多轮处理, 父段先行) ===
        debug!(count = report.candidates.categories.len(), "写入类目候选");
        self.apply_categories(
            &tx,
            report,
            options,
            &metadata,
            allow_partial,
            &mut outcome,
            &mut category_ids,
        )?;

        // === 品牌 ===
        debug!(count = report.candidates.brands.len(), "写入品牌候选");
        for cand in &report.candidates.brands {
            let (brand, created_now) =
                CatalogRepository::ensure_brand_tx(&tx, &cand.slug, &cand.name)?;
            if created_now {
                outcome.bump_created(EntityType::Brand);
                AuditLogRepository::insert_tx(
                    &tx,
                    &Self::audit_entry(
                        options,
                        AuditAction::Create,
                        EntityType::Brand,
                        brand.brand_id.to_string(),
                        &metadata,
                    )
                    .with_label(&brand.name)
                    .with_after(&brand),
                )?;
            }
        }

        // === 系列 ===
        debug!(count = report.candidates.series.len(), "写入系列候选");
        for cand in &report.candidates.series {
            let category_id = match &cand.category_slug {
                None => None,
                Some(slug) => match Self::resolve_category_id(&tx, &mut category_ids, slug)? {
                    Some(id) => Some(id),
                    None => {
                        let row = cand.rows.first().copied().unwrap_or(0);
                        let reason = format!("系列 {} 的归属类目 {} 不存在", cand.slug, slug);
                        if allow_partial {
                            outcome.skipped.push(CommitSkip { row_num: row, reason });
                            continue;
                        }
                        return Err(ImportError::DatabaseTransactionError(reason));
                    }
                },
            };
            let (series, created_now) =
                CatalogRepository::ensure_series_tx(&tx, &cand.slug, &cand.name, category_id)?;
            if created_now {
                outcome.bump_created(EntityType::Series);
                AuditLogRepository::insert_tx(
                    &tx,
                    &Self::audit_entry(
                        options,
                        AuditAction::Create,
                        EntityType::Series,
                        series.series_id.to_string(),
                        &metadata,
                    )
                    .with_label(&series.name)
                    .with_after(&series),
                )?;
            }
        }

        // === 商品 ===
        let product_rows = rows_of_type(report, RowType::Product);
        debug!(count = report.products_data.len(), "写入商品");
        for (idx, staged) in report.products_data.iter().enumerate() {
            let row_num = product_rows.get(idx).copied().unwrap_or(0);
            match self.apply_product(&tx, staged, options, &metadata, &mut category_ids) {
                Ok(created_now) => {
                    if created_now {
                        outcome.bump_created(EntityType::Product);
                    } else {
                        outcome.bump_updated(EntityType::Product);
                    }
                }
                Err(e) if allow_partial => {
                    warn!(row = row_num, error = %e, "商品写入失败, 已跳过");
                    outcome.skipped.push(CommitSkip {
                        row_num,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        // === 规格 ===
        let variant_rows = rows_of_type(report, RowType::Variant);
        debug!(count = report.variants_data.len(), "写入规格");
        for (idx, staged) in report.variants_data.iter().enumerate() {
            let row_num = variant_rows.get(idx).copied().unwrap_or(0);
            match self.apply_variant(&tx, staged, options, &metadata) {
                Ok(created_now) => {
                    if created_now {
                        outcome.bump_created(EntityType::Variant);
                    } else {
                        outcome.bump_updated(EntityType::Variant);
                    }
                }
                Err(e) if allow_partial => {
                    warn!(row = row_num, error = %e, "规格写入失败, 已跳过");
                    outcome.skipped.push(CommitSkip {
                        row_num,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        tx.commit()
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;
        Ok(outcome)
    }

    /// 审计记录骨架: 操作者 / 请求来源 / 任务元数据
    fn audit_entry(
        options: &CommitOptions,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: String,
        metadata: &serde_json::Value,
    ) -> AuditLog {
        AuditLog::new(options.actor.clone(), action, entity_type, entity_id)
            .with_metadata(metadata.clone())
            .with_request_info(options.ip_address.clone(), options.user_agent.clone())
    }

    /// 类目候选多轮写入: 每轮处理父类目已就绪的候选
    #[allow(clippy::too_many_arguments)]
    fn apply_categories(
        &self,
        tx: &Connection,
        report: &ImportReport,
        options: &CommitOptions,
        metadata: &serde_json::Value,
        allow_partial: bool,
        outcome: &mut CommitOutcome,
        category_ids: &mut HashMap<String, i64>,
    ) -> ImportResult<()> {
        let mut pending: Vec<&Candidate> = report.candidates.categories.iter().collect();

        loop {
            let before = pending.len();
            let mut deferred = Vec::new();

            for cand in pending {
                let parent_id = match &cand.category_slug {
                    None => None,
                    Some(parent_slug) => {
                        match Self::resolve_category_id(tx, category_ids, parent_slug)? {
                            Some(id) => Some(id),
                            // 父段尚未写入, 推迟到下一轮
                            None => {
                                deferred.push(cand);
                                continue;
                            }
                        }
                    }
                };

                let (category, created_now) =
                    CatalogRepository::ensure_category_tx(tx, &cand.slug, &cand.name, parent_id)?;
                category_ids.insert(category.slug.clone(), category.category_id);
                if created_now {
                    outcome.bump_created(EntityType::Category);
                    AuditLogRepository::insert_tx(
                        tx,
                        &Self::audit_entry(
                            options,
                            AuditAction::Create,
                            EntityType::Category,
                            category.category_id.to_string(),
                            metadata,
                        )
                        .with_label(&category.name)
                        .with_after(&category),
                    )?;
                }
            }

            if deferred.is_empty() {
                return Ok(());
            }
            // 一轮无推进: 剩余候选的父类目在本次提交内外都不存在
            if deferred.len() == before {
                for cand in deferred {
                    let reason = format!(
                        "类目 {} 的父类目 {} 不存在",
                        cand.slug,
                        cand.category_slug.as_deref().unwrap_or("")
                    );
                    if !allow_partial {
                        return Err(ImportError::DatabaseTransactionError(reason));
                    }
                    outcome.skipped.push(CommitSkip {
                        row_num: cand.rows.first().copied().unwrap_or(0),
                        reason,
                    });
                }
                return Ok(());
            }
            pending = deferred;
        }
    }

    /// 解析类目 slug → id (先查本次提交缓存, 再查库)
    fn resolve_category_id(
        tx: &Connection,
        category_ids: &mut HashMap<String, i64>,
        slug: &str,
    ) -> ImportResult<Option<i64>> {
        if let Some(id) = category_ids.get(slug) {
            return Ok(Some(*id));
        }
        match CatalogRepository::find_category_any_tx(tx, slug)? {
            Some(category) => {
                category_ids.insert(slug.to_string(), category.category_id);
                Ok(Some(category.category_id))
            }
            None => Ok(None),
        }
    }

    /// 单个商品写入 + 审计
    ///
    /// # 返回
    /// - Ok(true): 创建
    /// - Ok(false): 更新
    fn apply_product(
        &self,
        tx: &Connection,
        staged: &StagedProduct,
        options: &CommitOptions,
        metadata: &serde_json::Value,
        category_ids: &mut HashMap<String, i64>,
    ) -> ImportResult<bool> {
        let category_id = match &staged.category_slug {
            None => None,
            Some(slug) => Self::resolve_category_id(tx, category_ids, slug)?,
        };
        let series_id = match &staged.series_slug {
            None => None,
            Some(slug) => {
                CatalogRepository::find_series_tx(tx, category_id, slug)?.map(|s| s.series_id)
            }
        };

        let before = CatalogRepository::find_product_tx(tx, &staged.slug)?;
        let (product, created_now) =
            CatalogRepository::upsert_product_tx(tx, staged, category_id, series_id)?;

        let action = if created_now {
            AuditAction::Create
        } else {
            AuditAction::Update
        };
        let mut log = Self::audit_entry(
            options,
            action,
            EntityType::Product,
            product.product_id.to_string(),
            metadata,
        )
        .with_label(&product.name)
        .with_after(&product);
        if let Some(before) = &before {
            log = log.with_before(before);
        }
        AuditLogRepository::insert_tx(tx, &log)?;

        Ok(created_now)
    }

    /// 单个规格写入 + 审计 (商品必须已存在)
    fn apply_variant(
        &self,
        tx: &Connection,
        staged: &StagedVariant,
        options: &CommitOptions,
        metadata: &serde_json::Value,
    ) -> ImportResult<bool> {
        if CatalogRepository::find_product_tx(tx, &staged.product_slug)?.is_none() {
            return Err(ImportError::DatabaseTransactionError(format!(
                "规格 {} 的归属商品 {} 不存在",
                staged.model_code, staged.product_slug
            )));
        }

        let before = CatalogRepository::find_variant_tx(tx, &staged.model_code)?;
        let (variant, created_now) = CatalogRepository::upsert_variant_tx(tx, staged)?;

        let action = if created_now {
            AuditAction::Create
        } else {
            AuditAction::Update
        };
        let mut log = Self::audit_entry(
            options,
            action,
            EntityType::Variant,
            variant.variant_id.to_string(),
            metadata,
        )
        .with_label(&variant.model_code)
        .with_after(&variant);
        if let Some(before) = &before {
            log = log.with_before(before);
        }
        AuditLogRepository::insert_tx(tx, &log)?;

        Ok(created_now)
    }
}

/// 报告中指定类型有效行的行号序列 (与 *_data 顺序一致)
fn rows_of_type(report: &ImportReport, row_type: RowType) -> Vec<usize> {
    report
        .valid_rows
        .iter()
        .filter(|r| r.row_type == row_type)
        .map(|r| r.row_num)
        .collect()
}
