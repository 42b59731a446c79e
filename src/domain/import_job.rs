// ==========================================
// 商品目录导入系统 - 导入任务领域模型
// ==========================================
// 职责: ImportJob / ImportReport / CommitResult 结构定义
// 红线: 报告仅在终态前可变; (file_hash, kind, mode) 标识一次提交
// ==========================================

use crate::domain::catalog::{StagedCategory, StagedProduct, StagedVariant};
use crate::domain::types::{ImportKind, ImportMode, IssueSeverity, JobStatus, RowType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

// ==========================================
// ImportJob - 导入任务
// ==========================================
// 对齐: import_job 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub job_id: String,
    pub kind: ImportKind,
    pub status: JobStatus,
    pub mode: ImportMode,
    pub created_by: String,

    // ===== 输入文件 =====
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    /// 上传内容 SHA-256 (幂等去重键的一部分)
    pub file_hash: String,

    // ===== 提交选项 =====
    pub is_preview: bool,
    pub allow_partial: bool,

    // ===== 校验报告 (终态前可变) =====
    pub report: Option<ImportReport>,

    // ===== 行级计数 =====
    pub total_rows: i64,
    pub created_count: i64,
    pub updated_count: i64,
    pub skipped_count: i64,
    pub error_count: i64,
    pub warning_count: i64,

    // ===== 提交结果 =====
    pub commit_result: Option<CommitResult>,

    /// 文件级致命失败原因 (status=failed 时非空)
    pub fail_reason: Option<String>,

    // ===== 时间戳 =====
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// 创建新任务 (validate 请求入口)
    pub fn new(
        kind: ImportKind,
        mode: ImportMode,
        created_by: String,
        file_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            kind,
            status: JobStatus::Validating,
            mode,
            created_by,
            file_name: None,
            file_path: None,
            file_hash,
            is_preview: false,
            allow_partial: false,
            report: None,
            total_rows: 0,
            created_count: 0,
            updated_count: 0,
            skipped_count: 0,
            error_count: 0,
            warning_count: 0,
            commit_result: None,
            fail_reason: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 提交准入判断 (allow_partial 取提交期生效值)
    ///
    /// 拒绝: 无报告 / strict 阻断 / 存在校验失败行且未确认部分提交
    pub fn committable_with(&self, allow_partial: bool) -> bool {
        match (&self.status, &self.report) {
            (JobStatus::Pending, Some(report)) => {
                report.status != ReportStatus::Blocked
                    && (report.error_rows.is_empty() || allow_partial)
            }
            _ => false,
        }
    }

    /// 提交准入判断 (allow_partial 取校验期登记值)
    pub fn is_committable(&self) -> bool {
        self.committable_with(self.allow_partial)
    }
}

// ==========================================
// ReportStatus - 报告整体结论
// ==========================================
// blocked: strict 模式存在 error 级问题, 拒绝提交
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Valid,
    HasWarnings,
    Blocked,
}

// ==========================================
// ImportIssue - 行级校验问题
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportIssue {
    /// 行号 (表头为第 1 行, 文件级问题记为 0)
    pub row: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub severity: IssueSeverity,
    /// 机器可读码, 如 missing_required / missing_category / type_mismatch
    pub code: String,
    pub message: String,
    /// 期望值说明 (类型/格式)
    pub expected: Option<String>,
}

impl ImportIssue {
    pub fn new(row: usize, severity: IssueSeverity, code: &str, message: String) -> Self {
        Self {
            row,
            column: None,
            value: None,
            severity,
            code: code.to_string(),
            message,
            expected: None,
        }
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_expected(mut self, expected: &str) -> Self {
        self.expected = Some(expected.to_string());
        self
    }
}

// ==========================================
// Candidate - 待创建实体候选
// ==========================================
// 用途: 操作员在提交前看到 "将创建品牌 X, 来源行 12/45/88"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub slug: String,
    pub name: String,
    /// 归属类目 slug (series 候选) 或父类目 slug (category 候选)
    pub category_slug: Option<String>,
    pub rows: Vec<usize>,
}

// ==========================================
// CandidateSet - 四桶候选集合
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateSet {
    pub categories: Vec<Candidate>,
    pub series: Vec<Candidate>,
    pub brands: Vec<Candidate>,
    pub products: Vec<Candidate>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.series.is_empty()
            && self.brands.is_empty()
            && self.products.is_empty()
    }
}

// ==========================================
// NormalizationLog - 标准化动作日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRowPair {
    pub primary_row: usize,
    pub continuation_row: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisambiguatedCode {
    pub row: usize,
    pub original: String,
    #[serde(rename = "new")]
    pub new_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationLog {
    /// 续行合并记录 {primary_row, continuation_row}
    pub merged_continuation_rows: Vec<MergedRowPair>,
    /// 重复型号消歧记录 {row, original, new}
    pub disambiguated_model_codes: Vec<DisambiguatedCode>,
    /// 空值标准化次数 (空白/仅空格 → 空)
    pub empty_values_normalized: usize,
}

// ==========================================
// ReportCounts - 行/实体计数
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportCounts {
    pub product_rows_seen: usize,
    pub product_rows_valid: usize,
    pub product_rows_error: usize,
    pub variant_rows_seen: usize,
    pub variant_rows_valid: usize,
    pub variant_rows_error: usize,
    /// 实体类型 → 待创建数
    pub to_create: BTreeMap<String, usize>,
    /// 实体类型 → 待更新数
    pub to_update: BTreeMap<String, usize>,
}

// ==========================================
// ValidRow - 提交阶段直接消费的有效行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidRow {
    pub row_num: usize,
    #[serde(rename = "type")]
    pub row_type: RowType,
    /// StagedProduct / StagedVariant / StagedCategory 的 JSON 载荷
    pub data: JsonValue,
}

// ==========================================
// ErrorRow - 校验失败的行
// ==========================================
// smart 模式下这些行在提交结果中记为跳过
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRow {
    pub row_num: usize,
    /// 首条 error 级问题的说明
    pub reason: String,
}

// ==========================================
// ImportReport - 完整校验报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub status: ReportStatus,
    pub issues: Vec<ImportIssue>,
    pub candidates: CandidateSet,
    pub normalization: NormalizationLog,
    pub counts: ReportCounts,
    pub products_data: Vec<StagedProduct>,
    pub variants_data: Vec<StagedVariant>,
    #[serde(default)]
    pub categories_data: Vec<StagedCategory>,
    pub valid_rows: Vec<ValidRow>,
    /// 校验失败的行 (提交期计入跳过)
    #[serde(default)]
    pub error_rows: Vec<ErrorRow>,
}

impl ImportReport {
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }
}

// ==========================================
// CommitResult - 提交结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResult {
    pub status: JobStatus,
    pub job_id: String,
    /// 实体类型 → 创建数
    pub created: BTreeMap<String, usize>,
    /// 实体类型 → 更新数
    pub updated: BTreeMap<String, usize>,
    /// 提交期间跳过的行 (allow_partial=true)
    pub skipped: Vec<CommitSkip>,
    pub db_verify: DbVerifyResult,
}

impl CommitResult {
    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }

    pub fn total_updated(&self) -> usize {
        self.updated.values().sum()
    }
}

/// 提交期间的行级跳过记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSkip {
    pub row_num: usize,
    pub reason: String,
}

// ==========================================
// DbVerifyResult - 提交后读回校验
// ==========================================
// 红线: 校验不一致不回滚已提交写入, 仅作非致命标记
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbVerifyResult {
    pub enabled: bool,
    pub verified_at: Option<DateTime<Utc>>,
    /// 实体类型 → 是否全部读回成功
    pub verified: BTreeMap<String, bool>,
    /// 实体类型 → 确认存在的 slug / model_code 列表
    pub confirmed: BTreeMap<String, Vec<String>>,
    /// 未读回的 slug / model_code (格式 "entity_type:key")
    pub mismatches: Vec<String>,
}

impl DbVerifyResult {
    pub fn all_verified(&self) -> bool {
        self.enabled && self.mismatches.is_empty()
    }
}
