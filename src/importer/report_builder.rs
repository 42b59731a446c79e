// ==========================================
// 商品目录导入系统 - 报告构建器
// ==========================================
// 职责: 汇总流水线各阶段产物为完整校验报告
// 红线: strict 模式存在 error 级问题 → 报告 blocked, 拒绝提交;
//       smart 模式 error 仅导致对应行被跳过, 报告仍可提交
// ==========================================

use crate::domain::catalog::{StagedCategory, StagedProduct, StagedVariant};
use crate::domain::import_job::{
    CandidateSet, ErrorRow, ImportIssue, ImportReport, NormalizationLog, ReportCounts,
    ReportStatus, ValidRow,
};
use crate::domain::types::{ImportMode, IssueSeverity};

// ==========================================
// ReportBuilder
// ==========================================
pub struct ReportBuilder {
    mode: ImportMode,
    /// 报告问题条数上限, 超出截断 (防止报告 JSON 膨胀)
    max_issues: usize,
    issues: Vec<ImportIssue>,
    candidates: CandidateSet,
    normalization: NormalizationLog,
    counts: ReportCounts,
    products_data: Vec<StagedProduct>,
    variants_data: Vec<StagedVariant>,
    categories_data: Vec<StagedCategory>,
    valid_rows: Vec<ValidRow>,
}

impl ReportBuilder {
    pub fn new(mode: ImportMode, max_issues: usize) -> Self {
        Self {
            mode,
            max_issues,
            issues: Vec::new(),
            candidates: CandidateSet::default(),
            normalization: NormalizationLog::default(),
            counts: ReportCounts::default(),
            products_data: Vec::new(),
            variants_data: Vec::new(),
            categories_data: Vec::new(),
            valid_rows: Vec::new(),
        }
    }

    pub fn push_issue(&mut self, issue: ImportIssue) {
        self.issues.push(issue);
    }

    pub fn push_issues(&mut self, issues: impl IntoIterator<Item = ImportIssue>) {
        self.issues.extend(issues);
    }

    pub fn set_candidates(&mut self, candidates: CandidateSet) {
        self.candidates = candidates;
    }

    pub fn normalization_mut(&mut self) -> &mut NormalizationLog {
        &mut self.normalization
    }

    pub fn counts_mut(&mut self) -> &mut ReportCounts {
        &mut self.counts
    }

    pub fn push_product(&mut self, product: StagedProduct, valid_row: ValidRow) {
        self.products_data.push(product);
        self.valid_rows.push(valid_row);
    }

    pub fn push_variant(&mut self, variant: StagedVariant, valid_row: ValidRow) {
        self.variants_data.push(variant);
        self.valid_rows.push(valid_row);
    }

    pub fn push_category(&mut self, category: StagedCategory, valid_row: ValidRow) {
        self.categories_data.push(category);
        self.valid_rows.push(valid_row);
    }

    /// 汇总报告结论并组装
    ///
    /// 结论规则:
    /// - strict 且有 error → blocked
    /// - 有 error (smart) 或有 warning → has_warnings
    /// - 否则 → valid
    pub fn build(mut self) -> ImportReport {
        // 候选数计入 to_create (实体类型 → 待创建数)
        let buckets = [
            ("category", self.candidates.categories.len()),
            ("series", self.candidates.series.len()),
            ("brand", self.candidates.brands.len()),
            ("product", self.candidates.products.len()),
        ];
        for (entity, count) in buckets {
            if count > 0 {
                *self.counts.to_create.entry(entity.to_string()).or_insert(0) += count;
            }
        }

        let error_count = self
            .issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count();
        let warning_count = self
            .issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count();

        let status = if error_count > 0 && self.mode == ImportMode::Strict {
            ReportStatus::Blocked
        } else if error_count > 0 || warning_count > 0 {
            ReportStatus::HasWarnings
        } else {
            ReportStatus::Valid
        };

        // 校验失败的行逐行登记 (截断前), 提交期据此计入跳过
        let mut error_rows: Vec<ErrorRow> = Vec::new();
        for issue in self
            .issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
        {
            if !error_rows.iter().any(|r| r.row_num == issue.row) {
                error_rows.push(ErrorRow {
                    row_num: issue.row,
                    reason: issue.message.clone(),
                });
            }
        }

        // 截断超限问题, 留一条说明
        if self.issues.len() > self.max_issues {
            let dropped = self.issues.len() - self.max_issues;
            self.issues.truncate(self.max_issues);
            self.issues.push(ImportIssue::new(
                0,
                IssueSeverity::Info,
                "issues_truncated",
                format!("问题条数超限, 另有 {} 条未列出", dropped),
            ));
        }

        ImportReport {
            status,
            issues: self.issues,
            candidates: self.candidates,
            normalization: self.normalization,
            counts: self.counts,
            products_data: self.products_data,
            variants_data: self.variants_data,
            categories_data: self.categories_data,
            valid_rows: self.valid_rows,
            error_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_issue(row: usize) -> ImportIssue {
        ImportIssue::new(
            row,
            IssueSeverity::Error,
            "missing_required",
            "必需列为空".to_string(),
        )
    }

    #[test]
    fn test_strict_mode_error_blocks() {
        let mut builder = ReportBuilder::new(ImportMode::Strict, 500);
        builder.push_issue(error_issue(3));
        let report = builder.build();
        assert_eq!(report.status, ReportStatus::Blocked);
    }

    #[test]
    fn test_smart_mode_error_is_not_blocking() {
        let mut builder = ReportBuilder::new(ImportMode::Smart, 500);
        builder.push_issue(error_issue(3));
        let report = builder.build();
        assert_eq!(report.status, ReportStatus::HasWarnings);
    }

    #[test]
    fn test_error_rows_registered_once_per_row() {
        let mut builder = ReportBuilder::new(ImportMode::Smart, 500);
        builder.push_issue(error_issue(3));
        builder.push_issue(
            ImportIssue::new(
                3,
                IssueSeverity::Error,
                "type_mismatch",
                "列 price 不是有效数值".to_string(),
            ),
        );
        builder.push_issue(error_issue(7));
        // warning 不产生跳过行
        builder.push_issue(ImportIssue::new(
            5,
            IssueSeverity::Warning,
            "unknown_column",
            "未识别的列".to_string(),
        ));

        let report = builder.build();
        assert_eq!(report.error_rows.len(), 2);
        assert_eq!(report.error_rows[0].row_num, 3);
        // 同一行取首条 error 的说明
        assert_eq!(report.error_rows[0].reason, "必需列为空");
        assert_eq!(report.error_rows[1].row_num, 7);
    }

    #[test]
    fn test_clean_report_is_valid() {
        let report = ReportBuilder::new(ImportMode::Strict, 500).build();
        assert_eq!(report.status, ReportStatus::Valid);
        assert!(report.counts.to_create.is_empty());
    }

    #[test]
    fn test_candidates_counted_into_to_create() {
        let mut builder = ReportBuilder::new(ImportMode::Smart, 500);
        let mut agg = crate::importer::candidate_aggregator::CandidateAggregator::new();
        agg.add_brand("yunchuan", "云川", 2);
        agg.add_product("yunchuan-x1", "云川 X1", None, 2);
        builder.set_candidates(agg.build());

        let report = builder.build();
        assert_eq!(report.counts.to_create.get("brand"), Some(&1));
        assert_eq!(report.counts.to_create.get("product"), Some(&1));
    }

    #[test]
    fn test_issue_truncation() {
        let mut builder = ReportBuilder::new(ImportMode::Smart, 10);
        for row in 0..25 {
            builder.push_issue(error_issue(row));
        }
        let report = builder.build();
        // 10 条保留 + 1 条截断说明
        assert_eq!(report.issues.len(), 11);
        assert_eq!(report.issues.last().unwrap().code, "issues_truncated");
    }
}
