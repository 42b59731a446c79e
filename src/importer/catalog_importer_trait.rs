// ==========================================
// 商品目录导入系统 - 目录校验 Trait
// ==========================================
// 职责: 定义校验流水线接口（不包含实现）
// ==========================================

use crate::domain::import_job::ImportReport;
use crate::domain::types::{ImportKind, ImportMode};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// ValidateOptions - 校验选项
// ==========================================
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub kind: ImportKind,
    pub mode: ImportMode,
    /// category_path 中的 '/' 是否按层级切分
    pub treat_slash_as_hierarchy: bool,
    /// 未命中的类目段是否成为创建候选 (false 则记 error)
    pub allow_create_missing_categories: bool,
    /// 价格上限 (超出记 warning), None 不检查
    pub price_max: Option<f64>,
    /// 报告问题条数上限
    pub max_report_issues: usize,
}

impl ValidateOptions {
    pub fn new(kind: ImportKind, mode: ImportMode) -> Self {
        Self {
            kind,
            mode,
            treat_slash_as_hierarchy: true,
            allow_create_missing_categories: true,
            price_max: None,
            max_report_issues: 500,
        }
    }
}

// ==========================================
// ValidationOutput - 校验产物
// ==========================================
#[derive(Debug, Clone)]
pub struct ValidationOutput {
    pub report: ImportReport,
    /// 源文件数据行数 (续行合并前)
    pub total_rows: usize,
}

// ==========================================
// CatalogValidator Trait
// ==========================================
// 用途: 校验流水线主接口
// 实现者: CatalogValidatorImpl
#[async_trait]
pub trait CatalogValidator: Send + Sync {
    /// 解析并校验上传文件, 产出完整校验报告
    ///
    /// # 参数
    /// - file_path: 上传文件路径（.xlsx/.xls/.csv）
    /// - options: 文件种类 / 模式 / 层级与候选开关
    ///
    /// # 返回
    /// - Ok(ValidationOutput): 报告 + 行数统计
    /// - Err: 文件级致命错误（不存在 / 格式不符 / 缺少必需列 / 无数据行）
    ///
    /// # 校验流程（6个阶段）
    /// 1. 文件解析（表头 + 有序数据行）
    /// 2. 表头校验（缺必需列致命, 未识别列降级 warning）
    /// 3. 续行合并 + 型号消歧（标准化日志）
    /// 4. 行级校验（必填 / 类型 / 取值）
    /// 5. 层级解析 + 候选聚合
    /// 6. 报告汇总（strict 阻断判定）
    async fn validate_file(
        &self,
        file_path: &Path,
        options: &ValidateOptions,
    ) -> ImportResult<ValidationOutput>;
}
