// ==========================================
// 商品目录导入系统 - 基础类型定义
// ==========================================
// 职责: 导入任务/校验/目录实体共用的枚举类型
// 约束: 所有枚举提供 as_str/from_str, 与数据库存储格式对齐
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// ImportKind - 导入文件种类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    CatalogImport, // 混合目录表（商品+规格）
    VariantsCsv,   // 仅规格（SKU）
    ProductsCsv,   // 仅商品
    TaxonomyCsv,   // 仅类目树
}

impl ImportKind {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::CatalogImport => "catalog_import",
            ImportKind::VariantsCsv => "variants_csv",
            ImportKind::ProductsCsv => "products_csv",
            ImportKind::TaxonomyCsv => "taxonomy_csv",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "catalog_import" => Some(ImportKind::CatalogImport),
            "variants_csv" => Some(ImportKind::VariantsCsv),
            "products_csv" => Some(ImportKind::ProductsCsv),
            "taxonomy_csv" => Some(ImportKind::TaxonomyCsv),
            _ => None,
        }
    }
}

// ==========================================
// ImportMode - 校验模式
// ==========================================
// strict: 任一 error 级问题阻断整单提交
// smart: 问题行跳过, 有效行继续 (受 allow_partial 约束)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    Strict,
    Smart,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Strict => "strict",
            ImportMode::Smart => "smart",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(ImportMode::Strict),
            "smart" => Some(ImportMode::Smart),
            _ => None,
        }
    }
}

// ==========================================
// JobStatus - 导入任务状态
// ==========================================
// 状态机: pending → validating → {pending(带报告) | failed}
//         pending(带报告) → running → {success | partial | failed}
// 红线: 状态转换单向, 终态后报告不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Validating,
    Running,
    Success,
    Failed,
    Partial,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Validating => "validating",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Partial => "partial",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "validating" => Some(JobStatus::Validating),
            "running" => Some(JobStatus::Running),
            "success" => Some(JobStatus::Success),
            "failed" => Some(JobStatus::Failed),
            "partial" => Some(JobStatus::Partial),
            _ => None,
        }
    }

    /// 是否为终态 (终态后任务不可再变更)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Partial
        )
    }

    /// 是否为存活状态 (幂等去重时视为"进行中")
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Validating | JobStatus::Running
        )
    }
}

// ==========================================
// IssueSeverity - 校验问题级别
// ==========================================
// error: 阻断该行 (strict 模式下阻断整单)
// warning: 不阻断, 提示操作员
// info: 自动标准化等说明性信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Info => "info",
        }
    }
}

// ==========================================
// FieldType - 列值类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Int,
    Decimal,
    Bool,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Int => "int",
            FieldType::Decimal => "decimal",
            FieldType::Bool => "bool",
        }
    }
}

// ==========================================
// EntityType - 目录实体类型
// ==========================================
// 提交顺序依赖: Category → Brand → Series → Product → Variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Category,
    Brand,
    Series,
    Product,
    Variant,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Category => "category",
            EntityType::Brand => "brand",
            EntityType::Series => "series",
            EntityType::Product => "product",
            EntityType::Variant => "variant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "category" => Some(EntityType::Category),
            "brand" => Some(EntityType::Brand),
            "series" => Some(EntityType::Series),
            "product" => Some(EntityType::Product),
            "variant" => Some(EntityType::Variant),
            _ => None,
        }
    }

    /// 提交处理顺序 (依赖序: 父实体先建)
    pub fn commit_order() -> [EntityType; 5] {
        [
            EntityType::Category,
            EntityType::Brand,
            EntityType::Series,
            EntityType::Product,
            EntityType::Variant,
        ]
    }
}

// ==========================================
// RowType - 有效行类型 (valid_rows.type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowType {
    Product,
    Variant,
    Category,
}

impl RowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowType::Product => "product",
            RowType::Variant => "variant",
            RowType::Category => "category",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_roundtrip() {
        for s in ["pending", "validating", "running", "success", "failed", "partial"] {
            let status = JobStatus::from_str(s).unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert!(JobStatus::from_str("cancelled").is_none());
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Partial.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Running.is_live());
    }

    #[test]
    fn test_import_kind_serde() {
        let json = serde_json::to_string(&ImportKind::CatalogImport).unwrap();
        assert_eq!(json, "\"catalog_import\"");
    }
}
