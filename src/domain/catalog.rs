// ==========================================
// 商品目录导入系统 - 目录实体领域模型
// ==========================================
// 职责: 类目/品牌/系列/商品/规格 五类目录实体
// 约束: 唯一性以 slug / model_code 为锚 (数据库唯一约束)
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// Category - 类目 (树形, 以 parent_id 挂接)
// ==========================================
// 唯一约束: (parent_id, slug)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub category_id: i64,
    pub slug: String,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Brand - 品牌
// ==========================================
// 唯一约束: slug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub brand_id: i64,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Series - 系列 (隶属于一个类目)
// ==========================================
// 唯一约束: (category_id, slug)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub series_id: i64,
    pub slug: String,
    pub name: String,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Product - 商品
// ==========================================
// 唯一约束: slug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub slug: String,
    pub name: String,
    pub brand_slug: Option<String>,
    pub category_id: Option<i64>,
    pub series_id: Option<i64>,
    pub description: Option<String>,
    /// 图片 URL 列表 (JSON 数组存储)
    pub images: Vec<String>,
    /// 规格说明行 (JSON 数组存储)
    pub spec_lines: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// Variant - 规格 (SKU)
// ==========================================
// 唯一约束: model_code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub variant_id: i64,
    pub model_code: String,
    pub product_slug: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    /// 附加属性 (列名 → 值)
    pub attrs: BTreeMap<String, String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// StagedProduct - 报告中暂存的商品载荷
// ==========================================
// 用途: 提交阶段直接消费, 不再重新解析源文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedProduct {
    pub slug: String,
    pub name: String,
    pub brand_slug: Option<String>,
    pub category_slug: Option<String>,
    pub series_slug: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub spec_lines: Vec<String>,
    /// true 表示目标商品已存在, 提交时执行更新而非创建
    #[serde(default)]
    pub is_update: bool,
}

// ==========================================
// StagedVariant - 报告中暂存的规格载荷
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedVariant {
    pub model_code: String,
    pub product_slug: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_update: bool,
}

// ==========================================
// StagedCategory - 报告中暂存的类目载荷 (taxonomy_csv)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedCategory {
    pub slug: String,
    pub name: String,
    pub parent_slug: Option<String>,
}
