// ==========================================
// 商品目录导入系统 - 列模板定义
// ==========================================
// 职责: 各文件种类的列集合 / 表头校验 / 模板文件生成
// 约束: 缺少必需列 → 整单致命失败 (不产生部分解析)
// ==========================================

use crate::domain::types::{FieldType, ImportKind};
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashSet;

// ==========================================
// ColumnSpec - 单列定义
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    /// 主行上必须非空
    pub required: bool,
    /// 多值列: 续行的值追加到主行
    pub multi_valued: bool,
    /// 身份列: 任一身份列非空的行为主行, 全空则为续行
    pub identity: bool,
}

const fn col(
    name: &'static str,
    field_type: FieldType,
    required: bool,
    multi_valued: bool,
    identity: bool,
) -> ColumnSpec {
    ColumnSpec {
        name,
        field_type,
        required,
        multi_valued,
        identity,
    }
}

// 混合目录表: 商品列 + 规格列在同一张表
const CATALOG_IMPORT_COLUMNS: &[ColumnSpec] = &[
    col("title", FieldType::Text, true, false, true),
    col("model_code", FieldType::Text, false, false, true),
    col("category_path", FieldType::Text, false, false, false),
    col("brand", FieldType::Text, false, false, false),
    col("series", FieldType::Text, false, false, false),
    col("price", FieldType::Decimal, false, false, false),
    col("stock", FieldType::Int, false, false, false),
    col("active", FieldType::Bool, false, false, false),
    col("description", FieldType::Text, false, false, false),
    col("image_url", FieldType::Text, false, true, false),
    col("spec_line", FieldType::Text, false, true, false),
];

const PRODUCTS_CSV_COLUMNS: &[ColumnSpec] = &[
    col("title", FieldType::Text, true, false, true),
    col("category_path", FieldType::Text, false, false, false),
    col("brand", FieldType::Text, false, false, false),
    col("series", FieldType::Text, false, false, false),
    col("description", FieldType::Text, false, false, false),
    col("image_url", FieldType::Text, false, true, false),
    col("spec_line", FieldType::Text, false, true, false),
];

const VARIANTS_CSV_COLUMNS: &[ColumnSpec] = &[
    col("model_code", FieldType::Text, true, false, true),
    col("product_slug", FieldType::Text, true, false, false),
    col("name", FieldType::Text, false, false, false),
    col("price", FieldType::Decimal, false, false, false),
    col("stock", FieldType::Int, false, false, false),
    col("image_url", FieldType::Text, false, true, false),
];

const TAXONOMY_CSV_COLUMNS: &[ColumnSpec] = &[
    col("category_path", FieldType::Text, true, false, true),
    col("name", FieldType::Text, false, false, false),
];

/// 返回指定文件种类的列模板
pub fn columns_for(kind: ImportKind) -> &'static [ColumnSpec] {
    match kind {
        ImportKind::CatalogImport => CATALOG_IMPORT_COLUMNS,
        ImportKind::ProductsCsv => PRODUCTS_CSV_COLUMNS,
        ImportKind::VariantsCsv => VARIANTS_CSV_COLUMNS,
        ImportKind::TaxonomyCsv => TAXONOMY_CSV_COLUMNS,
    }
}

/// 身份列名集合 (判定主行/续行)
pub fn identity_columns(kind: ImportKind) -> Vec<&'static str> {
    columns_for(kind)
        .iter()
        .filter(|c| c.identity)
        .map(|c| c.name)
        .collect()
}

/// 多值列名集合 (续行合并目标)
pub fn multi_valued_columns(kind: ImportKind) -> Vec<&'static str> {
    columns_for(kind)
        .iter()
        .filter(|c| c.multi_valued)
        .map(|c| c.name)
        .collect()
}

/// 校验表头: 缺少必需列即致命失败
///
/// # 返回
/// - Ok(Vec<String>): 未识别的多余列名 (由校验器降级为 warning)
/// - Err(ColumnSchemaError): 缺少必需列
pub fn check_header(kind: ImportKind, headers: &[String]) -> ImportResult<Vec<String>> {
    let specs = columns_for(kind);
    let header_set: HashSet<&str> = headers.iter().map(|h| h.as_str()).collect();

    let missing: Vec<String> = specs
        .iter()
        .filter(|c| c.required && !header_set.contains(c.name))
        .map(|c| c.name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ImportError::ColumnSchemaError {
            kind: kind.as_str().to_string(),
            missing,
        });
    }

    let known: HashSet<&str> = specs.iter().map(|c| c.name).collect();
    let unknown = headers
        .iter()
        .filter(|h| !h.is_empty() && !known.contains(h.as_str()))
        .cloned()
        .collect();

    Ok(unknown)
}

// ==========================================
// 模板文件生成 (GET template)
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Csv,
    Json,
}

impl TemplateFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "csv" => Some(TemplateFormat::Csv),
            "json" => Some(TemplateFormat::Json),
            _ => None,
        }
    }
}

/// 各列的示例值 (include_examples=true 时写入一行示例)
fn example_value(name: &str) -> &'static str {
    match name {
        "title" => "云川 X1 智能音箱",
        "name" => "X1 标准版",
        "model_code" => "YX-X1-100",
        "category_path" => "电子产品/智能家居/音箱",
        "brand" => "云川",
        "series" => "X 系列",
        "product_slug" => "yunchuan-x1",
        "price" => "299.00",
        "stock" => "120",
        "active" => "true",
        "description" => "支持语音控制的桌面音箱",
        "image_url" => "https://cdn.example.com/x1-front.jpg",
        "spec_line" => "输出功率: 10W",
        _ => "",
    }
}

/// 生成空白/示例模板文件内容
///
/// # 参数
/// - kind: 文件种类
/// - format: csv 或 json (xlsx 仅支持读取, 不支持生成)
/// - include_examples: 是否附带一行示例数据
pub fn template(
    kind: ImportKind,
    format: TemplateFormat,
    include_examples: bool,
) -> ImportResult<Vec<u8>> {
    let specs = columns_for(kind);

    match format {
        TemplateFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(specs.iter().map(|c| c.name))?;
            if include_examples {
                writer.write_record(specs.iter().map(|c| example_value(c.name)))?;
            }
            writer
                .into_inner()
                .map_err(|e| ImportError::InternalError(format!("模板生成失败: {}", e)))
        }
        TemplateFormat::Json => {
            let columns: Vec<serde_json::Value> = specs
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "name": c.name,
                        "type": c.field_type.as_str(),
                        "required": c.required,
                        "multi_valued": c.multi_valued,
                        "example": if include_examples {
                            Some(example_value(c.name))
                        } else {
                            None
                        },
                    })
                })
                .collect();
            let body = serde_json::json!({
                "kind": kind.as_str(),
                "columns": columns,
            });
            Ok(serde_json::to_vec_pretty(&body)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_header_missing_required() {
        let headers = vec!["brand".to_string(), "price".to_string()];
        let result = check_header(ImportKind::CatalogImport, &headers);
        match result {
            Err(ImportError::ColumnSchemaError { missing, .. }) => {
                assert_eq!(missing, vec!["title".to_string()]);
            }
            _ => panic!("期望 ColumnSchemaError"),
        }
    }

    #[test]
    fn test_check_header_unknown_columns_are_returned() {
        let headers = vec![
            "title".to_string(),
            "model_code".to_string(),
            "color".to_string(), // 未识别列
        ];
        let unknown = check_header(ImportKind::CatalogImport, &headers).unwrap();
        assert_eq!(unknown, vec!["color".to_string()]);
    }

    #[test]
    fn test_identity_columns_catalog() {
        let cols = identity_columns(ImportKind::CatalogImport);
        assert_eq!(cols, vec!["title", "model_code"]);
    }

    #[test]
    fn test_template_csv_with_examples() {
        let bytes = template(ImportKind::VariantsCsv, TemplateFormat::Csv, true).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("model_code,product_slug"));
        assert!(lines.next().unwrap().contains("YX-X1-100"));
    }

    #[test]
    fn test_template_json_blank() {
        let bytes = template(ImportKind::TaxonomyCsv, TemplateFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "taxonomy_csv");
        assert_eq!(value["columns"][0]["name"], "category_path");
    }
}
