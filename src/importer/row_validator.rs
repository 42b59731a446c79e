// ==========================================
// 商品目录导入系统 - 行级校验器
// ==========================================
// 职责: 对单行做必填/类型/取值校验, 产出行级问题列表
// 约束: 校验不中断流水线, 所有问题收集进报告
// ==========================================

use crate::domain::import_job::ImportIssue;
use crate::domain::types::{FieldType, IssueSeverity};
use crate::importer::file_parser::RawRow;
use crate::importer::schema::ColumnSpec;

// ==========================================
// 类型解析辅助
// ==========================================

/// 解析整数 (允许 "120" / "120.0" 形式的整值)
pub fn parse_int(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    // Excel 常把整数导出为 "120.0"
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
        _ => None,
    }
}

/// 解析小数 (拒绝 NaN/Inf)
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// 解析布尔: true/false/1/0/yes/no/是/否 (忽略大小写)
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "是" => Some(true),
        "false" | "0" | "no" | "否" => Some(false),
        _ => None,
    }
}

// ==========================================
// RowValidation - 单行校验产物
// ==========================================
pub struct RowValidation {
    pub issues: Vec<ImportIssue>,
    /// 仅含空白字符的单元格数 (标准化为"空"处理)
    pub empty_normalized: usize,
}

impl RowValidation {
    pub fn has_error(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error)
    }
}

// ==========================================
// 行级校验
// ==========================================

/// 校验单行 (续行合并后的主行)
///
/// 规则:
/// - 必填列缺失 → error (missing_required)
/// - int/decimal/bool 解析失败 → error (type_mismatch)
/// - 数值列为负 → error (negative_value)
/// - price 超出上限 → warning (price_exceeds_max)
/// - 仅空白的单元格计入 empty_normalized, 记 info (blank_normalized)
pub fn validate_row(
    row: &RawRow,
    specs: &[ColumnSpec],
    price_max: Option<f64>,
) -> RowValidation {
    let mut issues = Vec::new();
    let mut empty_normalized = 0;

    for spec in specs {
        let raw_cell = row.columns.get(spec.name);

        // 非空原文但 trim 后为空: 标准化为缺失
        if let Some(cell) = raw_cell {
            if !cell.is_empty() && cell.trim().is_empty() {
                empty_normalized += 1;
                issues.push(
                    ImportIssue::new(
                        row.row_num,
                        IssueSeverity::Info,
                        "blank_normalized",
                        format!("列 {} 仅含空白字符, 已按空值处理", spec.name),
                    )
                    .with_column(spec.name),
                );
            }
        }

        let value = row.get(spec.name);

        let Some(value) = value else {
            if spec.required {
                issues.push(
                    ImportIssue::new(
                        row.row_num,
                        IssueSeverity::Error,
                        "missing_required",
                        format!("必需列 {} 为空", spec.name),
                    )
                    .with_column(spec.name)
                    .with_expected("非空值"),
                );
            }
            continue;
        };

        // 多值列按行校验各段
        let segments: Vec<&str> = if spec.multi_valued {
            value.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).collect()
        } else {
            vec![value]
        };

        for segment in segments {
            match spec.field_type {
                FieldType::Text => {}
                FieldType::Int => match parse_int(segment) {
                    Some(n) if n < 0 => {
                        issues.push(
                            ImportIssue::new(
                                row.row_num,
                                IssueSeverity::Error,
                                "negative_value",
                                format!("列 {} 不允许负数: {}", spec.name, segment),
                            )
                            .with_column(spec.name)
                            .with_value(segment)
                            .with_expected("非负整数"),
                        );
                    }
                    Some(_) => {}
                    None => {
                        issues.push(
                            ImportIssue::new(
                                row.row_num,
                                IssueSeverity::Error,
                                "type_mismatch",
                                format!("列 {} 不是有效整数: {}", spec.name, segment),
                            )
                            .with_column(spec.name)
                            .with_value(segment)
                            .with_expected("整数"),
                        );
                    }
                },
                FieldType::Decimal => match parse_decimal(segment) {
                    Some(f) if f < 0.0 => {
                        issues.push(
                            ImportIssue::new(
                                row.row_num,
                                IssueSeverity::Error,
                                "negative_value",
                                format!("列 {} 不允许负数: {}", spec.name, segment),
                            )
                            .with_column(spec.name)
                            .with_value(segment)
                            .with_expected("非负数值"),
                        );
                    }
                    Some(f) => {
                        if spec.name == "price" {
                            if let Some(max) = price_max {
                                if f > max {
                                    issues.push(
                                        ImportIssue::new(
                                            row.row_num,
                                            IssueSeverity::Warning,
                                            "price_exceeds_max",
                                            format!("价格 {} 超出上限 {}", f, max),
                                        )
                                        .with_column(spec.name)
                                        .with_value(segment),
                                    );
                                }
                            }
                        }
                    }
                    None => {
                        issues.push(
                            ImportIssue::new(
                                row.row_num,
                                IssueSeverity::Error,
                                "type_mismatch",
                                format!("列 {} 不是有效数值: {}", spec.name, segment),
                            )
                            .with_column(spec.name)
                            .with_value(segment)
                            .with_expected("数值"),
                        );
                    }
                },
                FieldType::Bool => {
                    if parse_bool(segment).is_none() {
                        issues.push(
                            ImportIssue::new(
                                row.row_num,
                                IssueSeverity::Error,
                                "type_mismatch",
                                format!("列 {} 不是有效布尔值: {}", spec.name, segment),
                            )
                            .with_column(spec.name)
                            .with_value(segment)
                            .with_expected("true/false"),
                        );
                    }
                }
            }
        }
    }

    RowValidation {
        issues,
        empty_normalized,
    }
}

/// 未识别列 → 文件级 warning (记在表头行 1)
pub fn unknown_column_warnings(unknown: &[String]) -> Vec<ImportIssue> {
    unknown
        .iter()
        .map(|name| {
            ImportIssue::new(
                1,
                IssueSeverity::Warning,
                "unknown_column",
                format!("未识别的列 {}, 其内容将被忽略", name),
            )
            .with_column(name)
        })
        .collect()
}
