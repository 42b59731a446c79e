// ==========================================
// 商品目录导入系统 - 行分类器 (续行合并 / 型号消歧)
// ==========================================
// 职责: 有序行序列上的纯函数, 产出 (合并后行, 标准化日志)
// 约束: 不做 I/O, 可独立穷举测试
// ==========================================

use crate::domain::import_job::{DisambiguatedCode, ImportIssue, MergedRowPair};
use crate::domain::types::IssueSeverity;
use crate::importer::file_parser::RawRow;
use std::collections::HashMap;

// ==========================================
// 续行合并
// ==========================================

/// 合并产物
pub struct ClassifiedRows {
    pub rows: Vec<RawRow>,
    pub merged: Vec<MergedRowPair>,
    pub issues: Vec<ImportIssue>,
}

/// 合并续行到其前导主行
///
/// 规则:
/// - 身份列 (identity_cols) 全空的行为续行, 其非空单元格追加到
///   前导主行的多值列 (multi_cols); 连续多条续行均挂接到同一主行
/// - 续行在多值列之外的非空单元格被忽略 (主行值优先)
/// - 文件首行即为续行时无主行可挂接, 记 error 级问题 (orphan_continuation)
///
/// # 返回
/// - ClassifiedRows: 合并后的主行序列 + 合并记录 + 孤行问题
pub fn merge_continuation_rows(
    rows: Vec<RawRow>,
    identity_cols: &[&str],
    multi_cols: &[&str],
) -> ClassifiedRows {
    let mut primaries: Vec<RawRow> = Vec::new();
    let mut merged = Vec::new();
    let mut issues = Vec::new();

    for row in rows {
        let is_continuation = identity_cols.iter().all(|c| row.get(c).is_none());

        if !is_continuation {
            primaries.push(row);
            continue;
        }

        let Some(primary) = primaries.last_mut() else {
            issues.push(
                ImportIssue::new(
                    row.row_num,
                    IssueSeverity::Error,
                    "orphan_continuation",
                    "续行之前没有可挂接的主行".to_string(),
                ),
            );
            continue;
        };

        // 追加续行的非空多值单元格
        for col in multi_cols {
            if let Some(value) = row.get(col) {
                let entry = primary
                    .columns
                    .entry(col.to_string())
                    .or_default();
                if entry.trim().is_empty() {
                    *entry = value.to_string();
                } else {
                    entry.push('\n');
                    entry.push_str(value);
                }
            }
        }

        merged.push(MergedRowPair {
            primary_row: primary.row_num,
            continuation_row: row.row_num,
        });
    }

    ClassifiedRows {
        rows: primaries,
        merged,
        issues,
    }
}

// ==========================================
// 型号消歧
// ==========================================

/// 对同文件内重复的型号追加数字后缀
///
/// 规则: 第 2 次及以后出现的 `ABC-100` 依次改写为 `ABC-100-2`,
/// `ABC-100-3`, ...; 若改写结果与文件内其他型号再次冲突, 继续递增。
/// 每次改写记录 {row, original, new}。
///
/// # 参数
/// - rows: 合并续行后的主行序列 (原地改写 model_code 列)
/// - code_column: 型号所在列名
pub fn disambiguate_model_codes(
    rows: &mut [RawRow],
    code_column: &str,
) -> Vec<DisambiguatedCode> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut log = Vec::new();

    // 先登记所有出现的型号, 避免后缀再冲突
    let mut taken: HashMap<String, usize> = HashMap::new();
    for row in rows.iter() {
        if let Some(code) = row.get(code_column) {
            *taken.entry(code.to_string()).or_insert(0) += 1;
        }
    }

    for row in rows.iter_mut() {
        let Some(code) = row.get(code_column).map(|c| c.to_string()) else {
            continue;
        };

        let occurrence = seen.entry(code.clone()).or_insert(0);
        *occurrence += 1;
        if *occurrence == 1 {
            continue;
        }

        // 从 -2 起找一个未被占用的后缀
        let mut suffix = *occurrence;
        let new_code = loop {
            let candidate = format!("{}-{}", code, suffix);
            if !taken.contains_key(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        *taken.entry(new_code.clone()).or_insert(0) += 1;

        row.columns
            .insert(code_column.to_string(), new_code.clone());
        log.push(DisambiguatedCode {
            row: row.row_num,
            original: code,
            new_code,
        });
    }

    log
}
