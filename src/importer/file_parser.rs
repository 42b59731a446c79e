// ==========================================
// 商品目录导入系统 - 文件解析器实现
// ==========================================
// 职责: 上传文件 → 有序原始行 (行号 → 列映射)
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

// ==========================================
// RawRow - 原始行 (行号从表头后的第 2 行起)
// ==========================================
#[derive(Debug, Clone)]
pub struct RawRow {
    pub row_num: usize,
    pub columns: HashMap<String, String>,
}

impl RawRow {
    /// 取列值 (trim 后为空视为缺失)
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

// ==========================================
// ParsedFile - 解析产物 (表头 + 数据行)
// ==========================================
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口 (流水线阶段 0)
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行记录
    ///
    /// # 返回
    /// - Ok(ParsedFile): 表头与数据行 (完全空白的行已跳过)
    /// - Err: 文件不存在 / 格式错误, 致命
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<ParsedFile>;
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(
                file_path.display().to_string(),
            ));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let mut columns = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    columns.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if columns.values().all(|v| v.is_empty()) {
                continue;
            }

            // 表头为第 1 行, 数据行从第 2 行起
            rows.push(RawRow {
                row_num: idx + 2,
                columns,
            });
        }

        Ok(ParsedFile { headers, rows })
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(
                file_path.display().to_string(),
            ));
        }

        // 按扩展名自动识别 xlsx/xls 工作簿格式
        let mut workbook = open_workbook_auto(file_path)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        let mut sheet_rows = range.rows();
        let header_row = sheet_rows.next().ok_or(ImportError::EmptyFile)?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, data_row) in sheet_rows.enumerate() {
            let mut columns = HashMap::new();

            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    columns.insert(header.clone(), cell.to_string().trim().to_string());
                }
            }

            if columns.values().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(RawRow {
                row_num: idx + 2,
                columns,
            });
        }

        Ok(ParsedFile { headers, rows })
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<ParsedFile> {
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse_to_raw_rows(file_path),
            "xlsx" | "xls" => ExcelParser.parse_to_raw_rows(file_path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_csv(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_csv_parser_valid_file() {
        let file = temp_csv("title,model_code,price\n音箱 X1,YX-100,299.00\n音箱 X2,YX-200,399.00\n");

        let parsed = CsvParser.parse_to_raw_rows(file.path()).unwrap();

        assert_eq!(parsed.headers, vec!["title", "model_code", "price"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].row_num, 2);
        assert_eq!(parsed.rows[0].get("title"), Some("音箱 X1"));
        assert_eq!(parsed.rows[1].get("model_code"), Some("YX-200"));
    }

    #[test]
    fn test_csv_parser_file_not_found() {
        let result = CsvParser.parse_to_raw_rows(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_csv_parser_skip_empty_rows_keeps_row_numbers() {
        let file = temp_csv("title,price\n音箱 X1,299\n,\n音箱 X2,399\n");

        let parsed = CsvParser.parse_to_raw_rows(file.path()).unwrap();

        // 空行被跳过, 但后续行号不因此前移
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].row_num, 2);
        assert_eq!(parsed.rows[1].row_num, 4);
    }

    #[test]
    fn test_universal_parser_unsupported_extension() {
        let result = UniversalFileParser.parse_to_raw_rows(Path::new("catalog.pdf"));
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_universal_parser_routes_xls_to_excel() {
        // .xls 扩展名应进入 Excel 解析分支, 内容损坏时报解析错误而非格式不支持
        let mut file = tempfile::Builder::new().suffix(".xls").tempfile().unwrap();
        write!(file, "这不是一个合法的工作簿").unwrap();

        let result = UniversalFileParser.parse_to_raw_rows(file.path());
        assert!(matches!(result, Err(ImportError::ExcelParseError(_))));
    }

    #[test]
    fn test_raw_row_get_trims_blank_to_none() {
        let mut columns = HashMap::new();
        columns.insert("brand".to_string(), "   ".to_string());
        let row = RawRow { row_num: 2, columns };
        assert_eq!(row.get("brand"), None);
    }
}
