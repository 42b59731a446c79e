// ==========================================
// 商品目录导入系统 - 导入层
// ==========================================
// 职责: 上传文件的解析 / 标准化 / 校验, 产出可提交报告
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod candidate_aggregator;
pub mod catalog_importer_impl;
pub mod catalog_importer_trait;
pub mod error;
pub mod file_parser;
pub mod hierarchy_resolver;
pub mod report_builder;
pub mod row_classifier;
pub mod row_validator;
pub mod schema;

// 重导出核心类型
pub use candidate_aggregator::CandidateAggregator;
pub use catalog_importer_impl::CatalogValidatorImpl;
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, ParsedFile, RawRow, UniversalFileParser};
pub use hierarchy_resolver::{normalize_slug, HierarchyResolver, SegmentResolution};
pub use report_builder::ReportBuilder;
pub use schema::{ColumnSpec, TemplateFormat};

// 重导出 Trait 接口
pub use catalog_importer_trait::{CatalogValidator, ValidateOptions, ValidationOutput};
pub use hierarchy_resolver::CatalogLookup;
pub use file_parser::FileParser;
