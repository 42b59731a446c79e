// ==========================================
// 商品目录导入系统 - 目录校验器实现
// ==========================================
// 职责: 整合校验流水线, 从文件到完整报告
// 流程: 解析 → 表头校验 → 续行合并 → 型号消歧 → 行级校验
//       → 层级解析 → 候选聚合 → 报告汇总
// 红线: 校验阶段不写目录表, 全部产物进报告
// ==========================================

use crate::domain::catalog::{StagedCategory, StagedProduct, StagedVariant};
use crate::domain::import_job::ValidRow;
use crate::domain::types::{ImportKind, IssueSeverity, RowType};
use crate::domain::ImportIssue;
use crate::importer::candidate_aggregator::CandidateAggregator;
use crate::importer::catalog_importer_trait::{
    CatalogValidator, ValidateOptions, ValidationOutput,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{FileParser, RawRow, UniversalFileParser};
use crate::importer::hierarchy_resolver::{
    normalize_slug, CatalogLookup, HierarchyResolver, ParentScope, PathResolution,
    SegmentResolution,
};
use crate::importer::report_builder::ReportBuilder;
use crate::importer::row_classifier::{disambiguate_model_codes, merge_continuation_rows};
use crate::importer::row_validator::{
    parse_bool, parse_decimal, parse_int, unknown_column_warnings, validate_row,
};
use crate::importer::schema;
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

// 目录查询错误统一降级为数据库查询错误
fn lookup_err(e: Box<dyn Error>) -> ImportError {
    ImportError::DatabaseQueryError(e.to_string())
}

// ==========================================
// CatalogValidatorImpl - 校验器实现
// ==========================================
pub struct CatalogValidatorImpl<L>
where
    L: CatalogLookup,
{
    // 目录只读查询 (解析 is_update / 既有层级)
    lookup: L,

    // 文件解析器 (阶段 0)
    file_parser: Box<dyn FileParser>,
}

impl<L> CatalogValidatorImpl<L>
where
    L: CatalogLookup,
{
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            file_parser: Box::new(UniversalFileParser),
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn FileParser>) -> Self {
        self.file_parser = parser;
        self
    }

    /// 解析类目路径: treat_slash_as_hierarchy=false 时整串按单段处理
    fn resolve_category(
        &self,
        resolver: &HierarchyResolver,
        path: &str,
        split_hierarchy: bool,
    ) -> ImportResult<PathResolution> {
        if split_hierarchy {
            return resolver
                .resolve_path(&self.lookup, path)
                .map_err(lookup_err);
        }

        let resolution = resolver
            .resolve_segment(&self.lookup, &ParentScope::Root, path)
            .map_err(lookup_err)?;

        let (terminal_category_id, terminal_slug, missing_slug) = match &resolution {
            SegmentResolution::Found(cat) => {
                (Some(cat.category_id), Some(cat.slug.clone()), None)
            }
            SegmentResolution::Candidate { slug, .. } => (None, Some(slug.clone()), None),
            SegmentResolution::Missing { slug, .. } => (None, None, Some(slug.clone())),
        };
        Ok(PathResolution {
            segments: vec![resolution],
            terminal_category_id,
            terminal_slug,
            missing_slug,
        })
    }

    /// 处理商品行 (catalog_import / products_csv)
    ///
    /// catalog_import 的行若带 model_code, 同时产出一条规格
    #[allow(clippy::too_many_arguments)]
    fn process_product_row(
        &self,
        row: &RawRow,
        options: &ValidateOptions,
        resolver: &HierarchyResolver,
        builder: &mut ReportBuilder,
        agg: &mut CandidateAggregator,
        variant_created: &mut usize,
        variant_updated: &mut usize,
        product_updated: &mut usize,
    ) -> ImportResult<()> {
        let specs = schema::columns_for(options.kind);
        let has_variant_part =
            options.kind == ImportKind::CatalogImport && row.get("model_code").is_some();

        builder.counts_mut().product_rows_seen += 1;
        if has_variant_part {
            builder.counts_mut().variant_rows_seen += 1;
        }

        let validation = validate_row(row, specs, options.price_max);
        builder.normalization_mut().empty_values_normalized += validation.empty_normalized;
        let row_has_error = validation.has_error();
        builder.push_issues(validation.issues);

        if row_has_error {
            builder.counts_mut().product_rows_error += 1;
            if has_variant_part {
                builder.counts_mut().variant_rows_error += 1;
            }
            return Ok(());
        }

        // title 已通过必填校验
        let Some(title) = row.get("title") else {
            return Ok(());
        };
        let product_slug = normalize_slug(title);

        // ===== 类目路径解析 =====
        let mut category_slug: Option<String> = None;
        let mut terminal_category_id: Option<i64> = None;
        if let Some(path) = row.get("category_path") {
            let resolution =
                self.resolve_category(resolver, path, options.treat_slash_as_hierarchy)?;

            if let Some(missing) = &resolution.missing_slug {
                builder.push_issue(
                    ImportIssue::new(
                        row.row_num,
                        IssueSeverity::Error,
                        "missing_category",
                        format!("类目 {} 不存在且不允许自动创建", missing),
                    )
                    .with_column("category_path")
                    .with_value(path),
                );
                builder.counts_mut().product_rows_error += 1;
                if has_variant_part {
                    builder.counts_mut().variant_rows_error += 1;
                }
                return Ok(());
            }

            for segment in &resolution.segments {
                if let SegmentResolution::Candidate {
                    slug,
                    name,
                    parent_slug,
                } = segment
                {
                    agg.add_category(slug, name, parent_slug.as_deref(), row.row_num);
                }
            }
            category_slug = resolution.terminal_slug.clone();
            terminal_category_id = resolution.terminal_category_id;
        }

        // ===== 品牌 =====
        let mut brand_slug: Option<String> = None;
        if let Some(brand_name) = row.get("brand") {
            let slug = normalize_slug(brand_name);
            if self.lookup.find_brand(&slug).map_err(lookup_err)?.is_none() {
                agg.add_brand(&slug, brand_name, row.row_num);
            }
            brand_slug = Some(slug);
        }

        // ===== 系列 (归属于终端类目) =====
        let mut series_slug: Option<String> = None;
        if let Some(series_name) = row.get("series") {
            let slug = normalize_slug(series_name);
            let existing = match terminal_category_id {
                Some(_) => self
                    .lookup
                    .find_series(terminal_category_id, &slug)
                    .map_err(lookup_err)?,
                // 类目本身是候选, 系列必为候选
                None => None,
            };
            if existing.is_none() {
                agg.add_series(&slug, series_name, category_slug.as_deref(), row.row_num);
            }
            series_slug = Some(slug);
        }

        // ===== 商品存在性 → 更新意图 =====
        let is_update = self
            .lookup
            .find_product(&product_slug)
            .map_err(lookup_err)?
            .is_some();
        if is_update {
            *product_updated += 1;
        } else {
            agg.add_product(&product_slug, title, category_slug.as_deref(), row.row_num);
        }

        let images = multi_values(row, "image_url");
        let spec_lines = multi_values(row, "spec_line");

        let staged = StagedProduct {
            slug: product_slug.clone(),
            name: title.to_string(),
            brand_slug,
            category_slug,
            series_slug,
            description: row.get("description").map(|s| s.to_string()),
            images,
            spec_lines,
            is_update,
        };
        let valid_row = ValidRow {
            row_num: row.row_num,
            row_type: RowType::Product,
            data: serde_json::to_value(&staged)?,
        };
        builder.push_product(staged, valid_row);
        builder.counts_mut().product_rows_valid += 1;

        // ===== 同行规格 (catalog_import) =====
        if has_variant_part {
            let model_code = row.get("model_code").unwrap_or_default().to_string();
            let variant_is_update = self
                .lookup
                .variant_exists(&model_code)
                .map_err(lookup_err)?;
            if variant_is_update {
                *variant_updated += 1;
            } else {
                *variant_created += 1;
            }

            let mut attrs = std::collections::BTreeMap::new();
            if let Some(active) = row.get("active").and_then(parse_bool) {
                attrs.insert("active".to_string(), active.to_string());
            }

            let staged_variant = StagedVariant {
                model_code,
                product_slug,
                name: None,
                price: row.get("price").and_then(parse_decimal),
                stock: row.get("stock").and_then(parse_int),
                attrs,
                images: Vec::new(),
                is_update: variant_is_update,
            };
            let valid_row = ValidRow {
                row_num: row.row_num,
                row_type: RowType::Variant,
                data: serde_json::to_value(&staged_variant)?,
            };
            builder.push_variant(staged_variant, valid_row);
            builder.counts_mut().variant_rows_valid += 1;
        }

        Ok(())
    }

    /// 处理规格行 (variants_csv)
    ///
    /// 规格不可携带新商品: product_slug 未命中 → error
    fn process_variant_row(
        &self,
        row: &RawRow,
        options: &ValidateOptions,
        builder: &mut ReportBuilder,
        variant_created: &mut usize,
        variant_updated: &mut usize,
    ) -> ImportResult<()> {
        let specs = schema::columns_for(options.kind);
        builder.counts_mut().variant_rows_seen += 1;

        let validation = validate_row(row, specs, options.price_max);
        builder.normalization_mut().empty_values_normalized += validation.empty_normalized;
        let row_has_error = validation.has_error();
        builder.push_issues(validation.issues);

        if row_has_error {
            builder.counts_mut().variant_rows_error += 1;
            return Ok(());
        }

        let (Some(model_code), Some(raw_product_slug)) =
            (row.get("model_code"), row.get("product_slug"))
        else {
            return Ok(());
        };
        let product_slug = normalize_slug(raw_product_slug);

        if self
            .lookup
            .find_product(&product_slug)
            .map_err(lookup_err)?
            .is_none()
        {
            builder.push_issue(
                ImportIssue::new(
                    row.row_num,
                    IssueSeverity::Error,
                    "missing_product",
                    format!("商品 {} 不存在, 规格无法挂接", product_slug),
                )
                .with_column("product_slug")
                .with_value(raw_product_slug),
            );
            builder.counts_mut().variant_rows_error += 1;
            return Ok(());
        }

        let is_update = self
            .lookup
            .variant_exists(model_code)
            .map_err(lookup_err)?;
        if is_update {
            *variant_updated += 1;
        } else {
            *variant_created += 1;
        }

        let staged = StagedVariant {
            model_code: model_code.to_string(),
            product_slug,
            name: row.get("name").map(|s| s.to_string()),
            price: row.get("price").and_then(parse_decimal),
            stock: row.get("stock").and_then(parse_int),
            attrs: std::collections::BTreeMap::new(),
            images: multi_values(row, "image_url"),
            is_update,
        };
        let valid_row = ValidRow {
            row_num: row.row_num,
            row_type: RowType::Variant,
            data: serde_json::to_value(&staged)?,
        };
        builder.push_variant(staged, valid_row);
        builder.counts_mut().variant_rows_valid += 1;

        Ok(())
    }

    /// 处理类目行 (taxonomy_csv)
    ///
    /// 路径上每个未命中段都成为待建类目 (跨行去重)
    fn process_taxonomy_row(
        &self,
        row: &RawRow,
        options: &ValidateOptions,
        resolver: &HierarchyResolver,
        builder: &mut ReportBuilder,
        agg: &mut CandidateAggregator,
        staged_seen: &mut HashSet<(Option<String>, String)>,
    ) -> ImportResult<()> {
        let specs = schema::columns_for(options.kind);

        let validation = validate_row(row, specs, options.price_max);
        builder.normalization_mut().empty_values_normalized += validation.empty_normalized;
        let row_has_error = validation.has_error();
        builder.push_issues(validation.issues);
        if row_has_error {
            return Ok(());
        }

        let Some(path) = row.get("category_path") else {
            return Ok(());
        };

        let resolution =
            self.resolve_category(resolver, path, options.treat_slash_as_hierarchy)?;
        let segment_count = resolution.segments.len();

        for (idx, segment) in resolution.segments.iter().enumerate() {
            let SegmentResolution::Candidate {
                slug,
                name,
                parent_slug,
            } = segment
            else {
                continue;
            };

            // 叶子段可被 name 列改写显示名
            let is_leaf = idx + 1 == segment_count;
            let display_name = if is_leaf {
                row.get("name").unwrap_or(name).to_string()
            } else {
                name.clone()
            };

            agg.add_category(slug, &display_name, parent_slug.as_deref(), row.row_num);

            let key = (parent_slug.clone(), slug.clone());
            if staged_seen.insert(key) {
                let staged = StagedCategory {
                    slug: slug.clone(),
                    name: display_name,
                    parent_slug: parent_slug.clone(),
                };
                let valid_row = ValidRow {
                    row_num: row.row_num,
                    row_type: RowType::Category,
                    data: serde_json::to_value(&staged)?,
                };
                builder.push_category(staged, valid_row);
            }
        }

        Ok(())
    }
}

/// 多值列按换行拆分
fn multi_values(row: &RawRow, column: &str) -> Vec<String> {
    row.get(column)
        .map(|v| {
            v.lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl<L> CatalogValidator for CatalogValidatorImpl<L>
where
    L: CatalogLookup,
{
    #[instrument(skip(self, file_path, options), fields(kind = options.kind.as_str(), mode = options.mode.as_str()))]
    async fn validate_file(
        &self,
        file_path: &Path,
        options: &ValidateOptions,
    ) -> ImportResult<ValidationOutput> {
        info!(file_path = %file_path.display(), "开始校验导入文件");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let parsed = self.file_parser.parse_to_raw_rows(file_path)?;
        if parsed.rows.is_empty() {
            warn!("文件无数据行");
            return Err(ImportError::EmptyFile);
        }
        let total_rows = parsed.rows.len();
        info!(total_rows = total_rows, "文件解析完成");

        let mut builder = ReportBuilder::new(options.mode, options.max_report_issues);

        // === 步骤 2: 表头校验 ===
        debug!("步骤 2: 表头校验");
        let unknown = schema::check_header(options.kind, &parsed.headers)?;
        if !unknown.is_empty() {
            warn!(unknown = ?unknown, "存在未识别列");
            builder.push_issues(unknown_column_warnings(&unknown));
        }

        // === 步骤 3: 续行合并 ===
        debug!("步骤 3: 续行合并");
        let identity_cols = schema::identity_columns(options.kind);
        let multi_cols = schema::multi_valued_columns(options.kind);
        let classified =
            merge_continuation_rows(parsed.rows, &identity_cols, &multi_cols);
        let merged_count = classified.merged.len();
        builder.normalization_mut().merged_continuation_rows = classified.merged;
        builder.push_issues(classified.issues);
        let mut rows = classified.rows;
        info!(merged = merged_count, primaries = rows.len(), "续行合并完成");

        // === 步骤 4: 型号消歧 ===
        let has_model_code = matches!(
            options.kind,
            ImportKind::CatalogImport | ImportKind::VariantsCsv
        );
        if has_model_code {
            debug!("步骤 4: 型号消歧");
            let disambiguated = disambiguate_model_codes(&mut rows, "model_code");
            if !disambiguated.is_empty() {
                info!(count = disambiguated.len(), "重复型号已消歧");
            }
            builder.normalization_mut().disambiguated_model_codes = disambiguated;
        }

        // === 步骤 5: 行级校验 + 层级解析 + 候选聚合 ===
        debug!("步骤 5: 行级校验与层级解析");
        let resolver = HierarchyResolver::new(options.allow_create_missing_categories);
        let mut agg = CandidateAggregator::new();
        let mut variant_created = 0usize;
        let mut variant_updated = 0usize;
        let mut product_updated = 0usize;
        let mut staged_category_seen = HashSet::new();

        for row in &rows {
            match options.kind {
                ImportKind::CatalogImport | ImportKind::ProductsCsv => {
                    self.process_product_row(
                        row,
                        options,
                        &resolver,
                        &mut builder,
                        &mut agg,
                        &mut variant_created,
                        &mut variant_updated,
                        &mut product_updated,
                    )?;
                }
                ImportKind::VariantsCsv => {
                    self.process_variant_row(
                        row,
                        options,
                        &mut builder,
                        &mut variant_created,
                        &mut variant_updated,
                    )?;
                }
                ImportKind::TaxonomyCsv => {
                    self.process_taxonomy_row(
                        row,
                        options,
                        &resolver,
                        &mut builder,
                        &mut agg,
                        &mut staged_category_seen,
                    )?;
                }
            }
        }

        // === 步骤 6: 报告汇总 ===
        debug!("步骤 6: 报告汇总");
        builder.set_candidates(agg.build());
        {
            let counts = builder.counts_mut();
            if variant_created > 0 {
                counts.to_create.insert("variant".to_string(), variant_created);
            }
            if variant_updated > 0 {
                counts.to_update.insert("variant".to_string(), variant_updated);
            }
            if product_updated > 0 {
                counts.to_update.insert("product".to_string(), product_updated);
            }
        }
        let report = builder.build();

        info!(
            status = ?report.status,
            errors = report.error_count(),
            warnings = report.warning_count(),
            "校验完成"
        );

        Ok(ValidationOutput { report, total_rows })
    }
}
