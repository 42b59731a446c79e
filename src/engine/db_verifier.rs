// ==========================================
// 商品目录导入系统 - 提交后读回验证
// ==========================================
// 职责: 提交完成后按 slug / model_code 逐一读回, 确认可见性
// 红线: 验证不一致不回滚已提交写入, 仅作非致命标记
// ==========================================

use crate::domain::import_job::{DbVerifyResult, ImportReport};
use crate::repository::{CatalogRepository, RepositoryResult};
use chrono::Utc;

// ==========================================
// DbVerifier - 读回验证器
// ==========================================
pub struct DbVerifier {
    catalog: CatalogRepository,
}

impl DbVerifier {
    pub fn new(catalog: CatalogRepository) -> Self {
        Self { catalog }
    }

    /// 读回验证报告涉及的全部实体
    ///
    /// 验证范围: 候选类目/品牌 + 暂存商品/规格
    pub fn verify(&self, report: &ImportReport) -> RepositoryResult<DbVerifyResult> {
        let mut result = DbVerifyResult {
            enabled: true,
            verified_at: Some(Utc::now()),
            ..Default::default()
        };

        // 类目按 slug 读回 (候选段)
        for cand in &report.candidates.categories {
            let found = self.catalog.get_category_any(&cand.slug)?.is_some();
            self.record(&mut result, "category", &cand.slug, found);
        }

        for cand in &report.candidates.brands {
            let found = self.catalog.get_brand(&cand.slug)?.is_some();
            self.record(&mut result, "brand", &cand.slug, found);
        }

        for staged in &report.products_data {
            let found = self.catalog.get_product(&staged.slug)?.is_some();
            self.record(&mut result, "product", &staged.slug, found);
        }

        for staged in &report.variants_data {
            let found = self.catalog.get_variant(&staged.model_code)?.is_some();
            self.record(&mut result, "variant", &staged.model_code, found);
        }

        Ok(result)
    }

    fn record(&self, result: &mut DbVerifyResult, entity: &str, key: &str, found: bool) {
        if found {
            result
                .confirmed
                .entry(entity.to_string())
                .or_default()
                .push(key.to_string());
        } else {
            result.mismatches.push(format!("{}:{}", entity, key));
        }
        let entry = result.verified.entry(entity.to_string()).or_insert(true);
        *entry = *entry && found;
    }
}
