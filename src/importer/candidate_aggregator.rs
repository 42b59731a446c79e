// ==========================================
// 商品目录导入系统 - 候选聚合器
// ==========================================
// 职责: 跨行去重同一待创建实体, 聚合来源行号
// 约束: 以标准化 slug 为聚合键; 类目/系列按父作用域区分同名
// ==========================================

use crate::domain::import_job::{Candidate, CandidateSet};
use std::collections::BTreeMap;

// ==========================================
// CandidateAggregator
// ==========================================
// 四桶分别聚合; BTreeMap 保证输出顺序稳定
#[derive(Default)]
pub struct CandidateAggregator {
    categories: BTreeMap<String, Candidate>,
    series: BTreeMap<String, Candidate>,
    brands: BTreeMap<String, Candidate>,
    products: BTreeMap<String, Candidate>,
}

impl CandidateAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 类目候选 (同 slug 不同父类目视为不同候选)
    pub fn add_category(
        &mut self,
        slug: &str,
        name: &str,
        parent_slug: Option<&str>,
        row: usize,
    ) {
        let key = format!("{}/{}", parent_slug.unwrap_or(""), slug);
        push_row(
            self.categories
                .entry(key)
                .or_insert_with(|| Candidate {
                    slug: slug.to_string(),
                    name: name.to_string(),
                    category_slug: parent_slug.map(|s| s.to_string()),
                    rows: Vec::new(),
                }),
            row,
        );
    }

    /// 系列候选 (按归属类目区分)
    pub fn add_series(
        &mut self,
        slug: &str,
        name: &str,
        category_slug: Option<&str>,
        row: usize,
    ) {
        let key = format!("{}/{}", category_slug.unwrap_or(""), slug);
        push_row(
            self.series
                .entry(key)
                .or_insert_with(|| Candidate {
                    slug: slug.to_string(),
                    name: name.to_string(),
                    category_slug: category_slug.map(|s| s.to_string()),
                    rows: Vec::new(),
                }),
            row,
        );
    }

    /// 品牌候选 (slug 全局唯一)
    pub fn add_brand(&mut self, slug: &str, name: &str, row: usize) {
        push_row(
            self.brands
                .entry(slug.to_string())
                .or_insert_with(|| Candidate {
                    slug: slug.to_string(),
                    name: name.to_string(),
                    category_slug: None,
                    rows: Vec::new(),
                }),
            row,
        );
    }

    /// 商品候选 (slug 全局唯一)
    pub fn add_product(
        &mut self,
        slug: &str,
        name: &str,
        category_slug: Option<&str>,
        row: usize,
    ) {
        push_row(
            self.products
                .entry(slug.to_string())
                .or_insert_with(|| Candidate {
                    slug: slug.to_string(),
                    name: name.to_string(),
                    category_slug: category_slug.map(|s| s.to_string()),
                    rows: Vec::new(),
                }),
            row,
        );
    }

    /// 汇总为报告中的候选集合
    pub fn build(self) -> CandidateSet {
        CandidateSet {
            categories: self.categories.into_values().collect(),
            series: self.series.into_values().collect(),
            brands: self.brands.into_values().collect(),
            products: self.products.into_values().collect(),
        }
    }
}

fn push_row(candidate: &mut Candidate, row: usize) {
    if !candidate.rows.contains(&row) {
        candidate.rows.push(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_rows_accumulate_across_rows() {
        let mut agg = CandidateAggregator::new();
        agg.add_brand("yunchuan", "云川", 2);
        agg.add_brand("yunchuan", "云川", 5);
        agg.add_brand("yunchuan", "云川", 5); // 同行重复不累积

        let set = agg.build();
        assert_eq!(set.brands.len(), 1);
        assert_eq!(set.brands[0].rows, vec![2, 5]);
    }

    #[test]
    fn test_category_same_slug_different_parent_kept_separate() {
        let mut agg = CandidateAggregator::new();
        agg.add_category("accessories", "配件", Some("audio"), 2);
        agg.add_category("accessories", "配件", Some("video"), 3);

        let set = agg.build();
        assert_eq!(set.categories.len(), 2);
    }

    #[test]
    fn test_first_seen_name_wins() {
        let mut agg = CandidateAggregator::new();
        agg.add_product("yunchuan-x1", "云川 X1", Some("speakers"), 2);
        agg.add_product("yunchuan-x1", "云川X1 (旧名)", Some("speakers"), 7);

        let set = agg.build();
        assert_eq!(set.products.len(), 1);
        assert_eq!(set.products[0].name, "云川 X1");
        assert_eq!(set.products[0].rows, vec![2, 7]);
    }

    #[test]
    fn test_empty_aggregator_builds_empty_set() {
        let set = CandidateAggregator::new().build();
        assert!(set.is_empty());
    }
}
