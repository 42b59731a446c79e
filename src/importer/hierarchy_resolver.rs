// ==========================================
// 商品目录导入系统 - 层级解析器
// ==========================================
// 职责: 将 `/` 分隔的类目路径逐段解析到既有目录实体,
//       或标记为创建候选
// 约束: 每段解析是显式带标签的结果 (found/candidate/missing),
//       不做隐式 get-or-create 持久化
// ==========================================

use crate::domain::catalog::{Brand, Category, Product, Series};
use std::error::Error;

// ==========================================
// CatalogLookup Trait
// ==========================================
// 用途: 解析期的目录只读查询接口
// 实现者: CatalogRepository (rusqlite); 测试中用内存实现
pub trait CatalogLookup: Send + Sync {
    /// 在指定父类目作用域内按 slug 查类目
    fn find_category(
        &self,
        parent_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Category>, Box<dyn Error>>;

    /// 按 slug 查品牌
    fn find_brand(&self, slug: &str) -> Result<Option<Brand>, Box<dyn Error>>;

    /// 在指定类目作用域内按 slug 查系列
    fn find_series(
        &self,
        category_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Series>, Box<dyn Error>>;

    /// 按 slug 查商品
    fn find_product(&self, slug: &str) -> Result<Option<Product>, Box<dyn Error>>;

    /// 型号是否已存在于目录
    fn variant_exists(&self, model_code: &str) -> Result<bool, Box<dyn Error>>;
}

// ==========================================
// slug 标准化
// ==========================================

/// 标准化 slug: trim + 小写, 空白/下划线 → '-',
/// 丢弃其余标点, 折叠连续 '-'
pub fn normalize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_dash = true; // 抑制前导 '-'

    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            if !last_dash {
                slug.push('-');
                last_dash = true;
            }
        } else if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
            last_dash = false;
        }
        // 其余标点丢弃
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

// ==========================================
// SegmentResolution - 单段解析结果
// ==========================================
#[derive(Debug, Clone)]
pub enum SegmentResolution {
    /// 命中既有类目, 继续下钻
    Found(Category),
    /// 未命中且允许创建: 成为创建候选
    Candidate {
        slug: String,
        name: String,
        parent_slug: Option<String>,
    },
    /// 未命中且不允许创建: error 级问题 (missing_category)
    Missing { slug: String, name: String },
}

// ==========================================
// ParentScope - 当前父作用域
// ==========================================
// Pending: 父段本身是候选 (尚不存在), 子段无从查库
#[derive(Debug, Clone)]
pub enum ParentScope {
    Root,
    Existing(Category),
    Pending { slug: String },
}

// ==========================================
// PathResolution - 整条路径的解析结果
// ==========================================
#[derive(Debug, Clone)]
pub struct PathResolution {
    pub segments: Vec<SegmentResolution>,
    /// 全部段命中时的最深类目 id
    pub terminal_category_id: Option<i64>,
    /// 最深段的标准化 slug (found 或 candidate)
    pub terminal_slug: Option<String>,
    /// 第一个 missing 段的标准化 slug (allow_create=false 时)
    pub missing_slug: Option<String>,
}

// ==========================================
// HierarchyResolver
// ==========================================
pub struct HierarchyResolver {
    allow_create_missing: bool,
}

impl HierarchyResolver {
    pub fn new(allow_create_missing: bool) -> Self {
        Self {
            allow_create_missing,
        }
    }

    /// 解析单段: 在父作用域内按标准化 slug 查找
    ///
    /// # 返回
    /// - Found(category): 命中
    /// - Candidate: 未命中且 allow_create_missing=true
    /// - Missing: 未命中且 allow_create_missing=false
    pub fn resolve_segment(
        &self,
        lookup: &dyn CatalogLookup,
        parent: &ParentScope,
        raw_segment: &str,
    ) -> Result<SegmentResolution, Box<dyn Error>> {
        let name = raw_segment.trim().to_string();
        let slug = normalize_slug(raw_segment);

        let (parent_id, parent_slug, parent_pending) = match parent {
            ParentScope::Root => (None, None, false),
            ParentScope::Existing(cat) => (Some(cat.category_id), Some(cat.slug.clone()), false),
            ParentScope::Pending { slug } => (None, Some(slug.clone()), true),
        };

        // 父段尚不存在时子段必然不存在, 不再查库
        if !parent_pending {
            if let Some(category) = lookup.find_category(parent_id, &slug)? {
                return Ok(SegmentResolution::Found(category));
            }
        }

        if self.allow_create_missing {
            Ok(SegmentResolution::Candidate {
                slug,
                name,
                parent_slug,
            })
        } else {
            Ok(SegmentResolution::Missing { slug, name })
        }
    }

    /// 从左到右解析整条 `/` 分隔路径
    ///
    /// 遇到 Missing 即停止下钻 (后续段无意义);
    /// 遇到 Candidate 则后续段继续以 Pending 作用域产生候选。
    pub fn resolve_path(
        &self,
        lookup: &dyn CatalogLookup,
        path: &str,
    ) -> Result<PathResolution, Box<dyn Error>> {
        let mut segments = Vec::new();
        let mut scope = ParentScope::Root;
        let mut terminal_category_id = None;
        let mut terminal_slug = None;
        let mut missing_slug = None;

        for raw_segment in path.split('/') {
            if raw_segment.trim().is_empty() {
                continue;
            }

            let resolution = self.resolve_segment(lookup, &scope, raw_segment)?;
            match &resolution {
                SegmentResolution::Found(category) => {
                    terminal_category_id = Some(category.category_id);
                    terminal_slug = Some(category.slug.clone());
                    scope = ParentScope::Existing(category.clone());
                }
                SegmentResolution::Candidate { slug, .. } => {
                    terminal_category_id = None;
                    terminal_slug = Some(slug.clone());
                    scope = ParentScope::Pending { slug: slug.clone() };
                }
                SegmentResolution::Missing { slug, .. } => {
                    missing_slug = Some(slug.clone());
                    segments.push(resolution);
                    break;
                }
            }
            segments.push(resolution);
        }

        Ok(PathResolution {
            segments,
            terminal_category_id,
            terminal_slug,
            missing_slug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    // 内存目录: (parent_id, slug) → Category
    #[derive(Default)]
    struct MemoryCatalog {
        categories: HashMap<(Option<i64>, String), Category>,
    }

    impl MemoryCatalog {
        fn with_category(mut self, id: i64, parent_id: Option<i64>, slug: &str) -> Self {
            self.categories.insert(
                (parent_id, slug.to_string()),
                Category {
                    category_id: id,
                    slug: slug.to_string(),
                    name: slug.to_string(),
                    parent_id,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
            );
            self
        }
    }

    impl CatalogLookup for MemoryCatalog {
        fn find_category(
            &self,
            parent_id: Option<i64>,
            slug: &str,
        ) -> Result<Option<Category>, Box<dyn Error>> {
            Ok(self.categories.get(&(parent_id, slug.to_string())).cloned())
        }

        fn find_brand(&self, _slug: &str) -> Result<Option<Brand>, Box<dyn Error>> {
            Ok(None)
        }

        fn find_series(
            &self,
            _category_id: Option<i64>,
            _slug: &str,
        ) -> Result<Option<Series>, Box<dyn Error>> {
            Ok(None)
        }

        fn find_product(&self, _slug: &str) -> Result<Option<Product>, Box<dyn Error>> {
            Ok(None)
        }

        fn variant_exists(&self, _model_code: &str) -> Result<bool, Box<dyn Error>> {
            Ok(false)
        }
    }

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("  Smart Home  "), "smart-home");
        assert_eq!(normalize_slug("Audio_&_Video"), "audio-video");
        assert_eq!(normalize_slug("--a--b--"), "a-b");
        assert_eq!(normalize_slug("电子产品"), "电子产品");
    }

    #[test]
    fn test_resolve_path_all_found() {
        let catalog = MemoryCatalog::default()
            .with_category(1, None, "electronics")
            .with_category(2, Some(1), "smart-home");
        let resolver = HierarchyResolver::new(false);

        let result = resolver
            .resolve_path(&catalog, "Electronics/Smart Home")
            .unwrap();

        assert_eq!(result.terminal_category_id, Some(2));
        assert!(result.missing_slug.is_none());
        assert_eq!(result.segments.len(), 2);
        assert!(matches!(result.segments[1], SegmentResolution::Found(_)));
    }

    #[test]
    fn test_resolve_path_candidate_chain() {
        // 仅根段存在, 后两段都应成为候选, 且父子关系正确
        let catalog = MemoryCatalog::default().with_category(1, None, "electronics");
        let resolver = HierarchyResolver::new(true);

        let result = resolver
            .resolve_path(&catalog, "Electronics/Smart Home/Speakers")
            .unwrap();

        assert!(result.terminal_category_id.is_none());
        assert_eq!(result.terminal_slug.as_deref(), Some("speakers"));
        match &result.segments[1] {
            SegmentResolution::Candidate {
                slug, parent_slug, ..
            } => {
                assert_eq!(slug, "smart-home");
                assert_eq!(parent_slug.as_deref(), Some("electronics"));
            }
            other => panic!("期望 Candidate, 实际 {:?}", other),
        }
        match &result.segments[2] {
            SegmentResolution::Candidate { parent_slug, .. } => {
                assert_eq!(parent_slug.as_deref(), Some("smart-home"));
            }
            other => panic!("期望 Candidate, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_resolve_path_missing_stops_walk() {
        let catalog = MemoryCatalog::default().with_category(1, None, "electronics");
        let resolver = HierarchyResolver::new(false);

        let result = resolver
            .resolve_path(&catalog, "Electronics/Smart Home/Speakers")
            .unwrap();

        assert_eq!(result.missing_slug.as_deref(), Some("smart-home"));
        // Missing 后停止下钻
        assert_eq!(result.segments.len(), 2);
    }

    #[test]
    fn test_scope_restricts_lookup_to_parent() {
        // "smart-home" 存在但挂在别的父类目下, 根作用域不得命中
        let catalog = MemoryCatalog::default()
            .with_category(1, None, "electronics")
            .with_category(2, Some(1), "smart-home");
        let resolver = HierarchyResolver::new(false);

        let result = resolver.resolve_path(&catalog, "Smart Home").unwrap();

        assert_eq!(result.missing_slug.as_deref(), Some("smart-home"));
    }
}
