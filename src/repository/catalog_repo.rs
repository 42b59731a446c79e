// ==========================================
// 商品目录导入系统 - 目录实体仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 关键: ensure_* 依赖唯一约束 + 回读, 并发下收敛到同一行;
//       *_tx 关联函数在提交事务内复用同一套 SQL
// ==========================================

use crate::domain::catalog::{
    Brand, Category, Product, Series, StagedProduct, StagedVariant, Variant,
};
use crate::importer::hierarchy_resolver::CatalogLookup;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{format_ts, parse_ts};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogRepository - 目录仓储
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_category(row: &Row) -> RepositoryResult<Category> {
        Ok(Category {
            category_id: row.get("category_id")?,
            slug: row.get("slug")?,
            name: row.get("name")?,
            parent_id: row.get("parent_id")?,
            created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
            updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
        })
    }

    fn map_brand(row: &Row) -> RepositoryResult<Brand> {
        Ok(Brand {
            brand_id: row.get("brand_id")?,
            slug: row.get("slug")?,
            name: row.get("name")?,
            created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
            updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
        })
    }

    fn map_series(row: &Row) -> RepositoryResult<Series> {
        Ok(Series {
            series_id: row.get("series_id")?,
            slug: row.get("slug")?,
            name: row.get("name")?,
            category_id: row.get("category_id")?,
            created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
            updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
        })
    }

    fn map_product(row: &Row) -> RepositoryResult<Product> {
        let images_json: Option<String> = row.get("images_json")?;
        let spec_lines_json: Option<String> = row.get("spec_lines_json")?;
        Ok(Product {
            product_id: row.get("product_id")?,
            slug: row.get("slug")?,
            name: row.get("name")?,
            brand_slug: row.get("brand_slug")?,
            category_id: row.get("category_id")?,
            series_id: row.get("series_id")?,
            description: row.get("description")?,
            images: images_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default(),
            spec_lines: spec_lines_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default(),
            created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
            updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
        })
    }

    fn map_variant(row: &Row) -> RepositoryResult<Variant> {
        let attrs_json: Option<String> = row.get("attrs_json")?;
        let images_json: Option<String> = row.get("images_json")?;
        Ok(Variant {
            variant_id: row.get("variant_id")?,
            model_code: row.get("model_code")?,
            product_slug: row.get("product_slug")?,
            name: row.get("name")?,
            price: row.get("price")?,
            stock: row.get("stock")?,
            attrs: attrs_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default(),
            images: images_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default(),
            created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
            updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
        })
    }

    // ==========================================
    // 查询 (事务内关联函数)
    // ==========================================

    pub fn find_category_tx(
        conn: &Connection,
        parent_id: Option<i64>,
        slug: &str,
    ) -> RepositoryResult<Option<Category>> {
        conn.query_row(
            r#"
            SELECT category_id, slug, name, parent_id, created_at, updated_at
            FROM category
            WHERE COALESCE(parent_id, 0) = COALESCE(?1, 0) AND slug = ?2
            "#,
            params![parent_id, slug],
            |row| {
                Ok(Self::map_category(row))
            },
        )
        .optional()?
        .transpose()
    }

    /// 仅按 slug 查类目 (不限定父作用域, 取任意一个命中)
    ///
    /// 提交阶段系列/商品只携带类目 slug, 用于反查 category_id
    pub fn find_category_any_tx(
        conn: &Connection,
        slug: &str,
    ) -> RepositoryResult<Option<Category>> {
        conn.query_row(
            r#"
            SELECT category_id, slug, name, parent_id, created_at, updated_at
            FROM category WHERE slug = ?1
            ORDER BY category_id
            LIMIT 1
            "#,
            params![slug],
            |row| Ok(Self::map_category(row)),
        )
        .optional()?
        .transpose()
    }

    pub fn find_brand_tx(conn: &Connection, slug: &str) -> RepositoryResult<Option<Brand>> {
        conn.query_row(
            "SELECT brand_id, slug, name, created_at, updated_at FROM brand WHERE slug = ?1",
            params![slug],
            |row| Ok(Self::map_brand(row)),
        )
        .optional()?
        .transpose()
    }

    pub fn find_series_tx(
        conn: &Connection,
        category_id: Option<i64>,
        slug: &str,
    ) -> RepositoryResult<Option<Series>> {
        conn.query_row(
            r#"
            SELECT series_id, slug, name, category_id, created_at, updated_at
            FROM series
            WHERE COALESCE(category_id, 0) = COALESCE(?1, 0) AND slug = ?2
            "#,
            params![category_id, slug],
            |row| Ok(Self::map_series(row)),
        )
        .optional()?
        .transpose()
    }

    pub fn find_product_tx(conn: &Connection, slug: &str) -> RepositoryResult<Option<Product>> {
        conn.query_row(
            r#"
            SELECT product_id, slug, name, brand_slug, category_id, series_id,
                   description, images_json, spec_lines_json, created_at, updated_at
            FROM product WHERE slug = ?1
            "#,
            params![slug],
            |row| Ok(Self::map_product(row)),
        )
        .optional()?
        .transpose()
    }

    pub fn find_variant_tx(
        conn: &Connection,
        model_code: &str,
    ) -> RepositoryResult<Option<Variant>> {
        conn.query_row(
            r#"
            SELECT variant_id, model_code, product_slug, name, price, stock,
                   attrs_json, images_json, created_at, updated_at
            FROM variant WHERE model_code = ?1
            "#,
            params![model_code],
            |row| Ok(Self::map_variant(row)),
        )
        .optional()?
        .transpose()
    }

    // ==========================================
    // 写入 (事务内关联函数)
    // ==========================================
    // 约定: INSERT OR IGNORE + 回读; changes()>0 表示本次创建

    /// 确保类目存在 (同 (parent_id, slug) 并发创建收敛到同一行)
    pub fn ensure_category_tx(
        conn: &Connection,
        slug: &str,
        name: &str,
        parent_id: Option<i64>,
    ) -> RepositoryResult<(Category, bool)> {
        let now = format_ts(&Utc::now());
        conn.execute(
            r#"
            INSERT OR IGNORE INTO category (slug, name, parent_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![slug, name, parent_id, now],
        )?;
        let created = conn.changes() > 0;

        let category =
            Self::find_category_tx(conn, parent_id, slug)?.ok_or_else(|| {
                RepositoryError::NotFound {
                    entity: "Category".to_string(),
                    id: slug.to_string(),
                }
            })?;
        Ok((category, created))
    }

    /// 确保品牌存在
    pub fn ensure_brand_tx(
        conn: &Connection,
        slug: &str,
        name: &str,
    ) -> RepositoryResult<(Brand, bool)> {
        let now = format_ts(&Utc::now());
        conn.execute(
            r#"
            INSERT OR IGNORE INTO brand (slug, name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            "#,
            params![slug, name, now],
        )?;
        let created = conn.changes() > 0;

        let brand = Self::find_brand_tx(conn, slug)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Brand".to_string(),
            id: slug.to_string(),
        })?;
        Ok((brand, created))
    }

    /// 确保系列存在 (归属类目作用域)
    pub fn ensure_series_tx(
        conn: &Connection,
        slug: &str,
        name: &str,
        category_id: Option<i64>,
    ) -> RepositoryResult<(Series, bool)> {
        let now = format_ts(&Utc::now());
        conn.execute(
            r#"
            INSERT OR IGNORE INTO series (slug, name, category_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![slug, name, category_id, now],
        )?;
        let created = conn.changes() > 0;

        let series =
            Self::find_series_tx(conn, category_id, slug)?.ok_or_else(|| {
                RepositoryError::NotFound {
                    entity: "Series".to_string(),
                    id: slug.to_string(),
                }
            })?;
        Ok((series, created))
    }

    /// 商品 upsert: 不存在则创建, 存在则覆盖本次提供的字段
    ///
    /// # 返回
    /// - (product, true): 本次创建
    /// - (product, false): 更新既有商品
    pub fn upsert_product_tx(
        conn: &Connection,
        staged: &StagedProduct,
        category_id: Option<i64>,
        series_id: Option<i64>,
    ) -> RepositoryResult<(Product, bool)> {
        let now = format_ts(&Utc::now());
        let existing = Self::find_product_tx(conn, &staged.slug)?;

        match existing {
            None => {
                conn.execute(
                    r#"
                    INSERT INTO product (
                        slug, name, brand_slug, category_id, series_id,
                        description, images_json, spec_lines_json, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                    "#,
                    params![
                        staged.slug,
                        staged.name,
                        staged.brand_slug,
                        category_id,
                        series_id,
                        staged.description,
                        serde_json::to_string(&staged.images)?,
                        serde_json::to_string(&staged.spec_lines)?,
                        now,
                    ],
                )?;
                let product = Self::find_product_tx(conn, &staged.slug)?.ok_or_else(|| {
                    RepositoryError::NotFound {
                        entity: "Product".to_string(),
                        id: staged.slug.clone(),
                    }
                })?;
                Ok((product, true))
            }
            Some(old) => {
                // 本次未提供的字段保留旧值
                conn.execute(
                    r#"
                    UPDATE product
                    SET name = ?1,
                        brand_slug = COALESCE(?2, brand_slug),
                        category_id = COALESCE(?3, category_id),
                        series_id = COALESCE(?4, series_id),
                        description = COALESCE(?5, description),
                        images_json = ?6,
                        spec_lines_json = ?7,
                        updated_at = ?8
                    WHERE slug = ?9
                    "#,
                    params![
                        staged.name,
                        staged.brand_slug,
                        category_id,
                        series_id,
                        staged.description,
                        if staged.images.is_empty() {
                            serde_json::to_string(&old.images)?
                        } else {
                            serde_json::to_string(&staged.images)?
                        },
                        if staged.spec_lines.is_empty() {
                            serde_json::to_string(&old.spec_lines)?
                        } else {
                            serde_json::to_string(&staged.spec_lines)?
                        },
                        now,
                        staged.slug,
                    ],
                )?;
                let product = Self::find_product_tx(conn, &staged.slug)?.ok_or_else(|| {
                    RepositoryError::NotFound {
                        entity: "Product".to_string(),
                        id: staged.slug.clone(),
                    }
                })?;
                Ok((product, false))
            }
        }
    }

    /// 规格 upsert (以 model_code 为锚)
    pub fn upsert_variant_tx(
        conn: &Connection,
        staged: &StagedVariant,
    ) -> RepositoryResult<(Variant, bool)> {
        let now = format_ts(&Utc::now());
        let existing = Self::find_variant_tx(conn, &staged.model_code)?;

        match existing {
            None => {
                conn.execute(
                    r#"
                    INSERT INTO variant (
                        model_code, product_slug, name, price, stock,
                        attrs_json, images_json, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                    "#,
                    params![
                        staged.model_code,
                        staged.product_slug,
                        staged.name,
                        staged.price,
                        staged.stock,
                        serde_json::to_string(&staged.attrs)?,
                        serde_json::to_string(&staged.images)?,
                        now,
                    ],
                )?;
                let variant =
                    Self::find_variant_tx(conn, &staged.model_code)?.ok_or_else(|| {
                        RepositoryError::NotFound {
                            entity: "Variant".to_string(),
                            id: staged.model_code.clone(),
                        }
                    })?;
                Ok((variant, true))
            }
            Some(old) => {
                conn.execute(
                    r#"
                    UPDATE variant
                    SET product_slug = ?1,
                        name = COALESCE(?2, name),
                        price = COALESCE(?3, price),
                        stock = COALESCE(?4, stock),
                        attrs_json = ?5,
                        images_json = ?6,
                        updated_at = ?7
                    WHERE model_code = ?8
                    "#,
                    params![
                        staged.product_slug,
                        staged.name,
                        staged.price,
                        staged.stock,
                        if staged.attrs.is_empty() {
                            serde_json::to_string(&old.attrs)?
                        } else {
                            serde_json::to_string(&staged.attrs)?
                        },
                        if staged.images.is_empty() {
                            serde_json::to_string(&old.images)?
                        } else {
                            serde_json::to_string(&staged.images)?
                        },
                        now,
                        staged.model_code,
                    ],
                )?;
                let variant =
                    Self::find_variant_tx(conn, &staged.model_code)?.ok_or_else(|| {
                        RepositoryError::NotFound {
                            entity: "Variant".to_string(),
                            id: staged.model_code.clone(),
                        }
                    })?;
                Ok((variant, false))
            }
        }
    }

    // ==========================================
    // 实例查询 (校验期 / 读回验证)
    // ==========================================

    pub fn get_category(
        &self,
        parent_id: Option<i64>,
        slug: &str,
    ) -> RepositoryResult<Option<Category>> {
        let conn = self.get_conn()?;
        Self::find_category_tx(&conn, parent_id, slug)
    }

    pub fn get_category_any(&self, slug: &str) -> RepositoryResult<Option<Category>> {
        let conn = self.get_conn()?;
        Self::find_category_any_tx(&conn, slug)
    }

    pub fn get_brand(&self, slug: &str) -> RepositoryResult<Option<Brand>> {
        let conn = self.get_conn()?;
        Self::find_brand_tx(&conn, slug)
    }

    pub fn get_series(
        &self,
        category_id: Option<i64>,
        slug: &str,
    ) -> RepositoryResult<Option<Series>> {
        let conn = self.get_conn()?;
        Self::find_series_tx(&conn, category_id, slug)
    }

    pub fn get_product(&self, slug: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        Self::find_product_tx(&conn, slug)
    }

    pub fn get_variant(&self, model_code: &str) -> RepositoryResult<Option<Variant>> {
        let conn = self.get_conn()?;
        Self::find_variant_tx(&conn, model_code)
    }
}

// 校验流水线的只读查询接口
impl CatalogLookup for CatalogRepository {
    fn find_category(
        &self,
        parent_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Category>, Box<dyn Error>> {
        Ok(self.get_category(parent_id, slug)?)
    }

    fn find_brand(&self, slug: &str) -> Result<Option<Brand>, Box<dyn Error>> {
        Ok(self.get_brand(slug)?)
    }

    fn find_series(
        &self,
        category_id: Option<i64>,
        slug: &str,
    ) -> Result<Option<Series>, Box<dyn Error>> {
        Ok(self.get_series(category_id, slug)?)
    }

    fn find_product(&self, slug: &str) -> Result<Option<Product>, Box<dyn Error>> {
        Ok(self.get_product(slug)?)
    }

    fn variant_exists(&self, model_code: &str) -> Result<bool, Box<dyn Error>> {
        Ok(self.get_variant(model_code)?.is_some())
    }
}
