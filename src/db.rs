// ==========================================
// 商品目录导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema（幂等, CREATE IF NOT EXISTS）
///
/// 表清单:
/// - import_job: 导入任务 (报告/结果以 JSON 列内嵌)
/// - category / brand / series / product / variant: 目录实体
/// - audit_log: 审计日志 (append-only)
/// - config_kv: 配置键值
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS import_job (
            job_id              TEXT PRIMARY KEY,
            kind                TEXT NOT NULL,
            status              TEXT NOT NULL,
            mode                TEXT NOT NULL,
            created_by          TEXT NOT NULL,
            file_name           TEXT,
            file_path           TEXT,
            file_hash           TEXT NOT NULL,
            is_preview          INTEGER NOT NULL DEFAULT 0,
            allow_partial       INTEGER NOT NULL DEFAULT 0,
            report_json         TEXT,
            total_rows          INTEGER NOT NULL DEFAULT 0,
            created_count       INTEGER NOT NULL DEFAULT 0,
            updated_count       INTEGER NOT NULL DEFAULT 0,
            skipped_count       INTEGER NOT NULL DEFAULT 0,
            error_count         INTEGER NOT NULL DEFAULT 0,
            warning_count       INTEGER NOT NULL DEFAULT 0,
            commit_result_json  TEXT,
            fail_reason         TEXT,
            started_at          TEXT,
            completed_at        TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_import_job_dedup
            ON import_job (file_hash, kind, mode, created_at);
        CREATE INDEX IF NOT EXISTS idx_import_job_status
            ON import_job (status, created_at);

        CREATE TABLE IF NOT EXISTS category (
            category_id  INTEGER PRIMARY KEY AUTOINCREMENT,
            slug         TEXT NOT NULL,
            name         TEXT NOT NULL,
            parent_id    INTEGER REFERENCES category(category_id),
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        -- parent_id 为 NULL 的根类目也要保证 slug 唯一
        CREATE UNIQUE INDEX IF NOT EXISTS idx_category_parent_slug
            ON category (COALESCE(parent_id, 0), slug);

        CREATE TABLE IF NOT EXISTS brand (
            brand_id    INTEGER PRIMARY KEY AUTOINCREMENT,
            slug        TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS series (
            series_id    INTEGER PRIMARY KEY AUTOINCREMENT,
            slug         TEXT NOT NULL,
            name         TEXT NOT NULL,
            category_id  INTEGER REFERENCES category(category_id),
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_series_category_slug
            ON series (COALESCE(category_id, 0), slug);

        CREATE TABLE IF NOT EXISTS product (
            product_id       INTEGER PRIMARY KEY AUTOINCREMENT,
            slug             TEXT NOT NULL UNIQUE,
            name             TEXT NOT NULL,
            brand_slug       TEXT,
            category_id      INTEGER REFERENCES category(category_id),
            series_id        INTEGER REFERENCES series(series_id),
            description      TEXT,
            images_json      TEXT,
            spec_lines_json  TEXT,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS variant (
            variant_id    INTEGER PRIMARY KEY AUTOINCREMENT,
            model_code    TEXT NOT NULL UNIQUE,
            product_slug  TEXT NOT NULL,
            name          TEXT,
            price         REAL,
            stock         INTEGER,
            attrs_json    TEXT,
            images_json   TEXT,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_variant_product
            ON variant (product_slug);

        CREATE TABLE IF NOT EXISTS audit_log (
            audit_id       TEXT PRIMARY KEY,
            actor          TEXT NOT NULL,
            action         TEXT NOT NULL,
            entity_type    TEXT NOT NULL,
            entity_id      TEXT NOT NULL,
            entity_label   TEXT,
            before_json    TEXT,
            after_json     TEXT,
            metadata_json  TEXT,
            ip_address     TEXT,
            user_agent     TEXT,
            created_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_entity
            ON audit_log (entity_type, entity_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_audit_created
            ON audit_log (created_at);

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id  TEXT NOT NULL,
            key       TEXT NOT NULL,
            value     TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;
    Ok(())
}
