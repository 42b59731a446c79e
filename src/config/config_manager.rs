// ==========================================
// 商品目录导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载与查询
// 存储: config_kv 表 (key-value, scope_id='global')
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    /// 幂等去重时间窗（小时）
    pub const JOB_DEDUP_WINDOW_HOURS: &str = "import/job_dedup_window_hours";
    /// 报告问题条数上限
    pub const MAX_REPORT_ISSUES: &str = "import/max_report_issues";
    /// 审计日志保留天数
    pub const AUDIT_RETENTION_DAYS: &str = "audit/retention_days";
    /// 价格上限
    pub const PRICE_MAX: &str = "import/price_max";
    /// 提交后读回验证开关
    pub const DB_VERIFY_ENABLED: &str = "import/db_verify_enabled";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入配置值（scope_id='global', 测试与初始化用）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
            ON CONFLICT (scope_id, key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_job_dedup_window_hours(&self) -> Result<i64, Box<dyn Error>> {
        match self.get_config_value(config_keys::JOB_DEDUP_WINDOW_HOURS)? {
            Some(v) => Ok(v.parse()?),
            None => Ok(24),
        }
    }

    async fn get_max_report_issues(&self) -> Result<usize, Box<dyn Error>> {
        match self.get_config_value(config_keys::MAX_REPORT_ISSUES)? {
            Some(v) => Ok(v.parse()?),
            None => Ok(500),
        }
    }

    async fn get_audit_retention_days(&self) -> Result<i64, Box<dyn Error>> {
        match self.get_config_value(config_keys::AUDIT_RETENTION_DAYS)? {
            Some(v) => Ok(v.parse()?),
            None => Ok(90),
        }
    }

    async fn get_price_max(&self) -> Result<Option<f64>, Box<dyn Error>> {
        match self.get_config_value(config_keys::PRICE_MAX)? {
            Some(v) => Ok(Some(v.parse()?)),
            None => Ok(None),
        }
    }

    async fn get_db_verify_enabled(&self) -> Result<bool, Box<dyn Error>> {
        match self.get_config_value(config_keys::DB_VERIFY_ENABLED)? {
            Some(v) => Ok(v == "1" || v.eq_ignore_ascii_case("true")),
            None => Ok(true),
        }
    }
}
