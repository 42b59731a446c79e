// ==========================================
// 商品目录导入系统 - 审计日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 约束: 仅追加与按龄删除, 不提供 UPDATE
// ==========================================

use crate::domain::audit_log::{AuditAction, AuditLog, AuditLogQuery};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{format_ts, parse_ts};
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// AuditLogRepository - 审计日志仓储
// ==========================================
pub struct AuditLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> RepositoryResult<AuditLog> {
        let action_raw: String = row.get("action")?;
        let before_json: Option<String> = row.get("before_json")?;
        let after_json: Option<String> = row.get("after_json")?;
        let metadata_json: Option<String> = row.get("metadata_json")?;

        Ok(AuditLog {
            audit_id: row.get("audit_id")?,
            actor: row.get("actor")?,
            action: AuditAction::from_str(&action_raw).ok_or_else(|| {
                RepositoryError::ValidationError(format!("未知审计动作: {}", action_raw))
            })?,
            entity_type: row.get("entity_type")?,
            entity_id: row.get("entity_id")?,
            entity_label: row.get("entity_label")?,
            before_json: before_json.as_deref().map(serde_json::from_str).transpose()?,
            after_json: after_json.as_deref().map(serde_json::from_str).transpose()?,
            metadata_json: metadata_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            ip_address: row.get("ip_address")?,
            user_agent: row.get("user_agent")?,
            created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 事务内追加单条审计记录 (提交器逐变更调用)
    pub fn insert_tx(conn: &Connection, log: &AuditLog) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO audit_log (
                audit_id, actor, action, entity_type, entity_id, entity_label,
                before_json, after_json, metadata_json,
                ip_address, user_agent, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                log.audit_id,
                log.actor,
                log.action.as_str(),
                log.entity_type,
                log.entity_id,
                log.entity_label,
                log.before_json.as_ref().map(|v| v.to_string()),
                log.after_json.as_ref().map(|v| v.to_string()),
                log.metadata_json.as_ref().map(|v| v.to_string()),
                log.ip_address,
                log.user_agent,
                format_ts(&log.created_at),
            ],
        )?;
        Ok(log.audit_id.clone())
    }

    /// 追加单条审计记录
    pub fn insert(&self, log: &AuditLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, log)
    }

    /// 按龄清理: 删除早于 cutoff 的记录
    ///
    /// # 返回
    /// - Ok(rows): 被删除的行数
    pub fn cleanup_older_than(&self, older_than_days: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let cutoff = Utc::now() - Duration::days(older_than_days);
        let rows = conn.execute(
            "DELETE FROM audit_log WHERE created_at < ?1",
            params![format_ts(&cutoff)],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 ID 查询
    pub fn get(&self, audit_id: &str) -> RepositoryResult<AuditLog> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT audit_id, actor, action, entity_type, entity_id, entity_label,
                   before_json, after_json, metadata_json,
                   ip_address, user_agent, created_at
            FROM audit_log WHERE audit_id = ?1
            "#,
        )?;
        let mut rows = stmt.query(params![audit_id])?;
        match rows.next()? {
            Some(row) => Self::map_row(row),
            None => Err(RepositoryError::NotFound {
                entity: "AuditLog".to_string(),
                id: audit_id.to_string(),
            }),
        }
    }

    /// 过滤查询 (按时间倒序分页)
    pub fn list(&self, query: &AuditLogQuery) -> RepositoryResult<Vec<AuditLog>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            r#"
            SELECT audit_id, actor, action, entity_type, entity_id, entity_label,
                   before_json, after_json, metadata_json,
                   ip_address, user_agent, created_at
            FROM audit_log WHERE 1=1
            "#,
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(entity_type) = &query.entity_type {
            sql.push_str(" AND entity_type = ?");
            args.push(Box::new(entity_type.clone()));
        }
        if let Some(entity_id) = &query.entity_id {
            sql.push_str(" AND entity_id = ?");
            args.push(Box::new(entity_id.clone()));
        }
        if let Some(action) = &query.action {
            sql.push_str(" AND action = ?");
            args.push(Box::new(action.as_str().to_string()));
        }
        if let Some(actor) = &query.actor {
            sql.push_str(" AND actor = ?");
            args.push(Box::new(actor.clone()));
        }
        sql.push_str(" ORDER BY created_at DESC, audit_id DESC LIMIT ? OFFSET ?");
        args.push(Box::new(query.limit));
        args.push(Box::new(query.offset));

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())))?;

        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(Self::map_row(row)?);
        }
        Ok(logs)
    }
}
