// ==========================================
// 审计日志集成测试
// ==========================================
// 目标: 查询过滤 / 按龄清理 / 清理自身留痕
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use catalog_import::api::{ApiError, AuditApi};
use catalog_import::domain::audit_log::{AuditAction, AuditLog, AuditLogQuery};
use catalog_import::domain::types::EntityType;
use catalog_import::repository::AuditLogRepository;
use chrono::{Duration, Utc};
use test_helpers::{create_test_db, open_shared};

/// 写入一条指定龄期的审计记录
fn seed_log(repo: &AuditLogRepository, actor: &str, entity: EntityType, age_days: i64) {
    let mut log = AuditLog::new(
        actor.to_string(),
        AuditAction::Create,
        entity,
        format!("entity-{}", uuid::Uuid::new_v4()),
    );
    log.created_at = Utc::now() - Duration::days(age_days);
    repo.insert(&log).unwrap();
}

#[tokio::test]
async fn test_cleanup_deletes_only_aged_records() {
    let (_db, db_path) = create_test_db().unwrap();
    let repo = AuditLogRepository::new(open_shared(&db_path).unwrap());

    // 3 条过期 (100 天前) + 2 条新鲜
    for _ in 0..3 {
        seed_log(&repo, "importer", EntityType::Product, 100);
    }
    for _ in 0..2 {
        seed_log(&repo, "importer", EntityType::Product, 1);
    }

    let audit = AuditApi::new(db_path);
    let result = audit.cleanup(Some(90), "admin").await.unwrap();
    assert_eq!(result.deleted_count, 3);
    assert_eq!(result.older_than_days, 90);
    assert_eq!(
        result.cutoff_date,
        (Utc::now() - Duration::days(90)).date_naive()
    );

    // 剩余: 2 条新鲜 + 1 条清理动作自身的留痕
    let logs = audit.list(&AuditLogQuery::new()).await.unwrap();
    assert_eq!(logs.len(), 3);

    let mut cleanup_query = AuditLogQuery::new();
    cleanup_query.action = Some(AuditAction::Cleanup);
    let cleanup_logs = audit.list(&cleanup_query).await.unwrap();
    assert_eq!(cleanup_logs.len(), 1);
    assert_eq!(cleanup_logs[0].actor, "admin");
    assert_eq!(
        cleanup_logs[0].after_json.as_ref().unwrap()["deleted_count"],
        3
    );
}

#[tokio::test]
async fn test_cleanup_uses_configured_retention_when_days_omitted() {
    let (_db, db_path) = create_test_db().unwrap();
    let repo = AuditLogRepository::new(open_shared(&db_path).unwrap());
    seed_log(&repo, "importer", EntityType::Brand, 100);
    seed_log(&repo, "importer", EntityType::Brand, 10);

    // 未配置时默认保留 90 天
    let audit = AuditApi::new(db_path);
    let result = audit.cleanup(None, "admin").await.unwrap();
    assert_eq!(result.older_than_days, 90);
    assert_eq!(result.deleted_count, 1);
}

#[tokio::test]
async fn test_cleanup_rejects_non_positive_days() {
    let (_db, db_path) = create_test_db().unwrap();
    let audit = AuditApi::new(db_path);
    assert!(matches!(
        audit.cleanup(Some(0), "admin").await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        audit.cleanup(Some(-5), "admin").await,
        Err(ApiError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_list_filters_by_entity_and_actor() {
    let (_db, db_path) = create_test_db().unwrap();
    let repo = AuditLogRepository::new(open_shared(&db_path).unwrap());
    seed_log(&repo, "alice", EntityType::Product, 1);
    seed_log(&repo, "alice", EntityType::Variant, 1);
    seed_log(&repo, "bob", EntityType::Variant, 1);

    let audit = AuditApi::new(db_path);

    let mut by_entity = AuditLogQuery::new();
    by_entity.entity_type = Some("variant".to_string());
    assert_eq!(audit.list(&by_entity).await.unwrap().len(), 2);

    let mut by_actor = AuditLogQuery::new();
    by_actor.actor = Some("alice".to_string());
    assert_eq!(audit.list(&by_actor).await.unwrap().len(), 2);

    let mut combined = AuditLogQuery::new();
    combined.entity_type = Some("variant".to_string());
    combined.actor = Some("bob".to_string());
    let logs = audit.list(&combined).await.unwrap();
    assert_eq!(logs.len(), 1);

    // 单条查询
    let fetched = audit.get(&logs[0].audit_id).await.unwrap();
    assert_eq!(fetched.actor, "bob");
}
