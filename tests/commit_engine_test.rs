// ==========================================
// 提交引擎集成测试
// ==========================================
// 目标: 落库顺序 / 幂等收敛 / 部分提交 / 整单回滚 / 读回验证
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use catalog_import::api::{ApiError, CommitRequest, ImportApi, ValidateOutcome, ValidateRequest};
use catalog_import::config::config_manager::{config_keys, ConfigManager};
use catalog_import::domain::catalog::StagedVariant;
use catalog_import::domain::import_job::{
    CandidateSet, ErrorRow, ImportJob, ImportReport, NormalizationLog, ReportCounts, ReportStatus,
    ValidRow,
};
use catalog_import::domain::AuditLogQuery;
use catalog_import::domain::types::{ImportKind, ImportMode, JobStatus, RowType};
use catalog_import::engine::{CommitEngine, CommitOptions};
use catalog_import::importer::ImportError;
use catalog_import::repository::{AuditLogRepository, CatalogRepository, ImportJobRepository};
use test_helpers::{create_test_db, open_shared, write_csv_fixture};

fn smart_request(file_path: &str) -> ValidateRequest {
    ValidateRequest {
        file_path: file_path.to_string(),
        kind: ImportKind::CatalogImport,
        mode: ImportMode::Smart,
        created_by: "tester".to_string(),
        is_preview: false,
        allow_partial: false,
        treat_slash_as_hierarchy: true,
        allow_create_missing_categories: true,
    }
}

/// 手工构造仅含一条幽灵规格的报告 (规格引用不存在的商品)
fn ghost_variant_report() -> ImportReport {
    let staged = StagedVariant {
        model_code: "YX-GHOST-1".to_string(),
        product_slug: "ghost-product".to_string(),
        name: None,
        price: Some(99.0),
        stock: None,
        attrs: Default::default(),
        images: vec![],
        is_update: false,
    };
    let valid_row = ValidRow {
        row_num: 2,
        row_type: RowType::Variant,
        data: serde_json::to_value(&staged).unwrap(),
    };
    ImportReport {
        status: ReportStatus::Valid,
        issues: vec![],
        candidates: CandidateSet::default(),
        normalization: NormalizationLog::default(),
        counts: ReportCounts::default(),
        products_data: vec![],
        variants_data: vec![staged],
        categories_data: vec![],
        valid_rows: vec![valid_row],
        error_rows: vec![],
    }
}

/// 插入一个已挂报告的 pending 任务
fn seed_job_with_report(
    db_path: &str,
    report: &ImportReport,
    allow_partial: bool,
) -> String {
    let conn = open_shared(db_path).unwrap();
    let repo = ImportJobRepository::new(conn);
    let mut job = ImportJob::new(
        ImportKind::VariantsCsv,
        ImportMode::Smart,
        "tester".to_string(),
        format!("hash-{}", uuid::Uuid::new_v4()),
    );
    job.allow_partial = allow_partial;
    repo.insert(&job).unwrap();
    repo.attach_report(&job.job_id, report, 1).unwrap();
    job.job_id
}

#[tokio::test]
async fn test_duplicate_model_codes_commit_as_distinct_variants() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code\n云川 X1,YX-DUP-1\n云川 X2,YX-DUP-1\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path.clone());
    let job = match api
        .validate_file(smart_request(csv_path.to_str().unwrap()))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };

    // 消歧记录进入标准化日志
    let report = job.report.as_ref().unwrap();
    assert_eq!(report.normalization.disambiguated_model_codes.len(), 1);
    assert_eq!(
        report.normalization.disambiguated_model_codes[0].new_code,
        "YX-DUP-1-2"
    );

    api.commit(&job.job_id, CommitRequest::new("tester")).await.unwrap();

    let catalog = CatalogRepository::new(open_shared(&db_path).unwrap());
    assert!(catalog.get_variant("YX-DUP-1").unwrap().is_some());
    assert!(catalog.get_variant("YX-DUP-1-2").unwrap().is_some());
}

#[tokio::test]
async fn test_reimport_converges_to_updates() {
    let (_db, db_path) = create_test_db().unwrap();
    // 负时间窗使截止时刻落在未来, 同一文件可立即重复校验
    let config = ConfigManager::new(&db_path).unwrap();
    config
        .set_config_value(config_keys::JOB_DEDUP_WINDOW_HOURS, "-1")
        .unwrap();

    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code,brand,price\n云川 X1,YX-X1-100,云川,299.00\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path.clone());
    let first = match api
        .validate_file(smart_request(csv_path.to_str().unwrap()))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };
    let first_result = api.commit(&first.job_id, CommitRequest::new("tester")).await.unwrap();
    assert!(first_result.result.total_created() >= 3); // 品牌 + 商品 + 规格

    // 第二次导入: 全部命中既有实体, 走更新路径
    let second = match api
        .validate_file(smart_request(csv_path.to_str().unwrap()))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("时间窗已关闭, 不应命中去重"),
    };
    let report = second.report.as_ref().unwrap();
    assert!(report.candidates.products.is_empty(), "商品已存在, 不再是候选");
    assert!(report.products_data[0].is_update);
    assert!(report.variants_data[0].is_update);

    let second_result = api.commit(&second.job_id, CommitRequest::new("tester")).await.unwrap();
    assert_eq!(second_result.status, "success");
    assert!(second_result.result.total_updated() >= 2);

    // 幂等收敛: 不产生重复实体
    let catalog = CatalogRepository::new(open_shared(&db_path).unwrap());
    let variant = catalog.get_variant("YX-X1-100").unwrap().unwrap();
    assert_eq!(variant.price, Some(299.0));
}

#[test]
fn test_allow_partial_skips_bad_rows() {
    let (_db, db_path) = create_test_db().unwrap();
    // 有效的品牌候选 + 无效的幽灵规格
    let mut report = ghost_variant_report();
    report.candidates.brands.push(
        catalog_import::domain::import_job::Candidate {
            slug: "云川".to_string(),
            name: "云川".to_string(),
            category_slug: None,
            rows: vec![2],
        },
    );
    let job_id = seed_job_with_report(&db_path, &report, true);

    let conn = open_shared(&db_path).unwrap();
    let engine = CommitEngine::new(conn.clone());
    let result = engine.commit(&job_id, &CommitOptions::new("tester")).unwrap();

    // 有效部分落库, 无效行记为跳过
    assert_eq!(result.status, JobStatus::Partial);
    assert_eq!(result.total_created(), 1);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].row_num, 2);
    let catalog = CatalogRepository::new(conn.clone());
    assert!(catalog.get_brand("云川").unwrap().is_some());
    assert!(catalog.get_variant("YX-GHOST-1").unwrap().is_none());

    let job = ImportJobRepository::new(conn).get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Partial);
    assert_eq!(job.skipped_count, 1);
}

#[test]
fn test_strict_commit_rolls_back_whole_job() {
    let (_db, db_path) = create_test_db().unwrap();
    // 报告同时携带一个品牌候选和一条幽灵规格
    let mut report = ghost_variant_report();
    report.candidates.brands.push(
        catalog_import::domain::import_job::Candidate {
            slug: "云川".to_string(),
            name: "云川".to_string(),
            category_slug: None,
            rows: vec![2],
        },
    );
    let job_id = seed_job_with_report(&db_path, &report, false);

    let conn = open_shared(&db_path).unwrap();
    let engine = CommitEngine::new(conn.clone());
    let err = engine.commit(&job_id, &CommitOptions::new("tester")).unwrap_err();
    assert!(matches!(err, ImportError::DatabaseTransactionError(_)));

    // 整单回滚: 行级失败前已写入的品牌也不可见
    let catalog = CatalogRepository::new(conn.clone());
    assert!(catalog.get_brand("云川").unwrap().is_none());

    let job = ImportJobRepository::new(conn).get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.fail_reason.is_some());
}

#[tokio::test]
async fn test_smart_mode_error_rows_commit_as_partial() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code,price\n云川 X1,YX-P1-100,abc\n云川 X2,YX-P2-100,399.00\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path.clone());
    let mut request = smart_request(csv_path.to_str().unwrap());
    request.allow_partial = true;
    let job = match api.validate_file(request).await.unwrap() {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };

    // 校验失败的行进入报告, 提交时不得丢失
    let report = job.report.as_ref().unwrap();
    assert_eq!(report.error_rows.len(), 1);
    assert_eq!(report.error_rows[0].row_num, 2);

    let response = api.commit(&job.job_id, CommitRequest::new("tester")).await.unwrap();
    assert_eq!(response.status, "partial");
    assert_eq!(response.result.skipped.len(), 1);
    assert_eq!(response.result.skipped[0].row_num, 2);

    // 有效行落库, 失败行不落库
    let conn = open_shared(&db_path).unwrap();
    let catalog = CatalogRepository::new(conn.clone());
    assert!(catalog.get_variant("YX-P2-100").unwrap().is_some());
    assert!(catalog.get_variant("YX-P1-100").unwrap().is_none());

    let job = ImportJobRepository::new(conn).get(&job.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Partial);
    assert_eq!(job.skipped_count, 1);
}

#[tokio::test]
async fn test_error_rows_need_explicit_allow_partial_at_commit() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code,price\n云川 X1,YX-P1-100,abc\n云川 X2,YX-P2-100,399.00\n",
    )
    .unwrap();

    // 校验期未确认 allow_partial
    let api = ImportApi::new(db_path.clone());
    let job = match api
        .validate_file(smart_request(csv_path.to_str().unwrap()))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };

    let err = api.commit(&job.job_id, CommitRequest::new("tester")).await.unwrap_err();
    assert!(matches!(err, ApiError::CommitBlocked(_)));

    // 准入拒绝不消耗任务, 确认后可重新提交
    let conn = open_shared(&db_path).unwrap();
    let pending = ImportJobRepository::new(conn).get(&job.job_id).unwrap();
    assert_eq!(pending.status, JobStatus::Pending);

    let mut request = CommitRequest::new("tester");
    request.allow_partial = Some(true);
    let response = api.commit(&job.job_id, request).await.unwrap();
    assert_eq!(response.status, "partial");
}

#[test]
fn test_all_rows_skipped_marks_job_failed() {
    let (_db, db_path) = create_test_db().unwrap();
    // 报告只剩校验失败的行, 没有可落库的实体
    let report = ImportReport {
        status: ReportStatus::HasWarnings,
        issues: vec![],
        candidates: CandidateSet::default(),
        normalization: NormalizationLog::default(),
        counts: ReportCounts::default(),
        products_data: vec![],
        variants_data: vec![],
        categories_data: vec![],
        valid_rows: vec![],
        error_rows: vec![ErrorRow {
            row_num: 2,
            reason: "价格无法解析".to_string(),
        }],
    };
    let job_id = seed_job_with_report(&db_path, &report, true);

    let conn = open_shared(&db_path).unwrap();
    let engine = CommitEngine::new(conn.clone());
    let result = engine.commit(&job_id, &CommitOptions::new("tester")).unwrap();

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.total_created(), 0);
    assert_eq!(result.skipped.len(), 1);

    let job = ImportJobRepository::new(conn).get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.fail_reason.is_some());
}

#[tokio::test]
async fn test_commit_audit_rows_carry_request_source() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code,price\n云川 X1,YX-P1-100,299.00\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path.clone());
    let job = match api
        .validate_file(smart_request(csv_path.to_str().unwrap()))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };

    let mut request = CommitRequest::new("tester");
    request.ip_address = Some("10.0.0.8".to_string());
    request.user_agent = Some("cli/1.0".to_string());
    api.commit(&job.job_id, request).await.unwrap();

    let audit_repo = AuditLogRepository::new(open_shared(&db_path).unwrap());
    let logs = audit_repo.list(&AuditLogQuery::new()).unwrap();
    assert!(!logs.is_empty());
    for log in &logs {
        assert_eq!(log.ip_address.as_deref(), Some("10.0.0.8"));
        assert_eq!(log.user_agent.as_deref(), Some("cli/1.0"));
    }
}

#[tokio::test]
async fn test_db_verify_confirms_written_entities() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code,category_path,brand\n云川 X1,YX-X1-100,电子产品,云川\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    let job = match api
        .validate_file(smart_request(csv_path.to_str().unwrap()))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };

    let response = api.commit(&job.job_id, CommitRequest::new("tester")).await.unwrap();
    let verify = &response.result.db_verify;
    assert!(verify.enabled);
    assert!(verify.all_verified(), "不一致: {:?}", verify.mismatches);
    assert!(verify.confirmed.contains_key("variant"));
}
