// ==========================================
// 导入API端到端测试
// ==========================================
// 目标: 校验 → 报告 → 提交 → 落库/审计 的完整链路
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use catalog_import::api::{
    ApiError, AuditApi, CommitRequest, ImportApi, ValidateOutcome, ValidateRequest,
};
use catalog_import::domain::audit_log::AuditLogQuery;
use catalog_import::domain::import_job::ReportStatus;
use catalog_import::domain::types::{ImportKind, ImportMode, JobStatus};
use catalog_import::repository::CatalogRepository;
use test_helpers::{create_test_db, open_shared, write_csv_fixture};

fn request(file_path: &str, kind: ImportKind, mode: ImportMode) -> ValidateRequest {
    ValidateRequest {
        file_path: file_path.to_string(),
        kind,
        mode,
        created_by: "tester".to_string(),
        is_preview: false,
        allow_partial: false,
        treat_slash_as_hierarchy: true,
        allow_create_missing_categories: true,
    }
}

#[tokio::test]
async fn test_validate_then_commit_full_flow() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code,category_path,brand,price,stock\n\
         云川 X1 智能音箱,YX-X1-100,电子产品/音箱,云川,299.00,120\n\
         云川 X2 智能音箱,YX-X2-100,电子产品/音箱,云川,399.00,60\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path.clone());

    // 校验: 产出 pending 任务与报告
    let outcome = api
        .validate_file(request(
            csv_path.to_str().unwrap(),
            ImportKind::CatalogImport,
            ImportMode::Smart,
        ))
        .await
        .unwrap();
    let job = match outcome {
        ValidateOutcome::Created { job } => job,
        ValidateOutcome::Duplicate { .. } => panic!("首次校验不应命中去重"),
    };
    assert_eq!(job.status, JobStatus::Pending);
    let report = job.report.as_ref().expect("校验后应挂载报告");
    assert_eq!(report.status, ReportStatus::Valid);
    assert_eq!(report.products_data.len(), 2);
    assert_eq!(report.variants_data.len(), 2);
    assert!(!report.candidates.categories.is_empty());

    // 提交: 实体落库
    let response = api.commit(&job.job_id, CommitRequest::new("tester")).await.unwrap();
    assert_eq!(response.status, "success");
    assert!(response.result.total_created() >= 7); // 2 类目 + 品牌 + 2 商品 + 2 规格

    let catalog = CatalogRepository::new(open_shared(&db_path).unwrap());
    let product = catalog.get_product("云川-x1-智能音箱").unwrap();
    assert!(product.is_some());
    assert!(catalog.get_product("云川-x2-智能音箱").unwrap().is_some());
    assert!(catalog.get_variant("YX-X1-100").unwrap().is_some());
    assert!(catalog.get_variant("YX-X2-100").unwrap().is_some());
    assert!(catalog.get_brand("云川").unwrap().is_some());

    // 任务终态
    let finished = api.get_job(&job.job_id).await.unwrap();
    assert_eq!(finished.status, JobStatus::Success);
    assert!(finished.commit_result.is_some());

    // 审计: 每条规格一条 create 记录
    let audit = AuditApi::new(db_path);
    let mut query = AuditLogQuery::new();
    query.entity_type = Some("variant".to_string());
    let logs = audit.list(&query).await.unwrap();
    assert_eq!(logs.len(), 2);
}

#[tokio::test]
async fn test_continuation_rows_merge_into_primary() {
    let (_db, db_path) = create_test_db().unwrap();
    // 第 3 行无身份列, 仅携带追加图片 → 并入第 2 行
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code,image_url\n\
         云川 X1,YX-X1-100,https://cdn.example.com/a.jpg\n\
         ,,https://cdn.example.com/b.jpg\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    let job = match api
        .validate_file(request(
            csv_path.to_str().unwrap(),
            ImportKind::CatalogImport,
            ImportMode::Smart,
        ))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };

    let report = job.report.as_ref().unwrap();
    assert_eq!(report.products_data.len(), 1);
    assert_eq!(
        report.products_data[0].images,
        vec![
            "https://cdn.example.com/a.jpg".to_string(),
            "https://cdn.example.com/b.jpg".to_string(),
        ]
    );
    assert_eq!(report.normalization.merged_continuation_rows.len(), 1);
    assert_eq!(report.normalization.merged_continuation_rows[0].primary_row, 2);
    assert_eq!(
        report.normalization.merged_continuation_rows[0].continuation_row,
        3
    );
}

#[tokio::test]
async fn test_duplicate_file_within_window_reuses_job() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code\n云川 X1,YX-X1-100\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    let req = request(
        csv_path.to_str().unwrap(),
        ImportKind::CatalogImport,
        ImportMode::Smart,
    );

    let first = api.validate_file(req.clone()).await.unwrap();
    let first_id = match first {
        ValidateOutcome::Created { job } => job.job_id,
        _ => panic!("首次校验应创建任务"),
    };

    // 同一文件 + 同一 (kind, mode): 命中去重时间窗
    match api.validate_file(req.clone()).await.unwrap() {
        ValidateOutcome::Duplicate {
            existing_job_id, ..
        } => assert_eq!(existing_job_id, first_id),
        _ => panic!("重复校验应命中去重"),
    }

    // mode 不同则不算重复
    let mut strict_req = req;
    strict_req.mode = ImportMode::Strict;
    match api.validate_file(strict_req).await.unwrap() {
        ValidateOutcome::Created { job } => assert_ne!(job.job_id, first_id),
        _ => panic!("不同模式不应命中去重"),
    }
}

#[tokio::test]
async fn test_preview_job_cannot_commit() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code\n云川 X1,YX-X1-100\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    let mut req = request(
        csv_path.to_str().unwrap(),
        ImportKind::CatalogImport,
        ImportMode::Smart,
    );
    req.is_preview = true;

    let job = match api.validate_file(req).await.unwrap() {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建预览任务"),
    };

    match api.commit(&job.job_id, CommitRequest::new("tester")).await {
        Err(ApiError::CommitBlocked(_)) => {}
        other => panic!("预览任务提交应被拒绝, 实际: {:?}", other.map(|r| r.status)),
    }
}

#[tokio::test]
async fn test_strict_mode_blocks_commit_on_errors() {
    let (_db, db_path) = create_test_db().unwrap();
    // variants_csv 引用不存在的商品 → error 级问题
    let (_dir, csv_path) = write_csv_fixture(
        "variants.csv",
        "model_code,product_slug,price\nYX-NO-1,ghost-product,99.00\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    // allow_partial 不能绕过 strict 阻断
    let mut req = request(
        csv_path.to_str().unwrap(),
        ImportKind::VariantsCsv,
        ImportMode::Strict,
    );
    req.allow_partial = true;
    let job = match api.validate_file(req).await.unwrap() {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };

    let report = job.report.as_ref().unwrap();
    assert_eq!(report.status, ReportStatus::Blocked);

    match api.commit(&job.job_id, CommitRequest::new("tester")).await {
        Err(ApiError::CommitBlocked(_)) => {}
        other => panic!("strict 阻断任务提交应被拒绝, 实际: {:?}", other.map(|r| r.status)),
    }

    // 任务保持 pending, 可重新上传修正后的文件
    let job = api.get_job(&job.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_fatal_file_marks_job_failed() {
    let (_db, db_path) = create_test_db().unwrap();
    // 缺少必需列 title → 整单致命失败
    let (_dir, csv_path) = write_csv_fixture(
        "bad.csv",
        "brand,price\n云川,299.00\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    let result = api
        .validate_file(request(
            csv_path.to_str().unwrap(),
            ImportKind::CatalogImport,
            ImportMode::Smart,
        ))
        .await;
    assert!(result.is_err());

    // 任务登记过且被置为 failed
    let jobs = api.list_jobs(None, Some("failed"), 10, 0).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].fail_reason.is_some());
}

#[tokio::test]
async fn test_list_jobs_filters() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "taxonomy.csv",
        "category_path,name\n电子产品/音箱,桌面音箱\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    api.validate_file(request(
        csv_path.to_str().unwrap(),
        ImportKind::TaxonomyCsv,
        ImportMode::Smart,
    ))
    .await
    .unwrap();

    let all = api.list_jobs(None, None, 10, 0).await.unwrap();
    assert_eq!(all.len(), 1);

    let by_kind = api
        .list_jobs(Some("taxonomy_csv"), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(by_kind.len(), 1);

    let miss = api
        .list_jobs(Some("products_csv"), None, 10, 0)
        .await
        .unwrap();
    assert!(miss.is_empty());

    // 非法过滤值
    assert!(api.list_jobs(Some("nope"), None, 10, 0).await.is_err());
}

#[tokio::test]
async fn test_spawn_validate_runs_in_background() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code,price\n云川 X1,YX-X1-100,299.00\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    let job = match api
        .spawn_validate(request(
            csv_path.to_str().unwrap(),
            ImportKind::CatalogImport,
            ImportMode::Smart,
        ))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };
    // 立即返回, 校验在后台进行
    assert_eq!(job.status, JobStatus::Validating);
    assert!(job.report.is_none());

    // 轮询直到后台校验完成
    let mut finished = job;
    for _ in 0..50 {
        finished = api.get_job(&finished.job_id).await.unwrap();
        if finished.status != JobStatus::Validating {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert_eq!(finished.status, JobStatus::Pending);
    let report = finished.report.as_ref().expect("后台校验应挂载报告");
    assert_eq!(report.status, ReportStatus::Valid);
}

#[tokio::test]
async fn test_report_blob_and_template() {
    let (_db, db_path) = create_test_db().unwrap();
    let (_dir, csv_path) = write_csv_fixture(
        "catalog.csv",
        "title,model_code\n云川 X1,YX-X1-100\n",
    )
    .unwrap();

    let api = ImportApi::new(db_path);
    let job = match api
        .validate_file(request(
            csv_path.to_str().unwrap(),
            ImportKind::CatalogImport,
            ImportMode::Smart,
        ))
        .await
        .unwrap()
    {
        ValidateOutcome::Created { job } => job,
        _ => panic!("应创建任务"),
    };

    let blob = api.report_blob(&job.job_id).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    assert!(value.get("status").is_some());

    let template = api.template("variants_csv", "csv", true).unwrap();
    let text = String::from_utf8(template).unwrap();
    assert!(text.starts_with("model_code,product_slug"));

    assert!(api.template("variants_csv", "xlsx", false).is_err());
}
