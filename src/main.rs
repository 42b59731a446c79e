// ==========================================
// 商品目录导入系统 - 命令行入口
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 批量目录数据导入 (先校验出报告, 确认后提交)
// ==========================================

use catalog_import::api::{AuditApi, CommitRequest, ImportApi, ValidateOutcome, ValidateRequest};
use catalog_import::domain::types::{ImportKind, ImportMode};
use catalog_import::{db, logging};
use std::process::ExitCode;

/// 数据库路径: 环境变量优先, 否则工作目录下默认文件
fn default_db_path() -> String {
    std::env::var("CATALOG_IMPORT_DB").unwrap_or_else(|_| "catalog_import.db".to_string())
}

fn print_usage() {
    eprintln!("商品目录导入系统 v{}", catalog_import::VERSION);
    eprintln!();
    eprintln!("用法:");
    eprintln!("  catalog-import validate <文件> --kind <种类> --mode <模式> [--by <操作人>] [--preview] [--allow-partial]");
    eprintln!("  catalog-import commit <任务ID> [--allow-partial] [--by <操作人>]");
    eprintln!("  catalog-import jobs [--kind <种类>] [--status <状态>]");
    eprintln!("  catalog-import report <任务ID>");
    eprintln!("  catalog-import template <种类> [--format csv|json]");
    eprintln!("  catalog-import audit-cleanup [--older-than-days <天数>] [--by <操作人>]");
    eprintln!();
    eprintln!("种类: catalog_import | products_csv | variants_csv | taxonomy_csv");
    eprintln!("模式: strict | smart");
}

/// 取 `--flag 值` 形式的参数
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

async fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        return Err("缺少子命令".to_string());
    };

    let db_path = default_db_path();
    let conn = db::open_sqlite_connection(&db_path)
        .map_err(|e| format!("数据库连接失败: {}", e))?;
    db::init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
    drop(conn);
    let import_api = ImportApi::new(db_path.clone());
    let audit_api = AuditApi::new(db_path);

    let actor = flag_value(&args, "--by").unwrap_or_else(|| "cli".to_string());

    match command.as_str() {
        "validate" => {
            let file = args.get(1).ok_or("validate 需要文件路径")?.clone();
            let kind = flag_value(&args, "--kind").ok_or("缺少 --kind")?;
            let kind = ImportKind::from_str(&kind).ok_or(format!("未知种类: {}", kind))?;
            let mode = flag_value(&args, "--mode").unwrap_or_else(|| "smart".to_string());
            let mode = ImportMode::from_str(&mode).ok_or(format!("未知模式: {}", mode))?;

            let mut request = ValidateRequest {
                file_path: file,
                kind,
                mode,
                created_by: actor,
                is_preview: has_flag(&args, "--preview"),
                allow_partial: has_flag(&args, "--allow-partial"),
                treat_slash_as_hierarchy: true,
                allow_create_missing_categories: true,
            };
            if has_flag(&args, "--no-hierarchy") {
                request.treat_slash_as_hierarchy = false;
            }

            match import_api.validate_file(request).await.map_err(|e| e.to_string())? {
                ValidateOutcome::Created { job } => {
                    println!("任务已创建: {}", job.job_id);
                    println!("状态: {}", job.status.as_str());
                    if let Some(report) = &job.report {
                        println!("报告状态: {:?}", report.status);
                        println!("问题数: {}", report.issues.len());
                    }
                }
                ValidateOutcome::Duplicate {
                    message,
                    existing_job_id,
                    ..
                } => {
                    println!("{} (任务: {})", message, existing_job_id);
                }
            }
        }
        "commit" => {
            let job_id = args.get(1).ok_or("commit 需要任务ID")?;
            let mut request = CommitRequest::new(&actor);
            request.allow_partial = has_flag(&args, "--allow-partial").then_some(true);
            request.user_agent = Some(format!("catalog-import-cli/{}", catalog_import::VERSION));
            let response = import_api
                .commit(job_id, request)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", response.message);
            println!("任务状态: {}", response.status);
            for skip in &response.result.skipped {
                println!("  跳过 第{}行: {}", skip.row_num, skip.reason);
            }
        }
        "jobs" => {
            let kind = flag_value(&args, "--kind");
            let status = flag_value(&args, "--status");
            let jobs = import_api
                .list_jobs(kind.as_deref(), status.as_deref(), 50, 0)
                .await
                .map_err(|e| e.to_string())?;
            for job in jobs {
                println!(
                    "{}  {}  {}  {}  {}",
                    job.job_id,
                    job.kind.as_str(),
                    job.mode.as_str(),
                    job.status.as_str(),
                    job.file_name.as_deref().unwrap_or("-"),
                );
            }
        }
        "report" => {
            let job_id = args.get(1).ok_or("report 需要任务ID")?;
            let blob = import_api.report_blob(job_id).await.map_err(|e| e.to_string())?;
            println!("{}", String::from_utf8_lossy(&blob));
        }
        "template" => {
            let kind = args.get(1).ok_or("template 需要种类")?;
            let format = flag_value(&args, "--format").unwrap_or_else(|| "csv".to_string());
            let bytes = import_api
                .template(kind, &format, true)
                .map_err(|e| e.to_string())?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
        "audit-cleanup" => {
            let days = flag_value(&args, "--older-than-days")
                .map(|d| d.parse::<i64>().map_err(|_| format!("天数无效: {}", d)))
                .transpose()?;
            let result = audit_api.cleanup(days, &actor).await.map_err(|e| e.to_string())?;
            println!(
                "已清理 {} 条审计记录 (早于 {} 天, 截止 {})",
                result.deleted_count, result.older_than_days, result.cutoff_date
            );
        }
        _ => {
            print_usage();
            return Err(format!("未知子命令: {}", command));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("商品目录导入系统 v{}", catalog_import::VERSION);
    tracing::info!("==================================================");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("错误: {}", e);
            ExitCode::FAILURE
        }
    }
}
