// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、CSV 测试文件生成
// ==========================================

use catalog_import::db;
use rusqlite::Connection;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开指向测试数据库的共享连接
pub fn open_shared(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    Ok(Arc::new(Mutex::new(db::open_sqlite_connection(db_path)?)))
}

/// 在临时目录下写出一个 CSV 测试文件
///
/// # 返回
/// - TempDir: 临时目录（需要保持存活）
/// - PathBuf: CSV 文件路径
pub fn write_csv_fixture(
    file_name: &str,
    content: &str,
) -> Result<(TempDir, PathBuf), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join(file_name);
    let mut file = std::fs::File::create(&path)?;
    file.write_all(content.as_bytes())?;
    Ok((dir, path))
}
