// ==========================================
// 商品目录导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取幂等去重时间窗（小时）
    ///
    /// 同 (file_hash, kind, mode) 在窗口内重复校验时返回既有任务
    ///
    /// # 默认值
    /// - 24
    async fn get_job_dedup_window_hours(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取报告问题条数上限（超出截断）
    ///
    /// # 默认值
    /// - 500
    async fn get_max_report_issues(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取审计日志保留天数（cleanup 默认参数）
    ///
    /// # 默认值
    /// - 90
    async fn get_audit_retention_days(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取价格上限（超出记 warning）
    ///
    /// # 返回
    /// - Some(f64): 已配置上限
    /// - None: 不检查
    async fn get_price_max(&self) -> Result<Option<f64>, Box<dyn Error>>;

    /// 获取提交后是否执行读回验证
    ///
    /// # 默认值
    /// - true
    async fn get_db_verify_enabled(&self) -> Result<bool, Box<dyn Error>>;
}
