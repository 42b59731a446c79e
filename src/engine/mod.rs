// ==========================================
// 商品目录导入系统 - 引擎层
// ==========================================
// 职责: 提交状态机与提交后验证
// 红线: 提交权抢占失败不得产生任何目录写入
// ==========================================

pub mod committer;
pub mod db_verifier;

// 重导出核心引擎
pub use committer::{CommitEngine, CommitOptions};
pub use db_verifier::DbVerifier;
