// ==========================================
// 餐饮门店排班系统 - 应用层
// ==========================================
// 职责: 应用装配与启动入口支撑
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState};
