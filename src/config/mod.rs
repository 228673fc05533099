// ==========================================
// 餐饮门店排班系统 - 配置层
// ==========================================
// 职责: 系统配置读取与管理
// 红线: 引擎只通过 SchedulingConfigReader trait 访问配置
// ==========================================

pub mod config_manager;
pub mod scheduling_config;

pub use config_manager::{config_keys, ConfigManager};
pub use scheduling_config::{ConfidenceWeights, SchedulingConfigReader};
