// ==========================================
// 餐饮门店排班系统 - API层
// ==========================================
// 职责: 对外操作入口,编排仓储与引擎,统一错误口径与审计
// 红线: 外部调用只许走 API 层,不得旁路直写仓储
// ==========================================

pub mod config_api;
pub mod error;
pub mod roster_api;
pub mod rule_set_api;
pub mod schedule_api;
pub mod validator;

pub use config_api::ConfigApi;
pub use error::{ApiError, ApiResult};
pub use roster_api::RosterApi;
pub use rule_set_api::RuleSetApi;
pub use schedule_api::{EditSummary, GenerationSummary, ScheduleApi};
