// ==========================================
// 餐饮门店排班系统 - 核心库
// ==========================================
// 系统定位: 排班与人员配置校验核心(生成建议,人工最终控制权)
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 排班规则与生成
pub mod engine;

// 导入层 - 外部快照数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施(连接初始化/PRAGMA 统一)
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配与启动
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AssignmentSource, AvailabilityStatus, CoverageLevel, DayType, RuleType, ScheduleStatus,
    ViolationSeverity,
};

// 领域实体
pub use domain::action_log::{ActionLog, ActionType};
pub use domain::coverage::{CoverageReport, CoverageSummary, SlotCoverage};
pub use domain::employee::{AvailabilityEntry, AvailabilitySubmission, Employee};
pub use domain::rule::{PositionRequirement, RuleBody, RuleSet, RuleSetDetail, SchedulingRule};
pub use domain::schedule::{Schedule, ScheduleDetail, ShiftAssignment};

// 引擎
pub use engine::{
    AssignmentEdit, CancelToken, GenerationRunRegistry, RuleEngine, RuleViolation,
    ScheduleGenerator,
};

// API
pub use api::{ApiError, ApiResult, ConfigApi, RosterApi, RuleSetApi, ScheduleApi};

// 应用
pub use app::{get_default_db_path, AppState};

// ==========================================
// 常量
// ==========================================

/// 应用版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用名称
pub const APP_NAME: &str = "餐饮门店排班系统";
