// ==========================================
// 餐饮门店排班系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod coverage;
pub mod employee;
pub mod rule;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use coverage::{CoverageReport, CoverageSummary, SlotCoverage};
pub use employee::{AvailabilityEntry, AvailabilitySubmission, Employee};
pub use rule::{
    dense_requirement_vectors, PositionRequirement, RuleBody, RuleSet, RuleSetDetail,
    SchedulingRule,
};
pub use schedule::{Schedule, ScheduleDetail, ShiftAssignment};
pub use types::{
    span_covers_hour, AssignmentSource, AvailabilityStatus, CoverageLevel, DayType, RuleType,
    ScheduleStatus, ViolationSeverity,
};
