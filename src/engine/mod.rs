// ==========================================
// 餐饮门店排班系统 - 排班引擎层
// ==========================================
// 职责: 意向归一化、需求解析、规则判定、贪心填充、覆盖评估、
//       编辑重校验、生命周期状态机、生成运行控制
// 红线: 引擎层只依赖领域模型与配置 trait,不直接落库
// ==========================================

pub mod availability;
pub mod coverage;
pub mod events;
pub mod generator;
pub mod lifecycle;
pub mod ranking;
pub mod requirement;
pub mod revalidation;
pub mod rules;
pub mod runs;
pub mod slot_filler;

pub use availability::{AvailabilityMatrix, AvailabilityStore};
pub use coverage::CoverageBuilder;
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, ScheduleEvent, ScheduleEventPublisher,
    ScheduleEventType,
};
pub use generator::{GenerationError, GenerationOutcome, ScheduleGenerator};
pub use lifecycle::{LifecycleController, LifecycleViolation};
pub use ranking::{CandidateTier, RankedCandidate};
pub use requirement::{RequirementPlan, RequirementResolver};
pub use revalidation::{AssignmentEdit, EditOutcome, EditRejection, EditRevalidator};
pub use rules::{violation_codes, RuleEngine, RuleViolation, SoftEvaluation};
pub use runs::{CancelToken, GenerationRunRegistry, RunHandle};
pub use slot_filler::{FillContext, FillResult, SlotFiller};
