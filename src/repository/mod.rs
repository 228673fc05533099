// ==========================================
// 餐饮门店排班系统 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod employee_repo;
pub mod error;
pub mod rule_set_repo;
pub mod schedule_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use employee_repo::EmployeeRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use rule_set_repo::RuleSetRepository;
pub use schedule_repo::{AssignmentRepository, ScheduleRepository};
