// ==========================================
// 餐饮门店排班系统 - API层错误类型
// ==========================================
// 职责: 统一对外错误口径,转换仓储/引擎错误为用户可读消息
// 红线: 硬约束拒绝必须携带结构化违规明细,不得折叠为纯文本
// ==========================================

use crate::domain::coverage::CoverageReport;
use crate::engine::generator::GenerationError;
use crate::engine::lifecycle::LifecycleViolation;
use crate::engine::revalidation::EditRejection;
use crate::engine::rules::RuleViolation;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 输入与配置错误 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("规则集配置错误: {0}")]
    ConfigurationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ===== 业务规则错误 =====
    /// 硬约束违规,调用方可逐条展示 violations
    #[error("硬约束违规({}条),操作被拒绝", .0.len())]
    ConstraintViolation(Vec<RuleViolation>),

    #[error(transparent)]
    LifecycleError(#[from] LifecycleViolation),

    /// 完全无法生成排班,携带全零覆盖报告供诊断
    #[error("完全无法生成排班: {message}")]
    Infeasible {
        message: String,
        coverage: CoverageReport,
    },

    // ===== 并发控制错误 =====
    #[error("乐观锁冲突: schedule_id={schedule_id}, expected_revision={expected}, actual_revision={actual}")]
    ConflictError {
        schedule_id: String,
        expected: i32,
        actual: i32,
    },

    #[error("生成运行已撤销")]
    GenerationCancelled,

    #[error("生成运行已被更新的运行顶替")]
    GenerationSuperseded,

    // ===== 数据访问错误 =====
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                schedule_id,
                expected,
                actual,
            } => ApiError::ConflictError {
                schedule_id,
                expected,
                actual,
            },
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 GenerationError 转换
// ==========================================
impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Validation(msg) => ApiError::ValidationError(msg),
            GenerationError::Configuration(msg) => ApiError::ConfigurationError(msg),
            GenerationError::Infeasible { coverage } => ApiError::Infeasible {
                message: "所有应配槽位实配为 0".to_string(),
                coverage,
            },
            GenerationError::Cancelled => ApiError::GenerationCancelled,
            GenerationError::Superseded => ApiError::GenerationSuperseded,
            GenerationError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 EditRejection 转换
// ==========================================
impl From<EditRejection> for ApiError {
    fn from(err: EditRejection) -> Self {
        match err {
            EditRejection::Invalid(msg) => ApiError::InvalidInput(msg),
            EditRejection::HardViolations(violations) => {
                ApiError::ConstraintViolation(violations)
            }
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
