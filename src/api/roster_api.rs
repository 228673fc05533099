// ==========================================
// 餐饮门店排班系统 - 花名册与出勤意向 API
// ==========================================
// 职责: 员工快照维护、出勤意向提交入口
// 红线: 花名册归外部协作方所有,这里只维护只读快照
// 红线: NG 提交受员工月度休假申请上限约束
// ==========================================

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::employee::{AvailabilityEntry, AvailabilitySubmission, Employee};
use crate::domain::types::AvailabilityStatus;
use crate::engine::availability::AvailabilityStore;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::employee_repo::EmployeeRepository;

// ==========================================
// RosterApi - 花名册 API
// ==========================================
pub struct RosterApi {
    employee_repo: Arc<EmployeeRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl RosterApi {
    pub fn new(
        employee_repo: Arc<EmployeeRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            employee_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 员工快照
    // ==========================================

    /// 写入/更新员工快照
    pub fn upsert_employee(&self, employee: &Employee, actor: &str) -> ApiResult<()> {
        validator::require_non_empty(actor, "操作人")?;
        Self::validate_employee(employee)?;

        self.employee_repo.upsert(employee)?;
        self.log_roster_change(
            actor,
            format!("员工快照写入: {}", employee.employee_id),
        );
        Ok(())
    }

    /// 查询员工
    pub fn get_employee(&self, employee_id: &str) -> ApiResult<Employee> {
        self.employee_repo
            .find_by_id(employee_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Employee(id={})不存在", employee_id)))
    }

    /// 查询员工列表
    pub fn list_employees(&self, only_active: bool) -> ApiResult<Vec<Employee>> {
        Ok(self.employee_repo.find_all(only_active)?)
    }

    /// 员工离职(置非在职,快照保留)
    pub fn deactivate_employee(&self, employee_id: &str, actor: &str) -> ApiResult<()> {
        validator::require_non_empty(actor, "操作人")?;

        self.employee_repo.deactivate(employee_id)?;
        self.log_roster_change(actor, format!("员工离职: {}", employee_id));
        info!(employee_id = %employee_id, "员工已置非在职");
        Ok(())
    }

    // ==========================================
    // 出勤意向
    // ==========================================

    /// 提交出勤意向(同 (员工, 日期) 重复提交覆盖旧值)
    ///
    /// NG 提交时校验当月休假申请上限;已是 NG 的改写不重复计数
    pub fn submit_availability(
        &self,
        submission: &AvailabilitySubmission,
        actor: &str,
    ) -> ApiResult<()> {
        validator::require_non_empty(actor, "操作人")?;
        AvailabilityStore::validate_submission(submission).map_err(ApiError::ValidationError)?;

        let employee = self
            .employee_repo
            .find_by_id(&submission.employee_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Employee(id={})不存在", submission.employee_id))
            })?;
        if !employee.active {
            return Err(ApiError::InvalidInput(format!(
                "员工 {} 已离职,不接受意向提交",
                submission.employee_id
            )));
        }

        if submission.status == AvailabilityStatus::Ng {
            self.ensure_off_request_quota(&employee, submission)?;
        }

        let entry = AvailabilityEntry {
            employee_id: submission.employee_id.clone(),
            work_date: submission.work_date,
            status: submission.status,
            preferred_start: submission.preferred_start,
            preferred_end: submission.preferred_end,
            note: submission.note.clone(),
            submitted_at: Utc::now().naive_utc(),
        };
        self.employee_repo.upsert_availability(&entry)?;

        self.log_action(
            ActionLog::new(
                uuid::Uuid::new_v4().to_string(),
                None,
                ActionType::AvailabilityImport,
                actor.to_string(),
            )
            .with_payload(&serde_json::json!({
                "employee_id": submission.employee_id,
                "work_date": submission.work_date.to_string(),
                "status": submission.status.to_db_str(),
            })),
        );
        Ok(())
    }

    /// 查询单条意向
    pub fn get_availability(
        &self,
        employee_id: &str,
        work_date: NaiveDate,
    ) -> ApiResult<Option<AvailabilityEntry>> {
        Ok(self.employee_repo.find_availability(employee_id, work_date)?)
    }

    /// 查询周期内全部已提交意向
    pub fn list_availability(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> ApiResult<Vec<AvailabilityEntry>> {
        validator::validate_period(period_start, period_end)?;
        Ok(self
            .employee_repo
            .find_availability_in_period(period_start, period_end)?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn validate_employee(employee: &Employee) -> ApiResult<()> {
        validator::require_non_empty(&employee.employee_id, "员工ID")?;
        validator::require_non_empty(&employee.display_name, "员工姓名")?;
        validator::validate_position_scope(&employee.eligible_positions)?;
        if employee.monthly_hour_cap <= 0.0 {
            return Err(ApiError::InvalidInput(format!(
                "月度工时上限必须为正: {}",
                employee.monthly_hour_cap
            )));
        }
        if employee.max_off_requests < 0 {
            return Err(ApiError::InvalidInput(format!(
                "休假申请上限不能为负: {}",
                employee.max_off_requests
            )));
        }
        if let Some(end) = employee.contract_end {
            if end < employee.hire_date {
                return Err(ApiError::InvalidInput(format!(
                    "合同到期日早于入职日期: {} < {}",
                    end, employee.hire_date
                )));
            }
        }
        Ok(())
    }

    /// 当月 NG 天数配额校验(改写已有 NG 不计新增)
    fn ensure_off_request_quota(
        &self,
        employee: &Employee,
        submission: &AvailabilitySubmission,
    ) -> ApiResult<()> {
        let existing = self
            .employee_repo
            .find_availability(&submission.employee_id, submission.work_date)?;
        if matches!(&existing, Some(e) if e.status == AvailabilityStatus::Ng) {
            return Ok(());
        }

        let (month_start, month_end) = month_bounds(submission.work_date);
        let ng_count =
            self.employee_repo
                .count_ng_days(&submission.employee_id, month_start, month_end)?;
        if ng_count >= i64::from(employee.max_off_requests) {
            return Err(ApiError::ValidationError(format!(
                "员工 {} 当月休假申请已达上限 {}",
                submission.employee_id, employee.max_off_requests
            )));
        }
        Ok(())
    }

    fn log_roster_change(&self, actor: &str, detail: String) {
        self.log_action(
            ActionLog::new(
                uuid::Uuid::new_v4().to_string(),
                None,
                ActionType::RosterImport,
                actor.to_string(),
            )
            .with_detail(detail),
        );
    }

    /// 审计写入失败不回滚已提交的业务写入
    fn log_action(&self, log: ActionLog) {
        if let Err(err) = self.action_log_repo.insert(&log) {
            tracing::warn!(action_type = %log.action_type, error = %err, "操作日志写入失败");
        }
    }
}

/// 日期所在自然月的首末两日
fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
    let next_month_start = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    };
    let end = next_month_start
        .and_then(|d| d.pred_opt())
        .unwrap_or(date);
    (start, end)
}
