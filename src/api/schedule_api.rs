// ==========================================
// 餐饮门店排班系统 - 排班表 API
// ==========================================
// 职责: 排班表管理、生成运行编排、手工编辑、确认/归档、覆盖查询
// 红线: 所有落库写入必须携带乐观锁期望 revision
// 红线: 生成提交前必须复核运行是否仍为当前(顶替/撤销不产出结果)
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::config::config_manager::ConfigManager;
use crate::config::scheduling_config::SchedulingConfigReader;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::coverage::{CoverageReport, CoverageSummary};
use crate::domain::rule::RuleSetDetail;
use crate::domain::schedule::{Schedule, ScheduleDetail, ShiftAssignment};
use crate::domain::types::ScheduleStatus;
use crate::engine::availability::AvailabilityStore;
use crate::engine::coverage::CoverageBuilder;
use crate::engine::events::{
    OptionalEventPublisher, ScheduleEvent, ScheduleEventPublisher, ScheduleEventType,
};
use crate::engine::generator::{GenerationError, ScheduleGenerator};
use crate::engine::lifecycle::LifecycleController;
use crate::engine::requirement::{RequirementPlan, RequirementResolver};
use crate::engine::revalidation::{AssignmentEdit, EditRevalidator};
use crate::engine::rules::RuleEngine;
use crate::engine::runs::GenerationRunRegistry;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::employee_repo::EmployeeRepository;
use crate::repository::error::RepositoryError;
use crate::repository::rule_set_repo::RuleSetRepository;
use crate::repository::schedule_repo::{AssignmentRepository, ScheduleRepository};

// ==========================================
// 返回载体
// ==========================================

/// 一次生成运行的结果摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub schedule_id: String,
    pub revision: i32, // 提交后的 revision
    pub assignment_count: usize,
    pub confidence: f64,
    pub coverage: CoverageSummary,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

/// 一次手工编辑的结果摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSummary {
    pub schedule_id: String,
    pub revision: i32, // 编辑后的 revision
    pub status: ScheduleStatus,
    pub affected_slots: usize,
    pub soft_warnings: Vec<String>,
}

// ==========================================
// ScheduleApi - 排班表 API
// ==========================================
pub struct ScheduleApi {
    schedule_repo: Arc<ScheduleRepository>,
    assignment_repo: Arc<AssignmentRepository>,
    employee_repo: Arc<EmployeeRepository>,
    rule_set_repo: Arc<RuleSetRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
    generator: ScheduleGenerator<ConfigManager>,
    run_registry: Arc<GenerationRunRegistry>,
    // 覆盖报告缓存: 生成时全量写入,编辑时增量修补
    coverage_cache: Mutex<HashMap<String, CoverageReport>>,
    event_publisher: OptionalEventPublisher,
}

impl ScheduleApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schedule_repo: Arc<ScheduleRepository>,
        assignment_repo: Arc<AssignmentRepository>,
        employee_repo: Arc<EmployeeRepository>,
        rule_set_repo: Arc<RuleSetRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
        run_registry: Arc<GenerationRunRegistry>,
        event_publisher: Option<Arc<dyn ScheduleEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };
        let generator = ScheduleGenerator::new(config_manager.clone());

        Self {
            schedule_repo,
            assignment_repo,
            employee_repo,
            rule_set_repo,
            action_log_repo,
            config_manager,
            generator,
            run_registry,
            coverage_cache: Mutex::new(HashMap::new()),
            event_publisher,
        }
    }

    // ==========================================
    // 排班表管理
    // ==========================================

    /// 创建排班表(初始 DRAFT, revision=0)
    ///
    /// 周期、岗位范围、规则集在创建后不可变
    pub fn create_schedule(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
        position_scope: Vec<String>,
        rule_set_id: &str,
        created_by: &str,
    ) -> ApiResult<Schedule> {
        validator::validate_period(period_start, period_end)?;
        validator::validate_position_scope(&position_scope)?;
        validator::require_non_empty(rule_set_id, "规则集ID")?;
        validator::require_non_empty(created_by, "创建人")?;

        let rule_set = self
            .rule_set_repo
            .find_by_id(rule_set_id)?
            .ok_or_else(|| ApiError::NotFound(format!("RuleSet(id={})不存在", rule_set_id)))?;
        if !rule_set.active {
            return Err(ApiError::InvalidInput(format!(
                "规则集 {} 未启用",
                rule_set_id
            )));
        }

        let now = Utc::now().naive_utc();
        let schedule = Schedule {
            schedule_id: uuid::Uuid::new_v4().to_string(),
            period_start,
            period_end,
            position_scope,
            rule_set_id: rule_set_id.to_string(),
            status: ScheduleStatus::Draft,
            revision: 0,
            confidence: None,
            warnings: vec![],
            suggestions: vec![],
            confirm_comment: None,
            confirmed_by: None,
            confirmed_at: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.schedule_repo.create(&schedule)?;

        self.log_action(
            ActionLog::new(
                uuid::Uuid::new_v4().to_string(),
                Some(schedule.schedule_id.clone()),
                ActionType::ScheduleCreate,
                created_by.to_string(),
            )
            .with_payload(&serde_json::json!({
                "period_start": period_start.to_string(),
                "period_end": period_end.to_string(),
                "rule_set_id": rule_set_id,
                "positions": schedule.position_scope,
            })),
        );

        info!(schedule_id = %schedule.schedule_id, "排班表已创建");
        Ok(schedule)
    }

    /// 查询排班表详情(含全部班次)
    pub fn get_schedule(&self, schedule_id: &str) -> ApiResult<ScheduleDetail> {
        let schedule = self.load_schedule(schedule_id)?;
        let assignments = self.assignment_repo.find_by_schedule(schedule_id)?;
        Ok(ScheduleDetail {
            schedule,
            assignments,
        })
    }

    /// 查询排班表列表(可按状态过滤,新建在前)
    pub fn list_schedules(&self, status: Option<ScheduleStatus>) -> ApiResult<Vec<Schedule>> {
        let schedules = match status {
            Some(s) => self.schedule_repo.find_by_status(s)?,
            None => self.schedule_repo.find_all()?,
        };
        Ok(schedules)
    }

    // ==========================================
    // 生成运行
    // ==========================================

    /// 发起一次生成运行
    ///
    /// 同表已有运行时旧运行被顶替;提交前复核本运行仍为当前,
    /// 落库以乐观锁兜底,被顶替的运行不会留下半套班次。
    pub async fn generate(&self, schedule_id: &str, actor: &str) -> ApiResult<GenerationSummary> {
        validator::require_non_empty(actor, "操作人")?;

        let mut schedule = self.load_schedule(schedule_id)?;
        LifecycleController::ensure_can_generate(&schedule)?;
        let prior_status = schedule.status;

        let handle = self.run_registry.begin(schedule_id);

        // 进入 GENERATING;并发的状态写入在这里被乐观锁挡下
        schedule.status = ScheduleStatus::Generating;
        self.schedule_repo.update(&schedule)?;
        schedule.revision += 1;

        // 输入快照
        let employees = self.employee_repo.find_all(true)?;
        let entries = self
            .employee_repo
            .find_availability_in_period(schedule.period_start, schedule.period_end)?;
        let detail = self.load_rule_set_detail(&schedule.rule_set_id)?;

        let now = Utc::now().naive_utc();
        let outcome = match self
            .generator
            .generate(&schedule, &employees, &entries, &detail, &handle.token, now)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.run_registry.finish(&handle);
                self.restore_status(&mut schedule, prior_status);
                if matches!(err, GenerationError::Cancelled) {
                    self.log_action(
                        ActionLog::new(
                            uuid::Uuid::new_v4().to_string(),
                            Some(schedule_id.to_string()),
                            ActionType::GenerateCancel,
                            actor.to_string(),
                        )
                        .with_detail("生成运行被撤销,排班表回退".to_string()),
                    );
                }
                return Err(err.into());
            }
        };

        // 提交前复核: 被顶替的运行不产出结果
        if !self.run_registry.is_current(&handle) {
            self.restore_status(&mut schedule, prior_status);
            return Err(ApiError::GenerationSuperseded);
        }

        schedule.status = ScheduleStatus::Generated;
        schedule.confidence = Some(outcome.confidence);
        schedule.warnings = outcome.warnings.clone();
        schedule.suggestions = outcome.suggestions.clone();

        if let Err(err) = self
            .schedule_repo
            .commit_generation(&schedule, &outcome.assignments)
        {
            let superseded = matches!(err, RepositoryError::OptimisticLockFailure { .. })
                && !self.run_registry.is_current(&handle);
            self.run_registry.finish(&handle);
            if superseded {
                return Err(ApiError::GenerationSuperseded);
            }
            return Err(err.into());
        }
        schedule.revision += 1;
        self.run_registry.finish(&handle);

        self.cache_coverage(schedule_id, outcome.coverage.clone());

        self.log_action(
            ActionLog::new(
                uuid::Uuid::new_v4().to_string(),
                Some(schedule_id.to_string()),
                ActionType::Generate,
                actor.to_string(),
            )
            .with_payload(&serde_json::json!({
                "assignment_count": outcome.assignments.len(),
                "confidence": outcome.confidence,
                "warning_count": outcome.warnings.len(),
            })),
        );
        self.publish_event(ScheduleEvent::full_scope(
            schedule_id.to_string(),
            ScheduleEventType::ScheduleGenerated,
            Some("ScheduleApi::generate".to_string()),
        ));

        info!(
            schedule_id = %schedule_id,
            assignments = outcome.assignments.len(),
            confidence = outcome.confidence,
            "生成运行提交完成"
        );
        Ok(GenerationSummary {
            schedule_id: schedule_id.to_string(),
            revision: schedule.revision,
            assignment_count: outcome.assignments.len(),
            confidence: outcome.confidence,
            coverage: outcome.coverage.summary(),
            warnings: outcome.warnings,
            suggestions: outcome.suggestions,
        })
    }

    /// 撤销进行中的生成运行
    ///
    /// # 返回
    /// - Ok(true): 已向当前运行发出撤销
    /// - Ok(false): 该表没有进行中的运行
    pub fn cancel_generation(&self, schedule_id: &str, actor: &str) -> ApiResult<bool> {
        validator::require_non_empty(actor, "操作人")?;

        let cancelled = self.run_registry.cancel(schedule_id);
        if cancelled {
            self.log_action(
                ActionLog::new(
                    uuid::Uuid::new_v4().to_string(),
                    Some(schedule_id.to_string()),
                    ActionType::GenerateCancel,
                    actor.to_string(),
                )
                .with_detail("显式撤销生成运行".to_string()),
            );
        }
        Ok(cancelled)
    }

    // ==========================================
    // 手工编辑
    // ==========================================

    /// 手工编辑单条班次(新增/改写/删除)
    ///
    /// 硬约束违规整体拒绝;软约束退化作为警告随编辑同事务落库。
    /// 首次编辑使 GENERATED 进入 ADJUSTING。
    pub async fn apply_edit(
        &self,
        schedule_id: &str,
        expected_revision: i32,
        edit: AssignmentEdit,
        actor: &str,
    ) -> ApiResult<EditSummary> {
        validator::require_non_empty(actor, "操作人")?;

        let mut schedule = self.load_schedule(schedule_id)?;
        if schedule.revision != expected_revision {
            return Err(ApiError::ConflictError {
                schedule_id: schedule_id.to_string(),
                expected: expected_revision,
                actual: schedule.revision,
            });
        }
        LifecycleController::ensure_editable(&schedule)?;

        let employee = self
            .employee_repo
            .find_by_id(edit.employee_id())?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Employee(id={})不存在", edit.employee_id()))
            })?;
        let employees = self.employee_repo.find_all(true)?;
        let entries = self
            .employee_repo
            .find_availability_in_period(schedule.period_start, schedule.period_end)?;
        let detail = self.load_rule_set_detail(&schedule.rule_set_id)?;

        let now = Utc::now().naive_utc();
        let matrix = AvailabilityStore::new()
            .normalize(
                &employees,
                &entries,
                schedule.period_start,
                schedule.period_end,
                now,
            )
            .map_err(ApiError::ValidationError)?;
        let rule_engine = self.build_rule_engine(&detail).await?;
        let assignments = self.assignment_repo.find_by_schedule(schedule_id)?;

        let outcome = EditRevalidator::revalidate(
            &schedule,
            &employee,
            &matrix,
            &rule_engine,
            &assignments,
            &edit,
            now,
        )?;

        LifecycleController::mark_adjusting(&mut schedule);
        for w in &outcome.soft_warnings {
            if !schedule.warnings.contains(w) {
                schedule.warnings.push(w.clone());
            }
        }
        for s in &outcome.suggestions {
            if !schedule.suggestions.contains(s) {
                schedule.suggestions.push(s.clone());
            }
        }

        // 排班表状态/警告与班次变更同事务落库
        match &outcome.new {
            Some(assignment) => self
                .schedule_repo
                .upsert_assignment_with_revision(&schedule, assignment)?,
            None => self.schedule_repo.remove_assignment_with_revision(
                &schedule,
                edit.employee_id(),
                edit.work_date(),
            )?,
        }
        schedule.revision += 1;

        // 覆盖报告增量修补
        let mut edited_all: Vec<ShiftAssignment> = assignments
            .into_iter()
            .filter(|a| {
                !(a.employee_id == edit.employee_id() && a.work_date == edit.work_date())
            })
            .collect();
        if let Some(assignment) = &outcome.new {
            edited_all.push(assignment.clone());
        }
        self.patch_coverage(&schedule, &detail, &outcome.affected_slots, &edited_all)?;

        self.log_action(
            ActionLog::new(
                uuid::Uuid::new_v4().to_string(),
                Some(schedule_id.to_string()),
                ActionType::AssignmentEdit,
                actor.to_string(),
            )
            .with_payload(&edit),
        );
        let positions: Vec<String> = {
            let mut p: Vec<String> = outcome
                .affected_slots
                .iter()
                .map(|(_, position, _)| position.clone())
                .collect();
            p.sort();
            p.dedup();
            p
        };
        self.publish_event(ScheduleEvent::incremental(
            schedule_id.to_string(),
            ScheduleEventType::AssignmentEdited,
            Some("ScheduleApi::apply_edit".to_string()),
            if positions.is_empty() {
                None
            } else {
                Some(positions)
            },
            Some((edit.work_date(), edit.work_date())),
        ));

        info!(
            schedule_id = %schedule_id,
            employee_id = %edit.employee_id(),
            affected = outcome.affected_slots.len(),
            "手工编辑落库完成"
        );
        Ok(EditSummary {
            schedule_id: schedule_id.to_string(),
            revision: schedule.revision,
            status: schedule.status,
            affected_slots: outcome.affected_slots.len(),
            soft_warnings: outcome.soft_warnings,
        })
    }

    // ==========================================
    // 确认 / 撤销确认 / 归档
    // ==========================================

    /// 确认排班表(需非空备注,空排班表不允许确认)
    pub fn confirm(
        &self,
        schedule_id: &str,
        expected_revision: i32,
        comment: &str,
        actor: &str,
    ) -> ApiResult<Schedule> {
        validator::require_non_empty(actor, "操作人")?;

        let mut schedule = self.load_schedule(schedule_id)?;
        self.ensure_revision(&schedule, expected_revision)?;

        let count = self.assignment_repo.count_by_schedule(schedule_id)?;
        let now = Utc::now().naive_utc();
        LifecycleController::confirm(&mut schedule, count as usize, comment, actor, now)?;

        self.schedule_repo.update(&schedule)?;
        schedule.revision += 1;

        self.log_action(
            ActionLog::new(
                uuid::Uuid::new_v4().to_string(),
                Some(schedule_id.to_string()),
                ActionType::Confirm,
                actor.to_string(),
            )
            .with_detail(comment.trim().to_string()),
        );
        self.publish_event(ScheduleEvent::full_scope(
            schedule_id.to_string(),
            ScheduleEventType::ScheduleConfirmed,
            Some("ScheduleApi::confirm".to_string()),
        ));
        Ok(schedule)
    }

    /// 撤销确认(CONFIRMED -> ADJUSTING,清空确认信息)
    pub fn unconfirm(
        &self,
        schedule_id: &str,
        expected_revision: i32,
        actor: &str,
    ) -> ApiResult<Schedule> {
        validator::require_non_empty(actor, "操作人")?;

        let mut schedule = self.load_schedule(schedule_id)?;
        self.ensure_revision(&schedule, expected_revision)?;
        LifecycleController::unconfirm(&mut schedule)?;

        self.schedule_repo.update(&schedule)?;
        schedule.revision += 1;

        self.log_action(ActionLog::new(
            uuid::Uuid::new_v4().to_string(),
            Some(schedule_id.to_string()),
            ActionType::Unconfirm,
            actor.to_string(),
        ));
        self.publish_event(ScheduleEvent::full_scope(
            schedule_id.to_string(),
            ScheduleEventType::ScheduleUnconfirmed,
            Some("ScheduleApi::unconfirm".to_string()),
        ));
        Ok(schedule)
    }

    /// 归档排班表(终态)
    pub fn archive(
        &self,
        schedule_id: &str,
        expected_revision: i32,
        actor: &str,
    ) -> ApiResult<Schedule> {
        validator::require_non_empty(actor, "操作人")?;

        let mut schedule = self.load_schedule(schedule_id)?;
        self.ensure_revision(&schedule, expected_revision)?;
        LifecycleController::archive(&mut schedule)?;

        self.schedule_repo.update(&schedule)?;
        schedule.revision += 1;

        self.log_action(ActionLog::new(
            uuid::Uuid::new_v4().to_string(),
            Some(schedule_id.to_string()),
            ActionType::Archive,
            actor.to_string(),
        ));
        self.publish_event(ScheduleEvent::full_scope(
            schedule_id.to_string(),
            ScheduleEventType::ScheduleArchived,
            Some("ScheduleApi::archive".to_string()),
        ));
        Ok(schedule)
    }

    // ==========================================
    // 覆盖查询
    // ==========================================

    /// 查询覆盖报告(缓存优先,缺失时按当前班次全量重建)
    pub fn get_coverage_report(&self, schedule_id: &str) -> ApiResult<CoverageReport> {
        {
            let cache = self
                .coverage_cache
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if let Some(report) = cache.get(schedule_id) {
                return Ok(report.clone());
            }
        }

        let schedule = self.load_schedule(schedule_id)?;
        let detail = self.load_rule_set_detail(&schedule.rule_set_id)?;
        let plan = self.resolve_plan(&schedule, &detail)?;
        let assignments = self.assignment_repo.find_by_schedule(schedule_id)?;
        let report =
            CoverageBuilder::build(schedule_id, &assignments, &plan, Utc::now().naive_utc());
        self.cache_coverage(schedule_id, report.clone());
        Ok(report)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load_schedule(&self, schedule_id: &str) -> ApiResult<Schedule> {
        self.schedule_repo
            .find_by_id(schedule_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Schedule(id={})不存在", schedule_id)))
    }

    fn load_rule_set_detail(&self, rule_set_id: &str) -> ApiResult<RuleSetDetail> {
        self.rule_set_repo
            .find_detail(rule_set_id)?
            .ok_or_else(|| ApiError::NotFound(format!("RuleSet(id={})不存在", rule_set_id)))
    }

    fn ensure_revision(&self, schedule: &Schedule, expected: i32) -> ApiResult<()> {
        if schedule.revision != expected {
            return Err(ApiError::ConflictError {
                schedule_id: schedule.schedule_id.clone(),
                expected,
                actual: schedule.revision,
            });
        }
        Ok(())
    }

    fn resolve_plan(
        &self,
        schedule: &Schedule,
        detail: &RuleSetDetail,
    ) -> ApiResult<RequirementPlan> {
        RequirementResolver::new()
            .resolve(
                &detail.rule_set,
                &detail.requirements,
                &schedule.position_scope,
                &schedule.period_dates(),
            )
            .map_err(ApiError::ConfigurationError)
    }

    /// 硬约束参数解析: 规则集覆盖优先于系统默认
    async fn build_rule_engine(&self, detail: &RuleSetDetail) -> ApiResult<RuleEngine> {
        let rest_hours = match detail.rule_set.rest_hours {
            Some(v) => v,
            None => self
                .config_manager
                .get_min_rest_hours()
                .await
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
        };
        let max_consecutive = match detail.rule_set.consecutive_day_limit {
            Some(v) => v.max(1) as u32,
            None => self
                .config_manager
                .get_max_consecutive_days()
                .await
                .map_err(|e| ApiError::InternalError(e.to_string()))?
                .max(1) as u32,
        };
        Ok(RuleEngine::new(
            rest_hours,
            max_consecutive,
            detail.rules.clone(),
        ))
    }

    /// 生成失败后将排班表回退到发起前状态(被顶替时回退可能落空,只告警)
    fn restore_status(&self, schedule: &mut Schedule, prior: ScheduleStatus) {
        schedule.status = prior;
        match self.schedule_repo.update(schedule) {
            Ok(()) => schedule.revision += 1,
            Err(err) => {
                warn!(
                    schedule_id = %schedule.schedule_id,
                    error = %err,
                    "生成失败后状态回退未生效(可能已被并发写入覆盖)"
                );
            }
        }
    }

    fn cache_coverage(&self, schedule_id: &str, report: CoverageReport) {
        let mut cache = self
            .coverage_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        cache.insert(schedule_id.to_string(), report);
    }

    /// 编辑后只修补受影响槽位;缓存缺失时退回全量重建
    fn patch_coverage(
        &self,
        schedule: &Schedule,
        detail: &RuleSetDetail,
        affected: &[(NaiveDate, String, u8)],
        assignments: &[ShiftAssignment],
    ) -> ApiResult<()> {
        let plan = self.resolve_plan(schedule, detail)?;
        let now = Utc::now().naive_utc();

        let mut cache = self
            .coverage_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match cache.get_mut(&schedule.schedule_id) {
            Some(report) => CoverageBuilder::patch(report, affected, assignments, &plan, now),
            None => {
                let report =
                    CoverageBuilder::build(&schedule.schedule_id, assignments, &plan, now);
                cache.insert(schedule.schedule_id.clone(), report);
            }
        }
        Ok(())
    }

    /// 审计写入失败不回滚已提交的业务写入
    fn log_action(&self, log: ActionLog) {
        if let Err(err) = self.action_log_repo.insert(&log) {
            warn!(action_type = %log.action_type, error = %err, "操作日志写入失败");
        }
    }

    fn publish_event(&self, event: ScheduleEvent) {
        if let Err(err) = self.event_publisher.publish(event) {
            warn!(error = %err, "排班事件发布失败");
        }
    }
}
