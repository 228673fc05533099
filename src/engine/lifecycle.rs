// ==========================================
// 餐饮门店排班系统 - 生命周期控制 (Lifecycle Controller)
// ==========================================
// 状态机: DRAFT -> GENERATING -> GENERATED -> ADJUSTING -> CONFIRMED -> ARCHIVED
//         CONFIRMED --撤销确认--> ADJUSTING
// 红线: 确认必须携带非空备注;已确认/已归档禁止任何写入;归档只能显式触发
// ==========================================

use crate::domain::schedule::Schedule;
use crate::domain::types::ScheduleStatus;
use chrono::NaiveDateTime;
use tracing::info;

// ==========================================
// LifecycleViolation - 状态机违规
// ==========================================
#[derive(Debug, Clone, thiserror::Error)]
#[error("排班表 {schedule_id} 处于 {state} 状态,不允许 {operation}: {reason}")]
pub struct LifecycleViolation {
    pub schedule_id: String,
    pub state: ScheduleStatus,
    pub operation: String,
    pub reason: String,
}

impl LifecycleViolation {
    fn new(schedule: &Schedule, operation: &str, reason: &str) -> Self {
        Self {
            schedule_id: schedule.schedule_id.clone(),
            state: schedule.status,
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}

// ==========================================
// LifecycleController - 纯状态机守卫与迁移
// ==========================================
// 落库由 API 层携带乐观锁完成,这里只做内存态校验与改写
pub struct LifecycleController;

impl LifecycleController {
    /// 生成守卫: DRAFT / GENERATED / ADJUSTING 可发起
    pub fn ensure_can_generate(schedule: &Schedule) -> Result<(), LifecycleViolation> {
        if !schedule.status.can_generate() {
            return Err(LifecycleViolation::new(
                schedule,
                "发起生成",
                "仅 DRAFT/GENERATED/ADJUSTING 状态可发起生成",
            ));
        }
        Ok(())
    }

    /// 编辑守卫: GENERATED / ADJUSTING 可编辑
    pub fn ensure_editable(schedule: &Schedule) -> Result<(), LifecycleViolation> {
        if !schedule.status.is_editable() {
            return Err(LifecycleViolation::new(
                schedule,
                "编辑班次",
                "仅 GENERATED/ADJUSTING 状态可编辑",
            ));
        }
        Ok(())
    }

    /// 首次手工编辑后 GENERATED -> ADJUSTING(已是 ADJUSTING 保持不变)
    pub fn mark_adjusting(schedule: &mut Schedule) {
        if schedule.status == ScheduleStatus::Generated {
            schedule.status = ScheduleStatus::Adjusting;
        }
    }

    /// 确认: 需非空备注 + 至少一条班次
    pub fn confirm(
        schedule: &mut Schedule,
        assignment_count: usize,
        comment: &str,
        confirmed_by: &str,
        now: NaiveDateTime,
    ) -> Result<(), LifecycleViolation> {
        if !schedule.status.can_confirm() {
            return Err(LifecycleViolation::new(
                schedule,
                "确认",
                "仅 GENERATED/ADJUSTING 状态可确认",
            ));
        }
        let trimmed = comment.trim();
        if trimmed.is_empty() {
            return Err(LifecycleViolation::new(
                schedule,
                "确认",
                "确认备注不能为空",
            ));
        }
        if assignment_count == 0 {
            return Err(LifecycleViolation::new(
                schedule,
                "确认",
                "空排班表不允许确认",
            ));
        }

        schedule.status = ScheduleStatus::Confirmed;
        schedule.confirm_comment = Some(trimmed.to_string());
        schedule.confirmed_by = Some(confirmed_by.to_string());
        schedule.confirmed_at = Some(now);
        info!(schedule_id = %schedule.schedule_id, confirmed_by = %confirmed_by, "排班表已确认");
        Ok(())
    }

    /// 撤销确认: CONFIRMED -> ADJUSTING,清空确认三元组
    pub fn unconfirm(schedule: &mut Schedule) -> Result<(), LifecycleViolation> {
        if schedule.status != ScheduleStatus::Confirmed {
            return Err(LifecycleViolation::new(
                schedule,
                "撤销确认",
                "仅 CONFIRMED 状态可撤销确认",
            ));
        }
        schedule.status = ScheduleStatus::Adjusting;
        schedule.confirm_comment = None;
        schedule.confirmed_by = None;
        schedule.confirmed_at = None;
        info!(schedule_id = %schedule.schedule_id, "已撤销确认,回到调整中");
        Ok(())
    }

    /// 归档: 任意非归档、非生成中状态可显式归档,归档为终态
    pub fn archive(schedule: &mut Schedule) -> Result<(), LifecycleViolation> {
        match schedule.status {
            ScheduleStatus::Archived => Err(LifecycleViolation::new(
                schedule,
                "归档",
                "已归档为终态,不可重复归档",
            )),
            ScheduleStatus::Generating => Err(LifecycleViolation::new(
                schedule,
                "归档",
                "生成中的排班表需先撤销生成",
            )),
            _ => {
                schedule.status = ScheduleStatus::Archived;
                info!(schedule_id = %schedule.schedule_id, "排班表已归档");
                Ok(())
            }
        }
    }
}
