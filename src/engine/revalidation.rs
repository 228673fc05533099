// ==========================================
// 餐饮门店排班系统 - 编辑重校验 (Edit Revalidation)
// ==========================================
// 职责: 单条班次编辑的输入校验 + 被编辑员工的硬约束重跑 + 软约束退化提示
// 红线: 硬约束违规整单拒绝,不落任何变更;软约束退化只记警告不阻断
// 口径: 只对被编辑员工重跑硬约束;覆盖只修补受影响槽位
// ==========================================

use crate::domain::employee::Employee;
use crate::domain::schedule::{Schedule, ShiftAssignment};
use crate::domain::types::AssignmentSource;
use crate::engine::availability::AvailabilityMatrix;
use crate::engine::coverage::CoverageBuilder;
use crate::engine::rules::{RuleEngine, RuleViolation};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ==========================================
// AssignmentEdit - 编辑请求
// ==========================================
// 同一 (员工, 日期) 至多一条班次,Upsert 覆盖当日旧班次
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentEdit {
    Upsert {
        employee_id: String,
        work_date: NaiveDate,
        position: String,
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
    Remove {
        employee_id: String,
        work_date: NaiveDate,
    },
}

impl AssignmentEdit {
    pub fn employee_id(&self) -> &str {
        match self {
            AssignmentEdit::Upsert { employee_id, .. } => employee_id,
            AssignmentEdit::Remove { employee_id, .. } => employee_id,
        }
    }

    pub fn work_date(&self) -> NaiveDate {
        match self {
            AssignmentEdit::Upsert { work_date, .. } => *work_date,
            AssignmentEdit::Remove { work_date, .. } => *work_date,
        }
    }
}

// ==========================================
// EditRejection / EditOutcome
// ==========================================
#[derive(Debug)]
pub enum EditRejection {
    /// 输入不合法(周期外日期、范围外岗位、非法时间段、删除不存在的班次)
    Invalid(String),
    /// 硬约束违规,整单拒绝
    HardViolations(Vec<RuleViolation>),
}

#[derive(Debug)]
pub struct EditOutcome {
    pub old: Option<ShiftAssignment>,
    pub new: Option<ShiftAssignment>,
    /// 覆盖报告需要修补的槽位(旧/新覆盖小时对称差)
    pub affected_slots: Vec<(NaiveDate, String, u8)>,
    /// 编辑引入的软约束退化(追加到排班表警告)
    pub soft_warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

// ==========================================
// EditRevalidator - 重校验引擎
// ==========================================
pub struct EditRevalidator;

impl EditRevalidator {
    /// 输入形状校验: 周期、岗位范围、时间段
    pub fn validate_input(schedule: &Schedule, edit: &AssignmentEdit) -> Result<(), String> {
        if !schedule.contains_date(edit.work_date()) {
            return Err(format!(
                "日期 {} 不在排班周期 {}..{} 内",
                edit.work_date(),
                schedule.period_start,
                schedule.period_end
            ));
        }
        if let AssignmentEdit::Upsert {
            position,
            start_time,
            end_time,
            ..
        } = edit
        {
            if !schedule.in_scope(position) {
                return Err(format!("岗位 {} 不在本表岗位范围内", position));
            }
            if !ShiftAssignment::valid_span(*start_time, *end_time) {
                return Err(format!(
                    "班次时间段非法(start >= end): {}..{}",
                    start_time, end_time
                ));
            }
        }
        Ok(())
    }

    /// 编辑重校验
    ///
    /// # 参数
    /// - schedule_assignments: 编辑前的全表班次
    ///
    /// # 返回
    /// - Ok(EditOutcome): 可落库,携带覆盖修补槽位与软约束退化
    /// - Err(EditRejection): 输入不合法或硬约束违规,调用方不得落任何变更
    pub fn revalidate(
        schedule: &Schedule,
        employee: &Employee,
        matrix: &AvailabilityMatrix,
        rule_engine: &RuleEngine,
        schedule_assignments: &[ShiftAssignment],
        edit: &AssignmentEdit,
        now: NaiveDateTime,
    ) -> Result<EditOutcome, EditRejection> {
        Self::validate_input(schedule, edit).map_err(EditRejection::Invalid)?;

        let old = schedule_assignments
            .iter()
            .find(|a| a.employee_id == edit.employee_id() && a.work_date == edit.work_date())
            .cloned();

        let new = match edit {
            AssignmentEdit::Upsert {
                employee_id,
                work_date,
                position,
                start_time,
                end_time,
            } => Some(ShiftAssignment {
                schedule_id: schedule.schedule_id.clone(),
                employee_id: employee_id.clone(),
                work_date: *work_date,
                position: position.clone(),
                start_time: *start_time,
                end_time: *end_time,
                source: AssignmentSource::Manual,
                created_at: old.as_ref().map(|a| a.created_at).unwrap_or(now),
                updated_at: now,
            }),
            AssignmentEdit::Remove { employee_id, .. } => {
                if old.is_none() {
                    return Err(EditRejection::Invalid(format!(
                        "员工 {} 在 {} 没有班次可删除",
                        employee_id,
                        edit.work_date()
                    )));
                }
                None
            }
        };

        // 编辑后的全表与本人班次集合
        let mut edited_all: Vec<ShiftAssignment> = schedule_assignments
            .iter()
            .filter(|a| {
                !(a.employee_id == edit.employee_id() && a.work_date == edit.work_date())
            })
            .cloned()
            .collect();
        if let Some(n) = &new {
            edited_all.push(n.clone());
        }
        let edited_own: Vec<ShiftAssignment> = edited_all
            .iter()
            .filter(|a| a.employee_id == edit.employee_id())
            .cloned()
            .collect();

        // 硬约束: 只对被编辑员工重跑
        let violations =
            rule_engine.evaluate_employee_hard(employee, matrix, &edited_own, &edited_all);
        if !violations.is_empty() {
            info!(
                schedule_id = %schedule.schedule_id,
                employee_id = %edit.employee_id(),
                violations = violations.len(),
                "编辑被硬约束拒绝"
            );
            return Err(EditRejection::HardViolations(violations));
        }

        // 软约束退化: 只关注被编辑员工引入的违规
        let soft = rule_engine.evaluate_soft(matrix, &edited_all);
        let soft_warnings: Vec<String> = soft
            .violations
            .iter()
            .filter(|v| v.employee_id == edit.employee_id())
            .map(|v| format!("手工编辑引入软约束退化: {}", v.detail))
            .collect();

        let affected_slots = CoverageBuilder::affected_slots(old.as_ref(), new.as_ref());
        debug!(
            employee_id = %edit.employee_id(),
            affected = affected_slots.len(),
            soft_warnings = soft_warnings.len(),
            "编辑重校验通过"
        );

        Ok(EditOutcome {
            old,
            new,
            affected_slots,
            soft_warnings,
            suggestions: soft.suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::employee::AvailabilityEntry;
    use crate::domain::types::{AvailabilityStatus, ScheduleStatus};
    use crate::engine::availability::AvailabilityStore;
    use crate::engine::rules::violation_codes;
    use chrono::Utc;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn schedule() -> Schedule {
        let now = Utc::now().naive_utc();
        Schedule {
            schedule_id: "S1".to_string(),
            period_start: d(1),
            period_end: d(28),
            position_scope: vec!["hall".to_string()],
            rule_set_id: "RS1".to_string(),
            status: ScheduleStatus::Generated,
            revision: 1,
            confidence: None,
            warnings: vec![],
            suggestions: vec![],
            confirm_comment: None,
            confirmed_by: None,
            confirmed_at: None,
            created_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn employee(id: &str) -> Employee {
        let now = Utc::now().naive_utc();
        Employee {
            employee_id: id.to_string(),
            display_name: id.to_string(),
            eligible_positions: vec!["hall".to_string()],
            monthly_hour_cap: 160.0,
            max_off_requests: 4,
            active: true,
            hire_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            contract_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn matrix(entries: Vec<AvailabilityEntry>) -> AvailabilityMatrix {
        AvailabilityStore::new()
            .normalize(
                &[employee("E001")],
                &entries,
                d(1),
                d(28),
                Utc::now().naive_utc(),
            )
            .unwrap()
    }

    fn assignment(day: u32, start: u32, end: u32) -> ShiftAssignment {
        let now = Utc::now().naive_utc();
        ShiftAssignment {
            schedule_id: "S1".to_string(),
            employee_id: "E001".to_string(),
            work_date: d(day),
            position: "hall".to_string(),
            start_time: t(start),
            end_time: t(end),
            source: AssignmentSource::Generated,
            created_at: now,
            updated_at: now,
        }
    }

    fn upsert(day: u32, start: u32, end: u32) -> AssignmentEdit {
        AssignmentEdit::Upsert {
            employee_id: "E001".to_string(),
            work_date: d(day),
            position: "hall".to_string(),
            start_time: t(start),
            end_time: t(end),
        }
    }

    fn engine() -> RuleEngine {
        RuleEngine::new(11.0, 6, vec![])
    }

    #[test]
    fn test_input_validation() {
        let s = schedule();
        // 周期外日期
        let edit = AssignmentEdit::Upsert {
            employee_id: "E001".to_string(),
            work_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            position: "hall".to_string(),
            start_time: t(9),
            end_time: t(17),
        };
        assert!(EditRevalidator::validate_input(&s, &edit).is_err());

        // 范围外岗位
        let edit = AssignmentEdit::Upsert {
            employee_id: "E001".to_string(),
            work_date: d(5),
            position: "kitchen".to_string(),
            start_time: t(9),
            end_time: t(17),
        };
        assert!(EditRevalidator::validate_input(&s, &edit).is_err());

        // 非法时间段
        assert!(EditRevalidator::validate_input(&s, &upsert(5, 17, 9)).is_err());
        // 合法
        assert!(EditRevalidator::validate_input(&s, &upsert(5, 9, 17)).is_ok());
    }

    #[test]
    fn test_hard_violation_rejects_whole_edit() {
        let m = matrix(vec![AvailabilityEntry {
            employee_id: "E001".to_string(),
            work_date: d(5),
            status: AvailabilityStatus::Ng,
            preferred_start: None,
            preferred_end: None,
            note: None,
            submitted_at: Utc::now().naive_utc(),
        }]);

        let err = EditRevalidator::revalidate(
            &schedule(),
            &employee("E001"),
            &m,
            &engine(),
            &[],
            &upsert(5, 9, 17),
            Utc::now().naive_utc(),
        )
        .unwrap_err();

        match err {
            EditRejection::HardViolations(v) => {
                assert!(v.iter().any(|x| x.code == violation_codes::NG_DAY_ASSIGNED));
            }
            other => panic!("应为硬约束拒绝: {:?}", other),
        }
    }

    #[test]
    fn test_rest_violation_on_edit() {
        // 已有 2/5 14-22 班;编辑加 2/6 7-15 班 -> 休息 9h 不足
        let m = matrix(vec![]);
        let existing = vec![assignment(5, 14, 22)];

        let err = EditRevalidator::revalidate(
            &schedule(),
            &employee("E001"),
            &m,
            &engine(),
            &existing,
            &upsert(6, 7, 15),
            Utc::now().naive_utc(),
        )
        .unwrap_err();
        assert!(matches!(err, EditRejection::HardViolations(_)));
    }

    #[test]
    fn test_successful_edit_yields_affected_slots() {
        let m = matrix(vec![]);
        let existing = vec![assignment(5, 9, 12)];

        let outcome = EditRevalidator::revalidate(
            &schedule(),
            &employee("E001"),
            &m,
            &engine(),
            &existing,
            &upsert(5, 9, 14),
            Utc::now().naive_utc(),
        )
        .unwrap();

        let hours: Vec<u8> = outcome.affected_slots.iter().map(|(_, _, h)| *h).collect();
        assert_eq!(hours, vec![12, 13], "只有延长的两小时受影响");
        assert_eq!(outcome.new.as_ref().unwrap().source, AssignmentSource::Manual);
        assert!(outcome.old.is_some());
    }

    #[test]
    fn test_soft_degradation_recorded_not_blocking() {
        // 期望窗 9-12,编辑到 9-17 -> 越窗为软约束退化,不阻断
        let m = matrix(vec![AvailabilityEntry {
            employee_id: "E001".to_string(),
            work_date: d(5),
            status: AvailabilityStatus::Ok,
            preferred_start: Some(t(9)),
            preferred_end: Some(t(12)),
            note: None,
            submitted_at: Utc::now().naive_utc(),
        }]);

        let outcome = EditRevalidator::revalidate(
            &schedule(),
            &employee("E001"),
            &m,
            &engine(),
            &[],
            &upsert(5, 9, 17),
            Utc::now().naive_utc(),
        )
        .unwrap();
        assert!(
            !outcome.soft_warnings.is_empty(),
            "越窗应记软约束退化警告"
        );
    }

    #[test]
    fn test_remove_nonexistent_rejected() {
        let m = matrix(vec![]);
        let err = EditRevalidator::revalidate(
            &schedule(),
            &employee("E001"),
            &m,
            &engine(),
            &[],
            &AssignmentEdit::Remove {
                employee_id: "E001".to_string(),
                work_date: d(5),
            },
            Utc::now().naive_utc(),
        )
        .unwrap_err();
        assert!(matches!(err, EditRejection::Invalid(_)));

        // 正常删除
        let outcome = EditRevalidator::revalidate(
            &schedule(),
            &employee("E001"),
            &m,
            &engine(),
            &[assignment(5, 9, 12)],
            &AssignmentEdit::Remove {
                employee_id: "E001".to_string(),
                work_date: d(5),
            },
            Utc::now().naive_utc(),
        )
        .unwrap();
        assert!(outcome.new.is_none());
        assert_eq!(outcome.affected_slots.len(), 3);
    }
}
