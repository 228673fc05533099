// ==========================================
// 餐饮门店排班系统 - 规则引擎 (Rule Engine)
// ==========================================
// 职责: 内置硬约束 + 结构化自定义规则的判定,输出带原因码的违规列表
// 红线: 硬约束违规绝不降级为警告;所有判定必须输出 reason
// 内置硬约束(无视规则集永远生效):
//   (a) NG 日不排班  (b) 岗位不在可上岗集合不排班  (c) 月度工时上限
//   (d) 班次间最小休息时长  (e) 连续工作天数上限
// ==========================================

use crate::domain::employee::Employee;
use crate::domain::rule::{RuleBody, SchedulingRule};
use crate::domain::schedule::ShiftAssignment;
use crate::domain::types::{
    end_minutes, start_minutes, AvailabilityStatus, ViolationSeverity,
};
use crate::engine::availability::AvailabilityMatrix;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

// ==========================================
// 违规原因码 (ALL-CAPS)
// ==========================================
pub mod violation_codes {
    // 内置硬约束
    pub const NG_DAY_ASSIGNED: &str = "NG_DAY_ASSIGNED";
    pub const POSITION_NOT_ELIGIBLE: &str = "POSITION_NOT_ELIGIBLE";
    pub const NOT_EMPLOYED: &str = "NOT_EMPLOYED";
    pub const MONTHLY_HOUR_CAP_EXCEEDED: &str = "MONTHLY_HOUR_CAP_EXCEEDED";
    pub const MIN_REST_VIOLATED: &str = "MIN_REST_VIOLATED";
    pub const CONSECUTIVE_DAYS_EXCEEDED: &str = "CONSECUTIVE_DAYS_EXCEEDED";

    // 结构化自定义规则
    pub const PAIRING_UNMET: &str = "PAIRING_UNMET";
    pub const AVOIDANCE_HIT: &str = "AVOIDANCE_HIT";
    pub const CUSTOM_CONSECUTIVE_CAP: &str = "CUSTOM_CONSECUTIVE_CAP";

    // 软约束(偏好)
    pub const PREFERENCE_MISMATCH: &str = "PREFERENCE_MISMATCH";
}

// ==========================================
// RuleViolation - 违规条目
// ==========================================
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuleViolation {
    pub code: String,                  // 原因码 (ALL-CAPS)
    pub severity: ViolationSeverity,   // HARD / SOFT
    pub employee_id: String,           // 涉及员工
    pub work_date: Option<NaiveDate>,  // 涉及日期
    pub detail: String,                // 可读描述
}

impl RuleViolation {
    fn hard(code: &str, employee_id: &str, work_date: Option<NaiveDate>, detail: String) -> Self {
        Self {
            code: code.to_string(),
            severity: ViolationSeverity::Hard,
            employee_id: employee_id.to_string(),
            work_date,
            detail,
        }
    }

    fn soft(code: &str, employee_id: &str, work_date: Option<NaiveDate>, detail: String) -> Self {
        Self {
            code: code.to_string(),
            severity: ViolationSeverity::Soft,
            employee_id: employee_id.to_string(),
            work_date,
            detail,
        }
    }
}

// ==========================================
// SoftEvaluation - 全表软约束评估结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SoftEvaluation {
    pub violations: Vec<RuleViolation>, // 软约束违规
    pub suggestions: Vec<String>,       // 改进建议(含自由文本提示)
    pub checks_total: usize,            // 软判定总数(用于满足率)
}

impl SoftEvaluation {
    /// 软约束满足率: 无判定时记 1.0
    pub fn satisfaction_ratio(&self) -> f64 {
        if self.checks_total == 0 {
            return 1.0;
        }
        let violated = self.violations.len().min(self.checks_total);
        1.0 - violated as f64 / self.checks_total as f64
    }
}

// ==========================================
// RuleEngine - 规则引擎
// ==========================================
// limits 由生成侧解析(规则集覆盖优先于系统默认)后传入
pub struct RuleEngine {
    rest_hours: f64,
    max_consecutive_days: u32,
    rules: Vec<SchedulingRule>,
}

impl RuleEngine {
    /// 创建规则引擎
    ///
    /// # 参数
    /// - rest_hours: 班次间最小休息时长(小时)
    /// - max_consecutive_days: 连续工作天数上限
    /// - rules: 启用的自定义规则(未启用的由调用方过滤)
    pub fn new(rest_hours: f64, max_consecutive_days: u32, rules: Vec<SchedulingRule>) -> Self {
        Self {
            rest_hours,
            max_consecutive_days,
            rules: rules.into_iter().filter(|r| r.active).collect(),
        }
    }

    pub fn rest_hours(&self) -> f64 {
        self.rest_hours
    }

    pub fn max_consecutive_days(&self) -> u32 {
        self.max_consecutive_days
    }

    /// 启用中的自定义规则
    pub fn rules(&self) -> &[SchedulingRule] {
        &self.rules
    }

    /// 该员工生效的连续天数上限(系统/规则集默认与强制自定义上限取最严)
    pub fn consecutive_limit_for(&self, employee_id: &str) -> u32 {
        let mut limit = self.max_consecutive_days;
        for rule in &self.rules {
            if let RuleBody::ConsecutiveCap { max_days, .. } = &rule.body {
                if rule.is_hard() && rule.body.applies_to(employee_id) {
                    limit = limit.min(*max_days);
                }
            }
        }
        limit
    }

    /// 强制回避规则是否禁止该员工出现在 (日期, 小时槽)
    pub fn mandatory_avoidance_hit(&self, employee_id: &str, date: NaiveDate, hour: u8) -> bool {
        self.rules.iter().any(|rule| {
            rule.is_hard()
                && matches!(
                    &rule.body,
                    RuleBody::Avoidance { employee_id: e, weekday, hour_from, hour_to }
                        if e == employee_id
                            && weekday.map(|w| w == date.weekday()).unwrap_or(true)
                            && *hour_from <= hour && hour < *hour_to
                )
        })
    }

    // ==========================================
    // 全量硬约束评估(单员工口径)
    // ==========================================

    /// 评估某员工班次集合的全部硬约束
    ///
    /// # 参数
    /// - own: 该员工在本表的全部班次(编辑场景传入编辑后的集合)
    /// - schedule_assignments: 全表班次,用于强制搭档规则
    ///
    /// # 用途
    /// - 编辑重校验(4.5): 只对被编辑员工重跑本函数
    pub fn evaluate_employee_hard(
        &self,
        employee: &Employee,
        matrix: &AvailabilityMatrix,
        own: &[ShiftAssignment],
        schedule_assignments: &[ShiftAssignment],
    ) -> Vec<RuleViolation> {
        let mut violations = Vec::new();
        let employee_id = &employee.employee_id;

        // 按日期排序后逐条检查
        let mut sorted: Vec<&ShiftAssignment> = own.iter().collect();
        sorted.sort_by_key(|a| a.work_date);

        for assignment in &sorted {
            // (a) NG 日
            if matrix.status_of(employee_id, assignment.work_date) == AvailabilityStatus::Ng {
                violations.push(RuleViolation::hard(
                    violation_codes::NG_DAY_ASSIGNED,
                    employee_id,
                    Some(assignment.work_date),
                    format!("{} 已提交 NG,不可排班", assignment.work_date),
                ));
            }

            // (b) 岗位不可上岗
            if !employee.is_eligible_for(&assignment.position) {
                violations.push(RuleViolation::hard(
                    violation_codes::POSITION_NOT_ELIGIBLE,
                    employee_id,
                    Some(assignment.work_date),
                    format!("岗位 {} 不在可上岗集合内", assignment.position),
                ));
            }

            // 在职区间
            if !employee.is_employed_on(assignment.work_date) {
                violations.push(RuleViolation::hard(
                    violation_codes::NOT_EMPLOYED,
                    employee_id,
                    Some(assignment.work_date),
                    format!("{} 不在在职区间内", assignment.work_date),
                ));
            }

            // 强制回避规则
            for hour in assignment.covered_hours() {
                if self.mandatory_avoidance_hit(employee_id, assignment.work_date, hour) {
                    violations.push(RuleViolation::hard(
                        violation_codes::AVOIDANCE_HIT,
                        employee_id,
                        Some(assignment.work_date),
                        format!(
                            "{} {:02}:00 命中强制回避规则",
                            assignment.work_date, hour
                        ),
                    ));
                    break; // 同一班次只报一次
                }
            }
        }

        // (c) 月度工时上限
        let total_hours: f64 = sorted.iter().map(|a| a.duration_hours()).sum();
        if total_hours > employee.monthly_hour_cap + f64::EPSILON {
            violations.push(RuleViolation::hard(
                violation_codes::MONTHLY_HOUR_CAP_EXCEEDED,
                employee_id,
                None,
                format!(
                    "当期工时 {:.1}h 超过上限 {:.1}h",
                    total_hours, employee.monthly_hour_cap
                ),
            ));
        }

        // (d) 班次间最小休息时长
        for pair in sorted.windows(2) {
            let gap_hours = rest_gap_hours(pair[0], pair[1]);
            if gap_hours < self.rest_hours - f64::EPSILON {
                violations.push(RuleViolation::hard(
                    violation_codes::MIN_REST_VIOLATED,
                    employee_id,
                    Some(pair[1].work_date),
                    format!(
                        "{} 班后休息 {:.1}h 不足 {:.1}h",
                        pair[0].work_date, gap_hours, self.rest_hours
                    ),
                ));
            }
        }

        // (e) 连续工作天数上限(含强制自定义上限,取最严)
        let limit = self.consecutive_limit_for(employee_id);
        let dates: Vec<NaiveDate> = sorted.iter().map(|a| a.work_date).collect();
        let longest = max_consecutive_run(&dates);
        if longest > limit {
            let code = if limit < self.max_consecutive_days {
                violation_codes::CUSTOM_CONSECUTIVE_CAP
            } else {
                violation_codes::CONSECUTIVE_DAYS_EXCEEDED
            };
            violations.push(RuleViolation::hard(
                code,
                employee_id,
                None,
                format!("连续工作 {} 天,超过上限 {} 天", longest, limit),
            ));
        }

        // 强制搭档规则: 本人上班的日期,搭档必须有同班(时间交叠)班次
        for rule in &self.rules {
            if !rule.is_hard() {
                continue;
            }
            if let RuleBody::Pairing {
                employee_a,
                employee_b,
            } = &rule.body
            {
                let partner = if employee_a == employee_id {
                    employee_b
                } else if employee_b == employee_id {
                    employee_a
                } else {
                    continue;
                };
                for assignment in &sorted {
                    if !pairing_satisfied(assignment, partner, schedule_assignments) {
                        violations.push(RuleViolation::hard(
                            violation_codes::PAIRING_UNMET,
                            employee_id,
                            Some(assignment.work_date),
                            format!(
                                "{} 与 {} 的强制搭档规则未满足",
                                assignment.work_date, partner
                            ),
                        ));
                    }
                }
            }
        }

        violations
    }

    // ==========================================
    // 全表软约束评估
    // ==========================================

    /// 整表评估软约束,产出违规、建议与判定总数
    ///
    /// # 口径
    /// - 非强制 搭档/回避/连续上限 规则
    /// - 偏好不匹配: 有期望窗但班次越窗,或 MAYBE 状态被排班
    /// - 自由文本规则原样转为建议(不计入判定数)
    pub fn evaluate_soft(
        &self,
        matrix: &AvailabilityMatrix,
        assignments: &[ShiftAssignment],
    ) -> SoftEvaluation {
        let mut eval = SoftEvaluation::default();

        // 按员工聚合,日期有序
        let mut by_employee: BTreeMap<&str, Vec<&ShiftAssignment>> = BTreeMap::new();
        for a in assignments {
            by_employee.entry(a.employee_id.as_str()).or_default().push(a);
        }
        for list in by_employee.values_mut() {
            list.sort_by_key(|a| a.work_date);
        }

        for rule in &self.rules {
            if rule.is_hard() {
                continue; // 强制规则走硬约束路径
            }
            match &rule.body {
                RuleBody::Pairing {
                    employee_a,
                    employee_b,
                } => {
                    // 任一方上班的日期都是一次判定
                    let mut dates: Vec<NaiveDate> = Vec::new();
                    for id in [employee_a.as_str(), employee_b.as_str()] {
                        if let Some(list) = by_employee.get(id) {
                            dates.extend(list.iter().map(|a| a.work_date));
                        }
                    }
                    dates.sort();
                    dates.dedup();

                    for date in dates {
                        eval.checks_total += 1;
                        let a_shift = shift_on(&by_employee, employee_a, date);
                        let b_shift = shift_on(&by_employee, employee_b, date);
                        let satisfied = match (a_shift, b_shift) {
                            (Some(a), Some(b)) => a.overlaps_span(b.start_time, b.end_time),
                            _ => false,
                        };
                        if !satisfied {
                            eval.violations.push(RuleViolation::soft(
                                violation_codes::PAIRING_UNMET,
                                employee_a,
                                Some(date),
                                format!("{} 搭档规则未满足: {}/{}", date, employee_a, employee_b),
                            ));
                            eval.suggestions.push(format!(
                                "建议调整 {} 的班次,使 {} 与 {} 同班",
                                date, employee_a, employee_b
                            ));
                        }
                    }
                }
                RuleBody::Avoidance {
                    employee_id,
                    weekday,
                    hour_from,
                    hour_to,
                } => {
                    if let Some(list) = by_employee.get(employee_id.as_str()) {
                        for a in list {
                            if weekday.map(|w| w == a.work_date.weekday()).unwrap_or(true) {
                                eval.checks_total += 1;
                                let hit = a
                                    .covered_hours()
                                    .iter()
                                    .any(|h| *hour_from <= *h && *h < *hour_to);
                                if hit {
                                    eval.violations.push(RuleViolation::soft(
                                        violation_codes::AVOIDANCE_HIT,
                                        employee_id,
                                        Some(a.work_date),
                                        format!(
                                            "{} {}~{} 点命中回避规则",
                                            a.work_date, hour_from, hour_to
                                        ),
                                    ));
                                    eval.suggestions.push(format!(
                                        "建议将 {} 在 {} 的班次移出 {:02}:00-{:02}:00 时段",
                                        employee_id, a.work_date, hour_from, hour_to
                                    ));
                                }
                            }
                        }
                    }
                }
                RuleBody::ConsecutiveCap {
                    max_days, ..
                } => {
                    for (id, list) in &by_employee {
                        if !rule.body.applies_to(id) {
                            continue;
                        }
                        eval.checks_total += 1;
                        let dates: Vec<NaiveDate> = list.iter().map(|a| a.work_date).collect();
                        let longest = max_consecutive_run(&dates);
                        if longest > *max_days {
                            eval.violations.push(RuleViolation::soft(
                                violation_codes::CUSTOM_CONSECUTIVE_CAP,
                                id,
                                None,
                                format!("连续工作 {} 天,超过规则上限 {} 天", longest, max_days),
                            ));
                            eval.suggestions.push(format!(
                                "建议为 {} 插入休息日,当前连续 {} 天",
                                id, longest
                            ));
                        }
                    }
                }
                RuleBody::FreeTextAdvisory { text } => {
                    // 自由文本不机器判定,原样提示人工复核
                    eval.suggestions.push(format!("人工复核: {}", text));
                }
            }
        }

        // 偏好不匹配
        for (id, list) in &by_employee {
            for a in list {
                if let Some(entry) = matrix.get(id, a.work_date) {
                    let has_window = entry.has_window();
                    let is_maybe = entry.status == AvailabilityStatus::Maybe;
                    if !has_window && !is_maybe {
                        continue;
                    }
                    eval.checks_total += 1;

                    let outside_window = has_window
                        && !a.covered_hours().iter().all(|h| entry.window_covers_hour(*h));
                    if outside_window || is_maybe {
                        eval.violations.push(RuleViolation::soft(
                            violation_codes::PREFERENCE_MISMATCH,
                            id,
                            Some(a.work_date),
                            if outside_window {
                                format!("{} 班次越出期望时间窗", a.work_date)
                            } else {
                                format!("{} 为 MAYBE 意向,需与员工确认", a.work_date)
                            },
                        ));
                    }
                }
            }
        }

        eval
    }
}

// ==========================================
// 辅助计算
// ==========================================

/// 日内分钟 -> 跨日绝对分钟
fn abs_minutes(date: NaiveDate, minutes: u32) -> i64 {
    i64::from(date.num_days_from_ce()) * 1440 + i64::from(minutes)
}

/// 相邻两班的休息间隔(小时);同日重叠按 0 处理
pub fn rest_gap_hours(earlier: &ShiftAssignment, later: &ShiftAssignment) -> f64 {
    let end = abs_minutes(earlier.work_date, end_minutes(earlier.end_time));
    let start = abs_minutes(later.work_date, start_minutes(later.start_time));
    if start <= end {
        return 0.0;
    }
    (start - end) as f64 / 60.0
}

/// 最长连续日期段(输入须升序,可含重复)
pub fn max_consecutive_run(dates: &[NaiveDate]) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;

    for date in dates {
        match prev {
            Some(p) if *date == p => continue,
            Some(p) if (*date - p).num_days() == 1 => run += 1,
            _ => run = 1,
        }
        longest = longest.max(run);
        prev = Some(*date);
    }
    longest
}

/// 搭档是否在同日有时间交叠的班次
fn pairing_satisfied(
    assignment: &ShiftAssignment,
    partner: &str,
    schedule_assignments: &[ShiftAssignment],
) -> bool {
    schedule_assignments.iter().any(|other| {
        other.employee_id == partner
            && other.work_date == assignment.work_date
            && other.overlaps_span(assignment.start_time, assignment.end_time)
    })
}

fn shift_on<'a>(
    by_employee: &BTreeMap<&str, Vec<&'a ShiftAssignment>>,
    employee_id: &str,
    date: NaiveDate,
) -> Option<&'a ShiftAssignment> {
    by_employee
        .get(employee_id)?
        .iter()
        .find(|a| a.work_date == date)
        .copied()
}
