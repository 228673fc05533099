// ==========================================
// 餐饮门店排班系统 - 槽位填充器 (Slot Filler)
// ==========================================
// 职责: 贪心 + 修复 的确定性槽位填充
// 遍历: 日期升序 -> 岗位升序 -> 小时升序;候选按五层分级排序
// 红线: 任何录取都必须先过硬约束准入;候选枯竭记缺口警告,绝不降级录取
// 约定: 每员工每日至多一条连续班次,跨小时录取按"延长收尾"实现
// ==========================================

use crate::domain::employee::Employee;
use crate::domain::rule::RuleBody;
use crate::domain::schedule::ShiftAssignment;
use crate::domain::types::{AssignmentSource, AvailabilityStatus};
use crate::engine::availability::AvailabilityMatrix;
use crate::engine::ranking::{rank_candidates, tier_of, CandidateTier, RankedCandidate};
use crate::engine::requirement::RequirementPlan;
use crate::engine::rules::RuleEngine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

// ==========================================
// FillContext / FillResult
// ==========================================
pub struct FillContext<'a> {
    pub schedule_id: &'a str,
    pub employees: &'a [Employee],
    pub matrix: &'a AvailabilityMatrix,
    pub plan: &'a RequirementPlan,
    pub rule_engine: &'a RuleEngine,
    pub allow_unknown_fill: bool,
}

#[derive(Debug)]
pub struct FillResult {
    pub assignments: Vec<ShiftAssignment>,
    pub warnings: Vec<String>,
}

// ==========================================
// 运行中状态
// ==========================================
#[derive(Debug, Clone)]
struct DayShift {
    position: String,
    start_hour: u8,
    end_hour: u8, // 开区间收尾,24 表示当日 24:00
}

#[derive(Debug, Default)]
struct EmployeeState {
    assigned_hours: f64,
    day_shifts: BTreeMap<NaiveDate, DayShift>,
}

impl EmployeeState {
    /// 加入 date 后形成的连续工作天数(含前后已排日期)
    fn run_with(&self, date: NaiveDate) -> u32 {
        let mut run = 1u32;
        let mut d = date.pred_opt();
        while let Some(p) = d {
            if !self.day_shifts.contains_key(&p) {
                break;
            }
            run += 1;
            d = p.pred_opt();
        }
        let mut d = date.succ_opt();
        while let Some(n) = d {
            if !self.day_shifts.contains_key(&n) {
                break;
            }
            run += 1;
            d = n.succ_opt();
        }
        run
    }

    /// 在 date 排 [start_hour, end_hour) 是否满足与前后班次的最小休息时长
    fn rest_ok(&self, date: NaiveDate, start_hour: u8, end_hour: u8, rest_hours: f64) -> bool {
        if let Some((prev_date, prev)) = self.day_shifts.range(..date).next_back() {
            let gap = (date - *prev_date).num_days() as f64 * 24.0
                - f64::from(prev.end_hour)
                + f64::from(start_hour);
            if gap < rest_hours - f64::EPSILON {
                return false;
            }
        }
        if let Some((next_date, next)) = self
            .day_shifts
            .range(date.succ_opt().unwrap_or(date)..)
            .next()
        {
            let gap = (*next_date - date).num_days() as f64 * 24.0 - f64::from(end_hour)
                + f64::from(next.start_hour);
            if gap < rest_hours - f64::EPSILON {
                return false;
            }
        }
        true
    }
}

// ==========================================
// SlotFiller - 填充引擎
// ==========================================
pub struct SlotFiller;

impl SlotFiller {
    /// 贪心填充 + 强制搭档修复,输出班次与缺口警告
    pub fn fill(ctx: &FillContext, now: NaiveDateTime) -> FillResult {
        let mut states: HashMap<String, EmployeeState> = HashMap::new();
        let mut warnings: Vec<String> = Vec::new();

        let employees: Vec<&Employee> = ctx.employees.iter().filter(|e| e.active).collect();

        for (date, position, vector) in ctx.plan.iter_ordered() {
            for hour in 0u8..24 {
                let required = vector[usize::from(hour)];
                if required == 0 {
                    continue;
                }

                let mut filled = covering_count(&states, *date, position, hour);
                while filled < required {
                    match best_candidate(ctx, &employees, &states, *date, position, hour) {
                        Some(candidate) => {
                            admit(&mut states, &candidate.employee_id, *date, position, hour);
                            filled += 1;
                        }
                        None => {
                            warnings.push(format!(
                                "{} {} {:02}:00 缺 {} 人",
                                date,
                                position,
                                hour,
                                required - filled
                            ));
                            break;
                        }
                    }
                }
            }
        }

        Self::repair_mandatory_pairing(ctx, &mut states, &mut warnings);

        let assignments = materialize(ctx.schedule_id, &states, now);
        debug!(
            assignments = assignments.len(),
            warnings = warnings.len(),
            "槽位填充完成"
        );
        FillResult {
            assignments,
            warnings,
        }
    }

    /// 修复: 强制搭档规则下孤立上班的一方,优先为搭档补排同窗班次,
    /// 补排不可行则撤销孤立班次(转化为缺口,由覆盖报告呈现)
    fn repair_mandatory_pairing(
        ctx: &FillContext,
        states: &mut HashMap<String, EmployeeState>,
        warnings: &mut Vec<String>,
    ) {
        let pairs: Vec<(String, String)> = ctx
            .rule_engine
            .rules()
            .iter()
            .filter(|r| r.is_hard())
            .filter_map(|r| match &r.body {
                RuleBody::Pairing {
                    employee_a,
                    employee_b,
                } => Some((employee_a.clone(), employee_b.clone())),
                _ => None,
            })
            .collect();

        for (a, b) in pairs {
            // 收集任一方上班的日期
            let mut dates: Vec<NaiveDate> = Vec::new();
            for id in [&a, &b] {
                if let Some(state) = states.get(id.as_str()) {
                    dates.extend(state.day_shifts.keys().copied());
                }
            }
            dates.sort();
            dates.dedup();

            for date in dates {
                let shift_a = states.get(&a).and_then(|s| s.day_shifts.get(&date)).cloned();
                let shift_b = states.get(&b).and_then(|s| s.day_shifts.get(&date)).cloned();

                let (worker, partner, shift) = match (shift_a, shift_b) {
                    (Some(sa), Some(sb)) => {
                        // 双方都上班但时间不交叠也算未满足,撤销后排的一方
                        if sa.start_hour < sb.end_hour && sb.start_hour < sa.end_hour {
                            continue;
                        }
                        (b.clone(), a.clone(), sb)
                    }
                    (Some(sa), None) => (a.clone(), b.clone(), sa),
                    (None, Some(sb)) => (b.clone(), a.clone(), sb),
                    (None, None) => continue,
                };

                if try_force_shift(ctx, states, &partner, date, &shift) {
                    warnings.push(format!(
                        "{} 依强制搭档规则为 {} 补排 {:02}:00-{:02}:00",
                        date, partner, shift.start_hour, shift.end_hour
                    ));
                } else {
                    if let Some(state) = states.get_mut(&worker) {
                        if let Some(removed) = state.day_shifts.remove(&date) {
                            state.assigned_hours -=
                                f64::from(removed.end_hour - removed.start_hour);
                        }
                    }
                    warnings.push(format!(
                        "{} 强制搭档规则无法满足,已撤销 {} 的班次",
                        date, worker
                    ));
                }
            }
        }
    }
}

/// 已覆盖该槽位的人数
fn covering_count(
    states: &HashMap<String, EmployeeState>,
    date: NaiveDate,
    position: &str,
    hour: u8,
) -> u32 {
    states
        .values()
        .filter(|s| {
            s.day_shifts.get(&date).map_or(false, |shift| {
                shift.position == position && shift.start_hour <= hour && hour < shift.end_hour
            })
        })
        .count() as u32
}

/// 槽位候选人: 硬约束准入 + 五层分级,返回最优者
fn best_candidate(
    ctx: &FillContext,
    employees: &[&Employee],
    states: &HashMap<String, EmployeeState>,
    date: NaiveDate,
    position: &str,
    hour: u8,
) -> Option<RankedCandidate> {
    let mut candidates: Vec<RankedCandidate> = Vec::new();

    for employee in employees {
        let id = employee.employee_id.as_str();
        if !employee.is_employed_on(date) || !employee.is_eligible_for(position) {
            continue;
        }
        if ctx.matrix.status_of(id, date) == AvailabilityStatus::Ng {
            continue;
        }
        if ctx.rule_engine.mandatory_avoidance_hit(id, date, hour) {
            continue;
        }

        let default_state = EmployeeState::default();
        let state = states.get(id).unwrap_or(&default_state);

        // 当日已有班次: 只允许同岗位的收尾延长;否则开新的 1 小时班次
        let admissible = match state.day_shifts.get(&date) {
            Some(shift) => {
                shift.position == position
                    && shift.end_hour == hour
                    && hour < 24
                    && state.assigned_hours + 1.0 <= employee.monthly_hour_cap + f64::EPSILON
                    && state.rest_ok(date, shift.start_hour, hour + 1, ctx.rule_engine.rest_hours())
            }
            None => {
                state.assigned_hours + 1.0 <= employee.monthly_hour_cap + f64::EPSILON
                    && state.run_with(date) <= ctx.rule_engine.consecutive_limit_for(id)
                    && state.rest_ok(date, hour, hour + 1, ctx.rule_engine.rest_hours())
            }
        };
        if !admissible {
            continue;
        }

        let tier = match ctx.matrix.get(id, date) {
            Some(entry) => match tier_of(entry, hour) {
                Some(t) => t,
                None => continue,
            },
            None => CandidateTier::Unknown,
        };
        if tier == CandidateTier::Unknown && !ctx.allow_unknown_fill {
            continue;
        }

        candidates.push(RankedCandidate {
            employee_id: id.to_string(),
            tier,
            assigned_hours: state.assigned_hours,
        });
    }

    rank_candidates(&mut candidates);
    candidates.into_iter().next()
}

/// 录取: 开新班次或延长收尾一小时
fn admit(
    states: &mut HashMap<String, EmployeeState>,
    employee_id: &str,
    date: NaiveDate,
    position: &str,
    hour: u8,
) {
    let state = states.entry(employee_id.to_string()).or_default();
    match state.day_shifts.get_mut(&date) {
        Some(shift) => shift.end_hour = hour + 1,
        None => {
            state.day_shifts.insert(
                date,
                DayShift {
                    position: position.to_string(),
                    start_hour: hour,
                    end_hour: hour + 1,
                },
            );
        }
    }
    state.assigned_hours += 1.0;
}

/// 修复用: 尝试为搭档整段补排同窗班次(逐小时过硬约束准入)
fn try_force_shift(
    ctx: &FillContext,
    states: &mut HashMap<String, EmployeeState>,
    employee_id: &str,
    date: NaiveDate,
    shift: &DayShift,
) -> bool {
    let employee = match ctx
        .employees
        .iter()
        .find(|e| e.employee_id == employee_id && e.active)
    {
        Some(e) => e,
        None => return false,
    };
    if !employee.is_employed_on(date) || !employee.is_eligible_for(&shift.position) {
        return false;
    }
    if ctx.matrix.status_of(employee_id, date) == AvailabilityStatus::Ng {
        return false;
    }
    if !ctx.allow_unknown_fill
        && ctx.matrix.status_of(employee_id, date) == AvailabilityStatus::Unknown
    {
        return false;
    }
    for hour in shift.start_hour..shift.end_hour {
        if ctx.rule_engine.mandatory_avoidance_hit(employee_id, date, hour) {
            return false;
        }
    }

    let duration = f64::from(shift.end_hour - shift.start_hour);
    let default_state = EmployeeState::default();
    let state = states.get(employee_id).unwrap_or(&default_state);
    if state.day_shifts.contains_key(&date) {
        return false;
    }
    if state.assigned_hours + duration > employee.monthly_hour_cap + f64::EPSILON {
        return false;
    }
    if state.run_with(date) > ctx.rule_engine.consecutive_limit_for(employee_id) {
        return false;
    }
    if !state.rest_ok(
        date,
        shift.start_hour,
        shift.end_hour,
        ctx.rule_engine.rest_hours(),
    ) {
        return false;
    }

    let state = states.entry(employee_id.to_string()).or_default();
    state.day_shifts.insert(date, shift.clone());
    state.assigned_hours += duration;
    true
}

/// 运行态 -> 班次列表,(日期, 岗位, 员工ID) 升序保证输出确定性
fn materialize(
    schedule_id: &str,
    states: &HashMap<String, EmployeeState>,
    now: NaiveDateTime,
) -> Vec<ShiftAssignment> {
    let mut assignments: Vec<ShiftAssignment> = Vec::new();
    for (employee_id, state) in states {
        for (date, shift) in &state.day_shifts {
            assignments.push(ShiftAssignment {
                schedule_id: schedule_id.to_string(),
                employee_id: employee_id.clone(),
                work_date: *date,
                position: shift.position.clone(),
                start_time: hour_to_time(shift.start_hour),
                end_time: hour_to_time(shift.end_hour),
                source: AssignmentSource::Generated,
                created_at: now,
                updated_at: now,
            });
        }
    }
    assignments.sort_by(|a, b| {
        a.work_date
            .cmp(&b.work_date)
            .then_with(|| a.position.cmp(&b.position))
            .then_with(|| a.employee_id.cmp(&b.employee_id))
    });
    assignments
}

/// 小时 -> 时刻;24 按收尾约定写回 00:00
fn hour_to_time(hour: u8) -> NaiveTime {
    let h = if hour >= 24 { 0 } else { u32::from(hour) };
    NaiveTime::from_hms_opt(h, 0, 0).unwrap_or(NaiveTime::MIN)
}
