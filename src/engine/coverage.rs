// ==========================================
// 餐饮门店排班系统 - 覆盖报告构建 (Coverage Builder)
// ==========================================
// 职责: 班次集合 + 需求计划 -> 覆盖报告;编辑后只修补受影响槽位
// 口径: 只统计 应配 > 0 或 实配 > 0 的槽位
// ==========================================

use crate::domain::coverage::{CoverageReport, SlotCoverage};
use crate::domain::schedule::ShiftAssignment;
use crate::engine::requirement::RequirementPlan;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::debug;

pub struct CoverageBuilder;

impl CoverageBuilder {
    /// 全量构建覆盖报告
    pub fn build(
        schedule_id: &str,
        assignments: &[ShiftAssignment],
        plan: &RequirementPlan,
        computed_at: NaiveDateTime,
    ) -> CoverageReport {
        let assigned = assigned_counts(assignments);
        let mut report = CoverageReport::new(schedule_id, computed_at);

        for (date, position, vector) in plan.iter_ordered() {
            for hour in 0u8..24 {
                let required = vector[usize::from(hour)];
                let count = assigned
                    .get(&(*date, position.to_string(), hour))
                    .copied()
                    .unwrap_or(0);
                if required > 0 || count > 0 {
                    report.upsert(SlotCoverage::new(*date, position, hour, required, count));
                }
            }
        }

        debug!(
            schedule_id = %schedule_id,
            slots = report.slots.len(),
            ratio = report.coverage_ratio(),
            "覆盖报告全量构建完成"
        );
        report
    }

    /// 增量修补: 只重算受影响的 (日期, 岗位, 小时) 槽位
    ///
    /// # 参数
    /// - affected: 编辑前后覆盖小时的对称差(变更的槽位全集)
    /// - assignments: 编辑后的全表班次
    pub fn patch(
        report: &mut CoverageReport,
        affected: &[(NaiveDate, String, u8)],
        assignments: &[ShiftAssignment],
        plan: &RequirementPlan,
        computed_at: NaiveDateTime,
    ) {
        for (date, position, hour) in affected {
            let required = plan.required(*date, position, *hour);
            let count = assignments
                .iter()
                .filter(|a| {
                    a.work_date == *date && a.position == *position && a.covers_hour(*hour)
                })
                .count() as u32;
            report.upsert(SlotCoverage::new(*date, position, *hour, required, count));
        }
        report.computed_at = computed_at;
        debug!(patched = affected.len(), "覆盖报告增量修补完成");
    }

    /// 编辑受影响槽位: 旧/新班次覆盖小时的对称差(含岗位变化时的双侧全量)
    pub fn affected_slots(
        old: Option<&ShiftAssignment>,
        new: Option<&ShiftAssignment>,
    ) -> Vec<(NaiveDate, String, u8)> {
        let mut slots: Vec<(NaiveDate, String, u8)> = Vec::new();

        match (old, new) {
            (Some(o), Some(n)) if o.position == n.position && o.work_date == n.work_date => {
                // 同岗位同日: 覆盖小时对称差
                let old_hours = o.covered_hours();
                let new_hours = n.covered_hours();
                for h in &old_hours {
                    if !new_hours.contains(h) {
                        slots.push((o.work_date, o.position.clone(), *h));
                    }
                }
                for h in &new_hours {
                    if !old_hours.contains(h) {
                        slots.push((n.work_date, n.position.clone(), *h));
                    }
                }
            }
            (o, n) => {
                // 岗位或日期变化、纯增删: 双侧覆盖小时全算
                if let Some(o) = o {
                    for h in o.covered_hours() {
                        slots.push((o.work_date, o.position.clone(), h));
                    }
                }
                if let Some(n) = n {
                    for h in n.covered_hours() {
                        slots.push((n.work_date, n.position.clone(), h));
                    }
                }
            }
        }

        slots.sort();
        slots.dedup();
        slots
    }
}

/// (日期, 岗位, 小时) -> 实配人数
fn assigned_counts(assignments: &[ShiftAssignment]) -> HashMap<(NaiveDate, String, u8), u32> {
    let mut counts: HashMap<(NaiveDate, String, u8), u32> = HashMap::new();
    for a in assignments {
        for hour in a.covered_hours() {
            *counts
                .entry((a.work_date, a.position.clone(), hour))
                .or_insert(0) += 1;
        }
    }
    counts
}
