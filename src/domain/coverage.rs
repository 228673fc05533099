// ==========================================
// 餐饮门店排班系统 - 覆盖报告领域模型
// ==========================================
// 覆盖报告是派生数据,不落库;缓存于内存,编辑后只修补受影响槽位
// 口径: diff = 实配人数 - 应配人数
// ==========================================

use crate::domain::types::CoverageLevel;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// SlotCoverage - 单槽覆盖
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotCoverage {
    pub work_date: NaiveDate, // 日期
    pub position: String,     // 岗位
    pub hour: u8,             // 小时槽 (0..24)
    pub required: u32,        // 应配人数
    pub assigned: u32,        // 实配人数
    pub diff: i32,            // 实配 - 应配
    pub level: CoverageLevel, // 分类结论
}

impl SlotCoverage {
    pub fn new(
        work_date: NaiveDate,
        position: &str,
        hour: u8,
        required: u32,
        assigned: u32,
    ) -> Self {
        let diff = assigned as i32 - required as i32;
        Self {
            work_date,
            position: position.to_string(),
            hour,
            required,
            assigned,
            diff,
            level: CoverageLevel::from_diff(diff),
        }
    }

    /// 槽位标签,用于警告与建议文案
    pub fn slot_label(&self) -> String {
        format!("{} {} {:02}:00", self.work_date, self.position, self.hour)
    }
}

// ==========================================
// CoverageReport - 覆盖报告
// ==========================================
// 槽位按 (日期, 岗位, 小时) 升序保持有序,保证输出确定性
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub schedule_id: String,        // 所属排班表
    pub computed_at: NaiveDateTime, // 计算时间
    pub slots: Vec<SlotCoverage>,   // 有序槽位
}

impl CoverageReport {
    pub fn new(schedule_id: &str, computed_at: NaiveDateTime) -> Self {
        Self {
            schedule_id: schedule_id.to_string(),
            computed_at,
            slots: Vec::new(),
        }
    }

    fn position_of(&self, work_date: NaiveDate, position: &str, hour: u8) -> Result<usize, usize> {
        self.slots.binary_search_by(|s| {
            (s.work_date, s.position.as_str(), s.hour).cmp(&(work_date, position, hour))
        })
    }

    /// 查询单槽覆盖
    pub fn get(&self, work_date: NaiveDate, position: &str, hour: u8) -> Option<&SlotCoverage> {
        self.position_of(work_date, position, hour)
            .ok()
            .map(|i| &self.slots[i])
    }

    /// 写入/替换单槽覆盖(保持有序)
    ///
    /// 应配与实配均为 0 的槽位直接剔除,报告只保留有意义的槽位
    pub fn upsert(&mut self, slot: SlotCoverage) {
        match self.position_of(slot.work_date, &slot.position, slot.hour) {
            Ok(i) => {
                if slot.required == 0 && slot.assigned == 0 {
                    self.slots.remove(i);
                } else {
                    self.slots[i] = slot;
                }
            }
            Err(i) => {
                if slot.required > 0 || slot.assigned > 0 {
                    self.slots.insert(i, slot);
                }
            }
        }
    }

    /// 缺员槽位(按序)
    pub fn understaffed_slots(&self) -> Vec<&SlotCoverage> {
        self.slots
            .iter()
            .filter(|s| s.level == CoverageLevel::Understaffed)
            .collect()
    }

    /// 覆盖率: 应配 > 0 的槽位中 diff >= 0 的占比;无应配槽位时为 1.0
    pub fn coverage_ratio(&self) -> f64 {
        let required_slots: Vec<&SlotCoverage> =
            self.slots.iter().filter(|s| s.required > 0).collect();
        if required_slots.is_empty() {
            return 1.0;
        }
        let met = required_slots.iter().filter(|s| s.diff >= 0).count();
        met as f64 / required_slots.len() as f64
    }

    /// 是否完全无法覆盖: 所有应配槽位实配均为 0
    pub fn nothing_covered(&self) -> bool {
        let mut has_required = false;
        for s in self.slots.iter().filter(|s| s.required > 0) {
            has_required = true;
            if s.assigned > 0 {
                return false;
            }
        }
        has_required
    }

    /// 汇总统计
    pub fn summary(&self) -> CoverageSummary {
        let mut summary = CoverageSummary {
            total_slots: self.slots.len(),
            met: 0,
            understaffed: 0,
            overstaffed: 0,
            total_shortfall: 0,
            coverage_ratio: self.coverage_ratio(),
        };
        for s in &self.slots {
            match s.level {
                CoverageLevel::Met => summary.met += 1,
                CoverageLevel::Understaffed => {
                    summary.understaffed += 1;
                    summary.total_shortfall += (-s.diff) as u32;
                }
                CoverageLevel::Overstaffed => summary.overstaffed += 1,
            }
        }
        summary
    }
}

// ==========================================
// CoverageSummary - 覆盖汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_slots: usize,    // 槽位总数
    pub met: usize,            // 满足数
    pub understaffed: usize,   // 缺员数
    pub overstaffed: usize,    // 超员数
    pub total_shortfall: u32,  // 缺员人次合计
    pub coverage_ratio: f64,   // 覆盖率
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
    }

    #[test]
    fn test_upsert_keeps_order_and_patches() {
        let mut report = CoverageReport::new("S1", Utc::now().naive_utc());
        report.upsert(SlotCoverage::new(d(5), "hall", 12, 3, 2));
        report.upsert(SlotCoverage::new(d(5), "hall", 9, 2, 2));
        report.upsert(SlotCoverage::new(d(4), "kitchen", 12, 1, 1));

        let hours: Vec<(NaiveDate, u8)> =
            report.slots.iter().map(|s| (s.work_date, s.hour)).collect();
        assert_eq!(hours, vec![(d(4), 12), (d(5), 9), (d(5), 12)]);

        // 修补已有槽位
        report.upsert(SlotCoverage::new(d(5), "hall", 12, 3, 3));
        let slot = report.get(d(5), "hall", 12).unwrap();
        assert_eq!(slot.diff, 0);
        assert_eq!(slot.level, CoverageLevel::Met);
        assert_eq!(report.slots.len(), 3);
    }

    #[test]
    fn test_zero_slot_removed() {
        let mut report = CoverageReport::new("S1", Utc::now().naive_utc());
        report.upsert(SlotCoverage::new(d(5), "hall", 12, 0, 1));
        assert_eq!(report.slots.len(), 1);

        // 实配归零且无应配 -> 槽位剔除
        report.upsert(SlotCoverage::new(d(5), "hall", 12, 0, 0));
        assert!(report.slots.is_empty());
    }

    #[test]
    fn test_coverage_ratio_and_summary() {
        let mut report = CoverageReport::new("S1", Utc::now().naive_utc());
        report.upsert(SlotCoverage::new(d(5), "hall", 12, 3, 2)); // 缺员
        report.upsert(SlotCoverage::new(d(5), "hall", 13, 2, 2)); // 满足
        report.upsert(SlotCoverage::new(d(5), "hall", 14, 1, 2)); // 超员

        let summary = report.summary();
        assert_eq!(summary.met, 1);
        assert_eq!(summary.understaffed, 1);
        assert_eq!(summary.overstaffed, 1);
        assert_eq!(summary.total_shortfall, 1);
        // 3 个应配槽位中 2 个 diff >= 0
        assert!((summary.coverage_ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_nothing_covered() {
        let mut report = CoverageReport::new("S1", Utc::now().naive_utc());
        report.upsert(SlotCoverage::new(d(5), "hall", 12, 3, 0));
        report.upsert(SlotCoverage::new(d(6), "hall", 12, 2, 0));
        assert!(report.nothing_covered());

        report.upsert(SlotCoverage::new(d(6), "hall", 12, 2, 1));
        assert!(!report.nothing_covered());
    }
}
