// ==========================================
// 餐饮门店排班系统 - 排班表领域模型
// ==========================================
// 聚合根: Schedule;所有访问必须经 API 层操作,不允许旁路改写
// 红线: revision 是乐观锁计数器,任何落库更新都必须携带期望值
// ==========================================

use crate::domain::types::{
    end_minutes, span_covers_hour, start_minutes, AssignmentSource, ScheduleStatus,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Schedule - 排班表聚合根
// ==========================================
// 创建: 管理员选定 规则集 + 岗位范围 + 周期
// 批量写入: 仅排班生成引擎;单条写入: 仅编辑服务;归档: 仅显式操作
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: String,             // 排班表ID
    pub period_start: NaiveDate,         // 周期起始日
    pub period_end: NaiveDate,           // 周期结束日(含)
    pub position_scope: Vec<String>,     // 岗位范围
    pub rule_set_id: String,             // 使用的规则集
    pub status: ScheduleStatus,          // 生命周期状态
    pub revision: i32,                   // 乐观锁: 修订号
    pub confidence: Option<f64>,         // 置信度 (0..=1,生成后写入)
    pub warnings: Vec<String>,           // 警告(缺口/软约束退化)
    pub suggestions: Vec<String>,        // 建议(软约束改进提示)
    pub confirm_comment: Option<String>, // 确认备注
    pub confirmed_by: Option<String>,    // 确认人
    pub confirmed_at: Option<NaiveDateTime>, // 确认时间
    pub created_by: String,              // 创建人
    pub created_at: NaiveDateTime,       // 创建时间
    pub updated_at: NaiveDateTime,       // 更新时间
}

impl Schedule {
    /// 判断是否处于可编辑状态
    pub fn is_editable(&self) -> bool {
        self.status.is_editable()
    }

    /// 判断是否已确认
    pub fn is_confirmed(&self) -> bool {
        self.status == ScheduleStatus::Confirmed
    }

    /// 判断是否已归档
    pub fn is_archived(&self) -> bool {
        self.status == ScheduleStatus::Archived
    }

    /// 日期是否落在排班周期内
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.period_start <= date && date <= self.period_end
    }

    /// 岗位是否在本表范围内
    pub fn in_scope(&self, position: &str) -> bool {
        self.position_scope.iter().any(|p| p == position)
    }

    /// 周期内全部日期(升序)
    pub fn period_dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut d = self.period_start;
        while d <= self.period_end {
            dates.push(d);
            d = match d.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }
}

// ==========================================
// ShiftAssignment - 班次
// ==========================================
// 不变量: start < end;岗位必须在员工可上岗集合内;日期必须在周期内
// 约定: 每个 (schedule_id, employee_id, work_date) 至多一条班次,
//       由复合主键落实,同日不重叠不需要额外判定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftAssignment {
    pub schedule_id: String,         // 所属排班表
    pub employee_id: String,         // 员工ID
    pub work_date: NaiveDate,        // 日期
    pub position: String,            // 岗位
    pub start_time: NaiveTime,       // 开始时间
    pub end_time: NaiveTime,         // 结束时间(00:00 按当日 24:00 处理)
    pub source: AssignmentSource,    // 来源 (GENERATED/MANUAL)
    pub created_at: NaiveDateTime,   // 创建时间
    pub updated_at: NaiveDateTime,   // 更新时间
}

impl ShiftAssignment {
    /// 班次时长(小时)
    pub fn duration_hours(&self) -> f64 {
        let span = end_minutes(self.end_time).saturating_sub(start_minutes(self.start_time));
        f64::from(span) / 60.0
    }

    /// 班次是否完整覆盖小时槽 h
    pub fn covers_hour(&self, hour: u8) -> bool {
        span_covers_hour(self.start_time, self.end_time, hour)
    }

    /// 班次覆盖的整点小时列表
    pub fn covered_hours(&self) -> Vec<u8> {
        (0u8..24).filter(|h| self.covers_hour(*h)).collect()
    }

    /// 与另一时间段是否存在交叠(同日口径)
    pub fn overlaps_span(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start_minutes(self.start_time) < end_minutes(end)
            && start_minutes(start) < end_minutes(self.end_time)
    }

    /// 时间段形状是否合法(start < end,按收尾约定比较)
    pub fn valid_span(start: NaiveTime, end: NaiveTime) -> bool {
        start_minutes(start) < end_minutes(end)
    }
}

// ==========================================
// ScheduleDetail - 排班表详情(聚合读取)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDetail {
    pub schedule: Schedule,
    pub assignments: Vec<ShiftAssignment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample_assignment(start: NaiveTime, end: NaiveTime) -> ShiftAssignment {
        ShiftAssignment {
            schedule_id: "S1".to_string(),
            employee_id: "E001".to_string(),
            work_date: NaiveDate::from_ymd_opt(2025, 2, 5).unwrap(),
            position: "hall".to_string(),
            start_time: start,
            end_time: end,
            source: AssignmentSource::Generated,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_duration_and_covered_hours() {
        let a = sample_assignment(t(9, 0), t(17, 0));
        assert!((a.duration_hours() - 8.0).abs() < f64::EPSILON);
        assert_eq!(a.covered_hours(), (9u8..17).collect::<Vec<_>>());
    }

    #[test]
    fn test_midnight_end_duration() {
        let a = sample_assignment(t(18, 0), t(0, 0));
        assert!((a.duration_hours() - 6.0).abs() < f64::EPSILON);
        assert!(a.covers_hour(23));
    }

    #[test]
    fn test_overlap_detection() {
        let a = sample_assignment(t(9, 0), t(17, 0));
        assert!(a.overlaps_span(t(16, 0), t(20, 0)));
        assert!(!a.overlaps_span(t(17, 0), t(20, 0)), "首尾相接不算交叠");
    }

    #[test]
    fn test_period_dates() {
        let schedule = Schedule {
            schedule_id: "S1".to_string(),
            period_start: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
            position_scope: vec!["hall".to_string()],
            rule_set_id: "RS1".to_string(),
            status: ScheduleStatus::Draft,
            revision: 0,
            confidence: None,
            warnings: vec![],
            suggestions: vec![],
            confirm_comment: None,
            confirmed_by: None,
            confirmed_at: None,
            created_by: "admin".to_string(),
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        };
        assert_eq!(schedule.period_dates().len(), 3);
        assert!(schedule.contains_date(NaiveDate::from_ymd_opt(2025, 2, 2).unwrap()));
        assert!(!schedule.contains_date(NaiveDate::from_ymd_opt(2025, 2, 4).unwrap()));
    }
}
