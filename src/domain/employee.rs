// ==========================================
// 餐饮门店排班系统 - 员工与出勤意向领域模型
// ==========================================
// 红线: 员工花名册归外部协作方所有,本核心只持有只读快照
//       出勤意向由员工提交(外部),核心只读消费
// ==========================================

use crate::domain::types::AvailabilityStatus;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Employee - 员工快照
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: String,             // 员工ID
    pub display_name: String,            // 姓名(展示用)
    pub eligible_positions: Vec<String>, // 可上岗岗位集合
    pub monthly_hour_cap: f64,           // 月度工时上限(小时)
    pub max_off_requests: i32,           // 每月休假申请上限
    pub active: bool,                    // 在职标志
    pub hire_date: NaiveDate,            // 入职日期
    pub contract_end: Option<NaiveDate>, // 合同到期日(可空)
    pub created_at: NaiveDateTime,       // 快照创建时间
    pub updated_at: NaiveDateTime,       // 快照更新时间
}

impl Employee {
    /// 判断员工是否可上指定岗位
    pub fn is_eligible_for(&self, position: &str) -> bool {
        self.eligible_positions.iter().any(|p| p == position)
    }

    /// 判断指定日期员工是否在职(在职标志 + 入职/合同期范围)
    pub fn is_employed_on(&self, date: NaiveDate) -> bool {
        if !self.active {
            return false;
        }
        if date < self.hire_date {
            return false;
        }
        match self.contract_end {
            Some(end) => date <= end,
            None => true,
        }
    }
}

// ==========================================
// AvailabilitySubmission - 原始出勤意向提交
// ==========================================
// 入库前形态:校验通过后落 availability_entry 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySubmission {
    pub employee_id: String,                // 员工ID
    pub work_date: NaiveDate,               // 日期
    pub status: AvailabilityStatus,         // 意向状态 (OK/MAYBE/NG)
    pub preferred_start: Option<NaiveTime>, // 期望开始时间
    pub preferred_end: Option<NaiveTime>,   // 期望结束时间
    pub note: Option<String>,               // 备注(自由文本)
}

// ==========================================
// AvailabilityEntry - 归一化出勤意向
// ==========================================
// 不变量: 每个 (employee_id, work_date) 至多一条; NG 不携带时间窗
// UNKNOWN 由归一化阶段对未提交者推导,不落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityEntry {
    pub employee_id: String,                // 员工ID
    pub work_date: NaiveDate,               // 日期
    pub status: AvailabilityStatus,         // 意向状态
    pub preferred_start: Option<NaiveTime>, // 期望开始时间
    pub preferred_end: Option<NaiveTime>,   // 期望结束时间
    pub note: Option<String>,               // 备注
    pub submitted_at: NaiveDateTime,        // 提交时间
}

impl AvailabilityEntry {
    /// 推导未提交者的 UNKNOWN 意向
    pub fn unknown(employee_id: &str, work_date: NaiveDate, now: NaiveDateTime) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            work_date,
            status: AvailabilityStatus::Unknown,
            preferred_start: None,
            preferred_end: None,
            note: None,
            submitted_at: now,
        }
    }

    /// 是否声明了期望时间窗
    pub fn has_window(&self) -> bool {
        self.preferred_start.is_some() && self.preferred_end.is_some()
    }

    /// 指定小时槽是否落在期望时间窗内
    ///
    /// 未声明时间窗视为全天可排(返回 true)
    pub fn window_covers_hour(&self, hour: u8) -> bool {
        match (self.preferred_start, self.preferred_end) {
            (Some(start), Some(end)) => crate::domain::types::span_covers_hour(start, end, hour),
            _ => true,
        }
    }
}
