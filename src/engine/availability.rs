// ==========================================
// 餐饮门店排班系统 - 出勤意向归一化 (Availability Store)
// ==========================================
// 职责: 把原始提交归一化为 周期内 日期→员工→意向 的矩阵
// 红线: 未提交推导为 UNKNOWN 独立三态,绝不默认 OK 或 NG
// 红线: NG 不携带时间窗;start >= end 一律拒绝
// ==========================================

use crate::domain::employee::{AvailabilityEntry, AvailabilitySubmission, Employee};
use crate::domain::types::{end_minutes, start_minutes, AvailabilityStatus};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, warn};

// ==========================================
// AvailabilityMatrix - 归一化意向矩阵
// ==========================================
// 周期内每个 (员工, 日期) 必有一条意向,未提交者为推导的 UNKNOWN
#[derive(Debug, Clone)]
pub struct AvailabilityMatrix {
    entries: HashMap<(String, NaiveDate), AvailabilityEntry>,
}

impl AvailabilityMatrix {
    /// 查询某员工某日的意向（矩阵外的键返回 None）
    pub fn get(&self, employee_id: &str, date: NaiveDate) -> Option<&AvailabilityEntry> {
        self.entries.get(&(employee_id.to_string(), date))
    }

    /// 查询意向状态（矩阵外按 UNKNOWN 口径）
    pub fn status_of(&self, employee_id: &str, date: NaiveDate) -> AvailabilityStatus {
        self.get(employee_id, date)
            .map(|e| e.status)
            .unwrap_or(AvailabilityStatus::Unknown)
    }

    /// 矩阵条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==========================================
// AvailabilityStore - 归一化引擎
// ==========================================
pub struct AvailabilityStore;

impl AvailabilityStore {
    pub fn new() -> Self {
        Self
    }

    /// 入库前校验单条提交
    ///
    /// # 拒绝口径
    /// - NG 携带时间窗
    /// - 时间窗只有单边
    /// - start >= end（按收尾约定,end=00:00 视为 24:00）
    pub fn validate_submission(submission: &AvailabilitySubmission) -> Result<(), String> {
        let has_start = submission.preferred_start.is_some();
        let has_end = submission.preferred_end.is_some();

        if submission.status == AvailabilityStatus::Unknown {
            return Err("UNKNOWN 为推导态,不接受提交".to_string());
        }

        if submission.status == AvailabilityStatus::Ng && (has_start || has_end) {
            return Err(format!(
                "NG 意向不允许携带时间窗: employee_id={}, work_date={}",
                submission.employee_id, submission.work_date
            ));
        }

        if has_start != has_end {
            return Err(format!(
                "期望时间窗必须成对给出: employee_id={}, work_date={}",
                submission.employee_id, submission.work_date
            ));
        }

        if let (Some(start), Some(end)) = (submission.preferred_start, submission.preferred_end) {
            if start_minutes(start) >= end_minutes(end) {
                return Err(format!(
                    "期望时间窗非法(start >= end): employee_id={}, work_date={}, {}..{}",
                    submission.employee_id, submission.work_date, start, end
                ));
            }
        }

        Ok(())
    }

    /// 归一化: 已提交条目 + 花名册 -> 周期内意向矩阵
    ///
    /// # 口径
    /// - 周期内在职员工的每个日期必有一条;未提交推导 UNKNOWN
    /// - 周期外日期的条目忽略
    /// - 落库行再次做防御性校验,坏行视为数据问题直接报错
    pub fn normalize(
        &self,
        employees: &[Employee],
        entries: &[AvailabilityEntry],
        period_start: NaiveDate,
        period_end: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<AvailabilityMatrix, String> {
        if period_start > period_end {
            return Err(format!(
                "周期非法: start={} > end={}",
                period_start, period_end
            ));
        }

        let employee_ids: HashMap<&str, &Employee> = employees
            .iter()
            .map(|e| (e.employee_id.as_str(), e))
            .collect();

        let mut matrix: HashMap<(String, NaiveDate), AvailabilityEntry> = HashMap::new();

        for entry in entries {
            if entry.work_date < period_start || entry.work_date > period_end {
                continue;
            }
            if !employee_ids.contains_key(entry.employee_id.as_str()) {
                // 花名册快照里没有的员工:意向悬空,跳过并告警
                warn!(
                    employee_id = %entry.employee_id,
                    work_date = %entry.work_date,
                    "意向条目找不到对应员工快照,已跳过"
                );
                continue;
            }

            Self::validate_persisted(entry)?;

            matrix.insert((entry.employee_id.clone(), entry.work_date), entry.clone());
        }

        // 未提交者推导 UNKNOWN（仅在职员工）
        let mut unknown_count = 0usize;
        for employee in employees {
            let mut date = period_start;
            while date <= period_end {
                if employee.is_employed_on(date) {
                    let key = (employee.employee_id.clone(), date);
                    if !matrix.contains_key(&key) {
                        matrix.insert(
                            key,
                            AvailabilityEntry::unknown(&employee.employee_id, date, now),
                        );
                        unknown_count += 1;
                    }
                }
                date = match date.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
            }
        }

        debug!(
            total = matrix.len(),
            unknown = unknown_count,
            "出勤意向矩阵归一化完成"
        );

        Ok(AvailabilityMatrix { entries: matrix })
    }

    /// 落库行的防御性校验（与提交校验同口径）
    fn validate_persisted(entry: &AvailabilityEntry) -> Result<(), String> {
        if entry.status == AvailabilityStatus::Unknown {
            return Err(format!(
                "availability_entry 出现落库的 UNKNOWN: employee_id={}, work_date={}",
                entry.employee_id, entry.work_date
            ));
        }
        if entry.status == AvailabilityStatus::Ng && entry.has_window() {
            return Err(format!(
                "availability_entry 出现携带时间窗的 NG: employee_id={}, work_date={}",
                entry.employee_id, entry.work_date
            ));
        }
        if let (Some(start), Some(end)) = (entry.preferred_start, entry.preferred_end) {
            if start_minutes(start) >= end_minutes(end) {
                return Err(format!(
                    "availability_entry 时间窗非法: employee_id={}, work_date={}",
                    entry.employee_id, entry.work_date
                ));
            }
        }
        Ok(())
    }
}

impl Default for AvailabilityStore {
    fn default() -> Self {
        Self::new()
    }
}
