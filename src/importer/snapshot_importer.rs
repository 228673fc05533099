// ==========================================
// 餐饮门店排班系统 - 快照导入器 (Snapshot Importer)
// ==========================================
// 职责: 花名册快照与出勤意向的 CSV 批量导入
// 口径: 坏行逐条拒绝并记录原因,好行整批单事务落库
// 红线: 意向状态只接受 OK/MAYBE/NG 的显式拼写,未知拼写按坏行拒绝
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::employee::{AvailabilityEntry, AvailabilitySubmission, Employee};
use crate::domain::types::AvailabilityStatus;
use crate::engine::availability::AvailabilityStore;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::employee_repo::EmployeeRepository;

// ==========================================
// 列定义
// ==========================================
const ROSTER_HEADERS: [&str; 7] = [
    "employee_id",
    "display_name",
    "eligible_positions", // 分号分隔
    "monthly_hour_cap",
    "max_off_requests",
    "hire_date",
    "contract_end", // 可空
];

const AVAILABILITY_HEADERS: [&str; 6] = [
    "employee_id",
    "work_date",
    "status", // OK / MAYBE / NG
    "preferred_start",
    "preferred_end",
    "note",
];

// ==========================================
// ImportReport - 导入结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub success: usize,
    pub rejected: usize,
    pub row_errors: Vec<RowError>,
}

/// 单行拒绝原因(line 为文件内行号,表头为第 1 行)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

// ==========================================
// SnapshotImporter - 快照导入器
// ==========================================
pub struct SnapshotImporter {
    employee_repo: Arc<EmployeeRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl SnapshotImporter {
    pub fn new(
        employee_repo: Arc<EmployeeRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            employee_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 花名册导入
    // ==========================================

    /// 导入花名册快照 CSV(同 employee_id 覆盖旧快照)
    pub async fn import_roster_csv(&self, content: &str, actor: &str) -> ApiResult<ImportReport> {
        let records = Self::read_records(content, &ROSTER_HEADERS)?;
        let total = records.len();
        let now = Utc::now().naive_utc();

        let parsed = join_all(
            records
                .iter()
                .map(|record| Self::parse_roster_row(record, now)),
        )
        .await;

        let mut employees = Vec::new();
        let mut row_errors = Vec::new();
        for (idx, result) in parsed.into_iter().enumerate() {
            match result {
                Ok(employee) => employees.push(employee),
                Err(message) => row_errors.push(RowError {
                    line: idx + 2, // 表头占第 1 行
                    message,
                }),
            }
        }

        let success = if employees.is_empty() {
            0
        } else {
            self.employee_repo.batch_upsert(&employees)?
        };

        let report = ImportReport {
            total,
            success,
            rejected: row_errors.len(),
            row_errors,
        };
        self.log_import(ActionType::RosterImport, actor, &report);
        info!(
            total = report.total,
            success = report.success,
            rejected = report.rejected,
            "花名册导入完成"
        );
        Ok(report)
    }

    // ==========================================
    // 出勤意向导入
    // ==========================================

    /// 导入出勤意向 CSV(同 (员工, 日期) 覆盖旧值)
    ///
    /// 引用不存在或已离职员工的行按坏行拒绝
    pub async fn import_availability_csv(
        &self,
        content: &str,
        actor: &str,
    ) -> ApiResult<ImportReport> {
        let records = Self::read_records(content, &AVAILABILITY_HEADERS)?;
        let total = records.len();
        let now = Utc::now().naive_utc();

        let parsed = join_all(records.iter().map(Self::parse_availability_row)).await;

        let mut entries = Vec::new();
        let mut row_errors = Vec::new();
        for (idx, result) in parsed.into_iter().enumerate() {
            let line = idx + 2;
            let submission = match result {
                Ok(s) => s,
                Err(message) => {
                    row_errors.push(RowError { line, message });
                    continue;
                }
            };

            if let Err(message) = self.check_employee_active(&submission.employee_id) {
                row_errors.push(RowError { line, message });
                continue;
            }

            entries.push(AvailabilityEntry {
                employee_id: submission.employee_id,
                work_date: submission.work_date,
                status: submission.status,
                preferred_start: submission.preferred_start,
                preferred_end: submission.preferred_end,
                note: submission.note,
                submitted_at: now,
            });
        }

        let success = if entries.is_empty() {
            0
        } else {
            self.employee_repo.batch_upsert_availability(&entries)?
        };

        let report = ImportReport {
            total,
            success,
            rejected: row_errors.len(),
            row_errors,
        };
        self.log_import(ActionType::AvailabilityImport, actor, &report);
        info!(
            total = report.total,
            success = report.success,
            rejected = report.rejected,
            "出勤意向导入完成"
        );
        Ok(report)
    }

    // ==========================================
    // 行解析
    // ==========================================

    async fn parse_roster_row(
        record: &csv::StringRecord,
        now: chrono::NaiveDateTime,
    ) -> Result<Employee, String> {
        let employee_id = Self::required_field(record, 0, "employee_id")?;
        let display_name = Self::required_field(record, 1, "display_name")?;

        let eligible_positions: Vec<String> = Self::required_field(record, 2, "eligible_positions")?
            .split(';')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if eligible_positions.is_empty() {
            return Err("eligible_positions 不能为空".to_string());
        }

        let monthly_hour_cap: f64 = Self::required_field(record, 3, "monthly_hour_cap")?
            .parse()
            .map_err(|_| "monthly_hour_cap 不是数值".to_string())?;
        if monthly_hour_cap <= 0.0 {
            return Err(format!("monthly_hour_cap 必须为正: {}", monthly_hour_cap));
        }

        let max_off_requests: i32 = Self::required_field(record, 4, "max_off_requests")?
            .parse()
            .map_err(|_| "max_off_requests 不是整数".to_string())?;
        if max_off_requests < 0 {
            return Err(format!("max_off_requests 不能为负: {}", max_off_requests));
        }

        let hire_date = Self::parse_date(&Self::required_field(record, 5, "hire_date")?)?;
        let contract_end = match Self::optional_field(record, 6) {
            Some(raw) => {
                let end = Self::parse_date(&raw)?;
                if end < hire_date {
                    return Err(format!(
                        "contract_end 早于 hire_date: {} < {}",
                        end, hire_date
                    ));
                }
                Some(end)
            }
            None => None,
        };

        Ok(Employee {
            employee_id,
            display_name,
            eligible_positions,
            monthly_hour_cap,
            max_off_requests,
            active: true,
            hire_date,
            contract_end,
            created_at: now,
            updated_at: now,
        })
    }

    async fn parse_availability_row(
        record: &csv::StringRecord,
    ) -> Result<AvailabilitySubmission, String> {
        let employee_id = Self::required_field(record, 0, "employee_id")?;
        let work_date = Self::parse_date(&Self::required_field(record, 1, "work_date")?)?;
        let status = Self::parse_status(&Self::required_field(record, 2, "status")?)?;
        let preferred_start = Self::optional_time(record, 3)?;
        let preferred_end = Self::optional_time(record, 4)?;
        let note = Self::optional_field(record, 5);

        let submission = AvailabilitySubmission {
            employee_id,
            work_date,
            status,
            preferred_start,
            preferred_end,
            note,
        };
        AvailabilityStore::validate_submission(&submission)?;
        Ok(submission)
    }

    /// 严格状态解析: 未知拼写不做 NG 兜底,直接拒绝该行
    fn parse_status(raw: &str) -> Result<AvailabilityStatus, String> {
        match raw.trim().to_uppercase().as_str() {
            "OK" => Ok(AvailabilityStatus::Ok),
            "MAYBE" => Ok(AvailabilityStatus::Maybe),
            "NG" => Ok(AvailabilityStatus::Ng),
            other => Err(format!("status 拼写非法: {} (仅接受 OK/MAYBE/NG)", other)),
        }
    }

    fn check_employee_active(&self, employee_id: &str) -> Result<(), String> {
        match self.employee_repo.find_by_id(employee_id) {
            Ok(Some(employee)) if employee.active => Ok(()),
            Ok(Some(_)) => Err(format!("员工 {} 已离职", employee_id)),
            Ok(None) => Err(format!("员工 {} 不存在", employee_id)),
            Err(err) => Err(format!("员工查询失败: {}", err)),
        }
    }

    // ==========================================
    // CSV 辅助
    // ==========================================

    /// 读全部数据行,并校验表头与列定义一致
    fn read_records(
        content: &str,
        expected_headers: &[&str],
    ) -> ApiResult<Vec<csv::StringRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| ApiError::ValidationError(format!("CSV 表头读取失败: {}", e)))?;
        let actual: Vec<&str> = headers.iter().collect();
        if actual != expected_headers {
            return Err(ApiError::ValidationError(format!(
                "CSV 表头不匹配: 期望 {:?}, 实际 {:?}",
                expected_headers, actual
            )));
        }

        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::ValidationError(format!("CSV 解析失败: {}", e)))?;
        Ok(records)
    }

    fn required_field(
        record: &csv::StringRecord,
        index: usize,
        name: &str,
    ) -> Result<String, String> {
        match record.get(index).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(format!("{} 不能为空", name)),
        }
    }

    fn optional_field(record: &csv::StringRecord, index: usize) -> Option<String> {
        record
            .get(index)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn parse_date(raw: &str) -> Result<NaiveDate, String> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| format!("日期格式非法: {} (期望 YYYY-MM-DD)", raw))
    }

    fn optional_time(
        record: &csv::StringRecord,
        index: usize,
    ) -> Result<Option<NaiveTime>, String> {
        match Self::optional_field(record, index) {
            Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
                .map(Some)
                .map_err(|_| format!("时间格式非法: {} (期望 HH:MM)", raw)),
            None => Ok(None),
        }
    }

    /// 审计写入失败不影响导入结果
    fn log_import(&self, action_type: ActionType, actor: &str, report: &ImportReport) {
        let log = ActionLog::new(
            uuid::Uuid::new_v4().to_string(),
            None,
            action_type,
            actor.to_string(),
        )
        .with_payload(&serde_json::json!({
            "total": report.total,
            "success": report.success,
            "rejected": report.rejected,
        }));
        if let Err(err) = self.action_log_repo.insert(&log) {
            warn!(error = %err, "操作日志写入失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: Vec<&str>) -> csv::StringRecord {
        csv::StringRecord::from(fields)
    }

    #[tokio::test]
    async fn test_parse_roster_row() {
        let now = Utc::now().naive_utc();
        let row = record(vec![
            "E001",
            "田中",
            "hall;kitchen",
            "160",
            "4",
            "2024-06-01",
            "",
        ]);
        let employee = SnapshotImporter::parse_roster_row(&row, now).await.unwrap();
        assert_eq!(employee.employee_id, "E001");
        assert_eq!(employee.eligible_positions, vec!["hall", "kitchen"]);
        assert!(employee.contract_end.is_none());
        assert!(employee.active);
    }

    #[tokio::test]
    async fn test_parse_roster_row_rejects_bad_cap() {
        let now = Utc::now().naive_utc();
        let row = record(vec!["E001", "田中", "hall", "0", "4", "2024-06-01", ""]);
        let err = SnapshotImporter::parse_roster_row(&row, now)
            .await
            .unwrap_err();
        assert!(err.contains("monthly_hour_cap"));
    }

    #[tokio::test]
    async fn test_parse_availability_row_strict_status() {
        let row = record(vec!["E001", "2025-02-05", "YES", "", "", ""]);
        let err = SnapshotImporter::parse_availability_row(&row)
            .await
            .unwrap_err();
        assert!(err.contains("status"), "未知状态拼写必须拒绝: {}", err);

        let row = record(vec!["E001", "2025-02-05", "ok", "09:00", "17:00", "早班优先"]);
        let submission = SnapshotImporter::parse_availability_row(&row).await.unwrap();
        assert_eq!(submission.status, AvailabilityStatus::Ok);
        assert!(submission.preferred_start.is_some());
    }

    #[tokio::test]
    async fn test_parse_availability_row_ng_with_window_rejected() {
        let row = record(vec!["E001", "2025-02-05", "NG", "09:00", "17:00", ""]);
        assert!(SnapshotImporter::parse_availability_row(&row).await.is_err());
    }

    #[test]
    fn test_header_mismatch() {
        let csv = "employee_id,work_date\nE001,2025-02-05\n";
        let result = SnapshotImporter::read_records(csv, &AVAILABILITY_HEADERS);
        assert!(matches!(result, Err(ApiError::ValidationError(_))));
    }
}
