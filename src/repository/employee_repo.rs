// ==========================================
// 餐饮门店排班系统 - 员工与出勤意向仓储
// ==========================================
// 红线: Repository 不含业务逻辑,只做数据映射
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

use crate::domain::employee::{AvailabilityEntry, Employee};
use crate::domain::types::AvailabilityStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// EmployeeRepository - 员工仓储
// ==========================================
pub struct EmployeeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EmployeeRepository {
    /// 创建新的EmployeeRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 员工主数据
    // ==========================================

    /// 创建或更新员工（按 employee_id 去重,保留首次 created_at）
    pub fn upsert(&self, employee: &Employee) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_in(&conn, employee)
    }

    /// 批量创建或更新员工（单事务）
    ///
    /// # 返回
    /// - Ok(count): 写入行数
    pub fn batch_upsert(&self, employees: &[Employee]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for employee in employees {
            Self::upsert_in(&tx, employee)?;
        }

        tx.commit()?;
        Ok(employees.len())
    }

    fn upsert_in(conn: &Connection, employee: &Employee) -> RepositoryResult<()> {
        let eligible_json = serde_json::to_string(&employee.eligible_positions)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO employee (
                employee_id, display_name, eligible_positions_json,
                monthly_hour_cap, max_off_requests, active,
                hire_date, contract_end, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(employee_id) DO UPDATE SET
                display_name = excluded.display_name,
                eligible_positions_json = excluded.eligible_positions_json,
                monthly_hour_cap = excluded.monthly_hour_cap,
                max_off_requests = excluded.max_off_requests,
                active = excluded.active,
                hire_date = excluded.hire_date,
                contract_end = excluded.contract_end,
                updated_at = excluded.updated_at
            "#,
            params![
                &employee.employee_id,
                &employee.display_name,
                &eligible_json,
                employee.monthly_hour_cap,
                employee.max_off_requests,
                employee.active as i32,
                employee.hire_date.format("%Y-%m-%d").to_string(),
                employee
                    .contract_end
                    .map(|d| d.format("%Y-%m-%d").to_string()),
                employee.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                employee.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按employee_id查询员工
    pub fn find_by_id(&self, employee_id: &str) -> RepositoryResult<Option<Employee>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT employee_id, display_name, eligible_positions_json,
                      monthly_hour_cap, max_off_requests, active,
                      hire_date, contract_end, created_at, updated_at
               FROM employee
               WHERE employee_id = ?"#,
            params![employee_id],
            Self::map_row,
        ) {
            Ok(employee) => Ok(Some(employee)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部员工
    ///
    /// # 参数
    /// - `only_active`: true 时仅返回在职员工
    pub fn find_all(&self, only_active: bool) -> RepositoryResult<Vec<Employee>> {
        let conn = self.get_conn()?;

        let sql = if only_active {
            r#"SELECT employee_id, display_name, eligible_positions_json,
                      monthly_hour_cap, max_off_requests, active,
                      hire_date, contract_end, created_at, updated_at
               FROM employee WHERE active = 1 ORDER BY employee_id"#
        } else {
            r#"SELECT employee_id, display_name, eligible_positions_json,
                      monthly_hour_cap, max_off_requests, active,
                      hire_date, contract_end, created_at, updated_at
               FROM employee ORDER BY employee_id"#
        };

        let mut stmt = conn.prepare(sql)?;
        let employees = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<Employee>, _>>()?;

        Ok(employees)
    }

    /// 停用员工（软删除,历史班次保留）
    pub fn deactivate(&self, employee_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            "UPDATE employee SET active = 0, updated_at = datetime('now') WHERE employee_id = ?",
            params![employee_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Employee".to_string(),
                id: employee_id.to_string(),
            });
        }
        Ok(())
    }

    /// 映射数据库行到Employee对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Employee> {
        let eligible_json: String = row.get(2)?;
        let eligible_positions: Vec<String> = serde_json::from_str(&eligible_json)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Employee {
            employee_id: row.get(0)?,
            display_name: row.get(1)?,
            eligible_positions,
            monthly_hour_cap: row.get(3)?,
            max_off_requests: row.get(4)?,
            active: row.get::<_, i32>(5)? != 0,
            hire_date: parse_date(row, 6)?,
            contract_end: row
                .get::<_, Option<String>>(7)?
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            created_at: parse_datetime(row, 8)?,
            updated_at: parse_datetime(row, 9)?,
        })
    }

    // ==========================================
    // 出勤意向 (availability_entry)
    // ==========================================

    /// 写入出勤意向（同一 (员工,日期) 后提交覆盖先提交）
    ///
    /// # 红线
    /// - UNKNOWN 是推导态,不允许落库
    pub fn upsert_availability(&self, entry: &AvailabilityEntry) -> RepositoryResult<()> {
        if entry.status == AvailabilityStatus::Unknown {
            return Err(RepositoryError::InternalError(
                "UNKNOWN 为推导态,不允许写入 availability_entry".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        Self::upsert_availability_in(&conn, entry)
    }

    /// 批量写入出勤意向（单事务,整批成功或整批失败）
    pub fn batch_upsert_availability(
        &self,
        entries: &[AvailabilityEntry],
    ) -> RepositoryResult<usize> {
        if let Some(bad) = entries
            .iter()
            .find(|e| e.status == AvailabilityStatus::Unknown)
        {
            return Err(RepositoryError::InternalError(format!(
                "UNKNOWN 为推导态,不允许写入: employee_id={}",
                bad.employee_id
            )));
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for entry in entries {
            Self::upsert_availability_in(&tx, entry)?;
        }

        tx.commit()?;
        Ok(entries.len())
    }

    fn upsert_availability_in(conn: &Connection, entry: &AvailabilityEntry) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO availability_entry (
                employee_id, work_date, status,
                preferred_start, preferred_end, note, submitted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                &entry.employee_id,
                entry.work_date.format("%Y-%m-%d").to_string(),
                entry.status.to_db_str(),
                entry.preferred_start.map(|t| t.format("%H:%M").to_string()),
                entry.preferred_end.map(|t| t.format("%H:%M").to_string()),
                &entry.note,
                entry.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 查询单个员工某日的出勤意向
    pub fn find_availability(
        &self,
        employee_id: &str,
        work_date: NaiveDate,
    ) -> RepositoryResult<Option<AvailabilityEntry>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT employee_id, work_date, status,
                      preferred_start, preferred_end, note, submitted_at
               FROM availability_entry
               WHERE employee_id = ? AND work_date = ?"#,
            params![employee_id, work_date.format("%Y-%m-%d").to_string()],
            Self::map_availability_row,
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询周期内全部已提交的出勤意向（含区间两端）
    pub fn find_availability_in_period(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilityEntry>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT employee_id, work_date, status,
                      preferred_start, preferred_end, note, submitted_at
               FROM availability_entry
               WHERE work_date >= ? AND work_date <= ?
               ORDER BY employee_id, work_date"#,
        )?;

        let entries = stmt
            .query_map(
                params![
                    period_start.format("%Y-%m-%d").to_string(),
                    period_end.format("%Y-%m-%d").to_string(),
                ],
                Self::map_availability_row,
            )?
            .collect::<Result<Vec<AvailabilityEntry>, _>>()?;

        Ok(entries)
    }

    /// 统计员工在周期内提交的 NG 天数（用于休假申请上限校验）
    pub fn count_ng_days(
        &self,
        employee_id: &str,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM availability_entry
               WHERE employee_id = ? AND status = 'NG'
                 AND work_date >= ? AND work_date <= ?"#,
            params![
                employee_id,
                period_start.format("%Y-%m-%d").to_string(),
                period_end.format("%Y-%m-%d").to_string(),
            ],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 映射数据库行到AvailabilityEntry对象
    fn map_availability_row(row: &rusqlite::Row) -> rusqlite::Result<AvailabilityEntry> {
        let status_str: String = row.get(2)?;
        Ok(AvailabilityEntry {
            employee_id: row.get(0)?,
            work_date: parse_date(row, 1)?,
            status: AvailabilityStatus::from_str(&status_str),
            preferred_start: row
                .get::<_, Option<String>>(3)?
                .and_then(|s| NaiveTime::parse_from_str(&s, "%H:%M").ok()),
            preferred_end: row
                .get::<_, Option<String>>(4)?
                .and_then(|s| NaiveTime::parse_from_str(&s, "%H:%M").ok()),
            note: row.get(5)?,
            submitted_at: parse_datetime(row, 6)?,
        })
    }
}

// ==========================================
// 行解析辅助
// ==========================================

pub(crate) fn parse_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use chrono::NaiveDate;

    fn setup() -> EmployeeRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        EmployeeRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn sample_employee(id: &str) -> Employee {
        let now = chrono::Utc::now().naive_utc();
        Employee {
            employee_id: id.to_string(),
            display_name: format!("员工{}", id),
            eligible_positions: vec!["hall".to_string(), "kitchen".to_string()],
            monthly_hour_cap: 160.0,
            max_off_requests: 4,
            active: true,
            hire_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            contract_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_upsert_and_find() {
        let repo = setup();
        let emp = sample_employee("E001");

        repo.upsert(&emp).unwrap();
        let found = repo.find_by_id("E001").unwrap().unwrap();
        assert_eq!(found.display_name, "员工E001");
        assert_eq!(found.eligible_positions, vec!["hall", "kitchen"]);

        // 重复 upsert 不报错,更新字段
        let mut emp2 = emp.clone();
        emp2.monthly_hour_cap = 120.0;
        repo.upsert(&emp2).unwrap();
        let found = repo.find_by_id("E001").unwrap().unwrap();
        assert_eq!(found.monthly_hour_cap, 120.0);
    }

    #[test]
    fn test_availability_last_write_wins() {
        let repo = setup();
        repo.upsert(&sample_employee("E001")).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let now = chrono::Utc::now().naive_utc();

        let first = AvailabilityEntry {
            employee_id: "E001".to_string(),
            work_date: date,
            status: AvailabilityStatus::Ok,
            preferred_start: None,
            preferred_end: None,
            note: None,
            submitted_at: now,
        };
        repo.upsert_availability(&first).unwrap();

        // 同一 (员工,日期) 再次提交,覆盖旧值
        let second = AvailabilityEntry {
            status: AvailabilityStatus::Ng,
            note: Some("家中有事".to_string()),
            ..first.clone()
        };
        repo.upsert_availability(&second).unwrap();

        let found = repo.find_availability("E001", date).unwrap().unwrap();
        assert_eq!(found.status, AvailabilityStatus::Ng);
        assert_eq!(found.note.as_deref(), Some("家中有事"));
    }

    #[test]
    fn test_unknown_rejected_on_write() {
        let repo = setup();
        repo.upsert(&sample_employee("E001")).unwrap();

        let entry = AvailabilityEntry {
            employee_id: "E001".to_string(),
            work_date: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
            status: AvailabilityStatus::Unknown,
            preferred_start: None,
            preferred_end: None,
            note: None,
            submitted_at: chrono::Utc::now().naive_utc(),
        };
        assert!(repo.upsert_availability(&entry).is_err(), "UNKNOWN 不允许落库");
    }

    #[test]
    fn test_count_ng_days() {
        let repo = setup();
        repo.upsert(&sample_employee("E001")).unwrap();
        let now = chrono::Utc::now().naive_utc();

        for day in [3, 4, 10] {
            repo.upsert_availability(&AvailabilityEntry {
                employee_id: "E001".to_string(),
                work_date: NaiveDate::from_ymd_opt(2025, 2, day).unwrap(),
                status: AvailabilityStatus::Ng,
                preferred_start: None,
                preferred_end: None,
                note: None,
                submitted_at: now,
            })
            .unwrap();
        }

        let count = repo
            .count_ng_days(
                "E001",
                NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
