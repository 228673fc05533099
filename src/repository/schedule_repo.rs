// ==========================================
// 餐饮门店排班系统 - 排班表与班次仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: schedule.revision 是乐观锁计数器,所有更新必须带 WHERE revision 条件
// ==========================================

use crate::domain::schedule::{Schedule, ShiftAssignment};
use crate::domain::types::{AssignmentSource, ScheduleStatus};
use crate::repository::employee_repo::{parse_date, parse_datetime};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// ScheduleRepository - 排班表仓储
// ==========================================
pub struct ScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleRepository {
    /// 创建新的ScheduleRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建排班表（初始 revision = 0）
    pub fn create(&self, schedule: &Schedule) -> RepositoryResult<String> {
        let scope_json = serde_json::to_string(&schedule.position_scope)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO schedule (
                schedule_id, period_start, period_end, position_scope_json,
                rule_set_id, status, revision, confidence,
                warnings_json, suggestions_json,
                confirm_comment, confirmed_by, confirmed_at,
                created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &schedule.schedule_id,
                schedule.period_start.format("%Y-%m-%d").to_string(),
                schedule.period_end.format("%Y-%m-%d").to_string(),
                &scope_json,
                &schedule.rule_set_id,
                schedule.status.to_db_str(),
                schedule.revision,
                schedule.confidence,
                string_vec_to_json(&schedule.warnings)?,
                string_vec_to_json(&schedule.suggestions)?,
                &schedule.confirm_comment,
                &schedule.confirmed_by,
                schedule
                    .confirmed_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                &schedule.created_by,
                schedule.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                schedule.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(schedule.schedule_id.clone())
    }

    /// 按schedule_id查询排班表
    pub fn find_by_id(&self, schedule_id: &str) -> RepositoryResult<Option<Schedule>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            &format!("{} WHERE schedule_id = ?", SELECT_SCHEDULE),
            params![schedule_id],
            Self::map_row,
        ) {
            Ok(schedule) => Ok(Some(schedule)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部排班表（新建在前）
    pub fn find_all(&self) -> RepositoryResult<Vec<Schedule>> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare(&format!("{} ORDER BY created_at DESC", SELECT_SCHEDULE))?;
        let schedules = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<Schedule>, _>>()?;

        Ok(schedules)
    }

    /// 按状态查询排班表
    pub fn find_by_status(&self, status: ScheduleStatus) -> RepositoryResult<Vec<Schedule>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "{} WHERE status = ? ORDER BY created_at DESC",
            SELECT_SCHEDULE
        ))?;
        let schedules = stmt
            .query_map(params![status.to_db_str()], Self::map_row)?
            .collect::<Result<Vec<Schedule>, _>>()?;

        Ok(schedules)
    }

    /// 更新排班表 (带乐观锁检查)
    ///
    /// 可变字段: status / confidence / warnings / suggestions / confirm_*。
    /// 周期、岗位范围、规则集在创建后不可变。
    ///
    /// # 并发控制
    /// 使用乐观锁 (revision字段) 防止并发更新冲突,成功后数据库内 revision + 1
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配 (其他用户已更新)
    /// - `RepositoryError::NotFound`: schedule_id不存在
    pub fn update(&self, schedule: &Schedule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE schedule
               SET status = ?, confidence = ?, warnings_json = ?, suggestions_json = ?,
                   confirm_comment = ?, confirmed_by = ?, confirmed_at = ?,
                   updated_at = datetime('now'), revision = revision + 1
               WHERE schedule_id = ? AND revision = ?"#,
            params![
                schedule.status.to_db_str(),
                schedule.confidence,
                string_vec_to_json(&schedule.warnings)?,
                string_vec_to_json(&schedule.suggestions)?,
                &schedule.confirm_comment,
                &schedule.confirmed_by,
                schedule
                    .confirmed_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                &schedule.schedule_id,
                schedule.revision,
            ],
        )?;

        if rows_affected == 0 {
            return Err(self.lock_failure_or_not_found(
                &conn,
                &schedule.schedule_id,
                schedule.revision,
            ));
        }

        Ok(())
    }

    /// 提交生成结果（单事务: 更新排班表 + 整体替换班次）
    ///
    /// 以 `schedule.revision` 为期望版本;期间若有任何并发写入（撤销、编辑、
    /// 另一次生成提交）,本次提交整体失败,不留半套班次。
    pub fn commit_generation(
        &self,
        schedule: &Schedule,
        assignments: &[ShiftAssignment],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows_affected = tx.execute(
            r#"UPDATE schedule
               SET status = ?, confidence = ?, warnings_json = ?, suggestions_json = ?,
                   updated_at = datetime('now'), revision = revision + 1
               WHERE schedule_id = ? AND revision = ?"#,
            params![
                schedule.status.to_db_str(),
                schedule.confidence,
                string_vec_to_json(&schedule.warnings)?,
                string_vec_to_json(&schedule.suggestions)?,
                &schedule.schedule_id,
                schedule.revision,
            ],
        )?;

        if rows_affected == 0 {
            return Err(self.lock_failure_or_not_found(
                &tx,
                &schedule.schedule_id,
                schedule.revision,
            ));
        }

        tx.execute(
            "DELETE FROM shift_assignment WHERE schedule_id = ?",
            params![&schedule.schedule_id],
        )?;

        for assignment in assignments {
            insert_assignment_in(&tx, assignment)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 单条班次写入（单事务: 乐观锁更新排班表 + upsert 班次）
    ///
    /// 排班表的 status/revision 与班次变更在同一事务内落库,
    /// 保证"首次编辑进入 ADJUSTING"与班次本身不可分割。
    pub fn upsert_assignment_with_revision(
        &self,
        schedule: &Schedule,
        assignment: &ShiftAssignment,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        self.bump_revision_in(&tx, schedule)?;

        tx.execute(
            r#"
            INSERT INTO shift_assignment (
                schedule_id, employee_id, work_date, position,
                start_time, end_time, source_type, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(schedule_id, employee_id, work_date) DO UPDATE SET
                position = excluded.position,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                source_type = excluded.source_type,
                updated_at = excluded.updated_at
            "#,
            params![
                &assignment.schedule_id,
                &assignment.employee_id,
                assignment.work_date.format("%Y-%m-%d").to_string(),
                &assignment.position,
                assignment.start_time.format("%H:%M").to_string(),
                assignment.end_time.format("%H:%M").to_string(),
                assignment.source.to_db_str(),
                assignment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                assignment.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 单条班次删除（单事务: 乐观锁更新排班表 + 删除班次）
    pub fn remove_assignment_with_revision(
        &self,
        schedule: &Schedule,
        employee_id: &str,
        work_date: NaiveDate,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        self.bump_revision_in(&tx, schedule)?;

        let rows = tx.execute(
            "DELETE FROM shift_assignment WHERE schedule_id = ? AND employee_id = ? AND work_date = ?",
            params![
                &schedule.schedule_id,
                employee_id,
                work_date.format("%Y-%m-%d").to_string(),
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ShiftAssignment".to_string(),
                id: format!("{}/{}/{}", schedule.schedule_id, employee_id, work_date),
            });
        }

        tx.commit()?;
        Ok(())
    }

    /// 事务内的乐观锁更新（status/警告/建议与 revision 同步推进）
    ///
    /// 编辑引入的软约束退化警告与班次变更必须同事务落库
    fn bump_revision_in(&self, tx: &Transaction, schedule: &Schedule) -> RepositoryResult<()> {
        let rows_affected = tx.execute(
            r#"UPDATE schedule
               SET status = ?, warnings_json = ?, suggestions_json = ?,
                   updated_at = datetime('now'), revision = revision + 1
               WHERE schedule_id = ? AND revision = ?"#,
            params![
                schedule.status.to_db_str(),
                string_vec_to_json(&schedule.warnings)?,
                string_vec_to_json(&schedule.suggestions)?,
                &schedule.schedule_id,
                schedule.revision,
            ],
        )?;

        if rows_affected == 0 {
            return Err(self.lock_failure_or_not_found(tx, &schedule.schedule_id, schedule.revision));
        }
        Ok(())
    }

    /// 区分"记录不存在"与"revision 冲突"
    fn lock_failure_or_not_found(
        &self,
        conn: &Connection,
        schedule_id: &str,
        expected: i32,
    ) -> RepositoryError {
        let actual: Result<i32, _> = conn.query_row(
            "SELECT revision FROM schedule WHERE schedule_id = ?",
            params![schedule_id],
            |row| row.get(0),
        );

        match actual {
            Ok(actual_revision) => RepositoryError::OptimisticLockFailure {
                schedule_id: schedule_id.to_string(),
                expected,
                actual: actual_revision,
            },
            Err(_) => RepositoryError::NotFound {
                entity: "Schedule".to_string(),
                id: schedule_id.to_string(),
            },
        }
    }

    /// 删除排班表（级联删除班次,仅供测试与维护工具使用）
    pub fn delete(&self, schedule_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM schedule WHERE schedule_id = ?",
            params![schedule_id],
        )?;
        Ok(())
    }

    /// 映射数据库行到Schedule对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Schedule> {
        let scope_json: String = row.get(3)?;
        let position_scope: Vec<String> = serde_json::from_str(&scope_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let status_str: String = row.get(5)?;

        Ok(Schedule {
            schedule_id: row.get(0)?,
            period_start: parse_date(row, 1)?,
            period_end: parse_date(row, 2)?,
            position_scope,
            rule_set_id: row.get(4)?,
            status: ScheduleStatus::from_str(&status_str),
            revision: row.get(6)?,
            confidence: row.get(7)?,
            warnings: json_to_string_vec(row, 8)?,
            suggestions: json_to_string_vec(row, 9)?,
            confirm_comment: row.get(10)?,
            confirmed_by: row.get(11)?,
            confirmed_at: row
                .get::<_, Option<String>>(12)?
                .and_then(|s| chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok()),
            created_by: row.get(13)?,
            created_at: parse_datetime(row, 14)?,
            updated_at: parse_datetime(row, 15)?,
        })
    }
}

const SELECT_SCHEDULE: &str = r#"SELECT schedule_id, period_start, period_end, position_scope_json,
       rule_set_id, status, revision, confidence,
       warnings_json, suggestions_json,
       confirm_comment, confirmed_by, confirmed_at,
       created_by, created_at, updated_at
FROM schedule"#;

// ==========================================
// AssignmentRepository - 班次仓储 (只读查询)
// ==========================================
// 写路径全部走 ScheduleRepository 的事务方法,避免绕过乐观锁
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    /// 创建新的AssignmentRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询排班表的全部班次
    pub fn find_by_schedule(&self, schedule_id: &str) -> RepositoryResult<Vec<ShiftAssignment>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT schedule_id, employee_id, work_date, position,
                      start_time, end_time, source_type, created_at, updated_at
               FROM shift_assignment
               WHERE schedule_id = ?
               ORDER BY work_date, position, employee_id"#,
        )?;

        let assignments = stmt
            .query_map(params![schedule_id], Self::map_row)?
            .collect::<Result<Vec<ShiftAssignment>, _>>()?;

        Ok(assignments)
    }

    /// 查询某员工某日的班次
    pub fn find_one(
        &self,
        schedule_id: &str,
        employee_id: &str,
        work_date: NaiveDate,
    ) -> RepositoryResult<Option<ShiftAssignment>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT schedule_id, employee_id, work_date, position,
                      start_time, end_time, source_type, created_at, updated_at
               FROM shift_assignment
               WHERE schedule_id = ? AND employee_id = ? AND work_date = ?"#,
            params![
                schedule_id,
                employee_id,
                work_date.format("%Y-%m-%d").to_string(),
            ],
            Self::map_row,
        ) {
            Ok(assignment) => Ok(Some(assignment)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 统计排班表班次条数
    pub fn count_by_schedule(&self, schedule_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM shift_assignment WHERE schedule_id = ?",
            params![schedule_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 映射数据库行到ShiftAssignment对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ShiftAssignment> {
        let source_str: String = row.get(6)?;
        Ok(ShiftAssignment {
            schedule_id: row.get(0)?,
            employee_id: row.get(1)?,
            work_date: parse_date(row, 2)?,
            position: row.get(3)?,
            start_time: parse_time(row, 4)?,
            end_time: parse_time(row, 5)?,
            source: AssignmentSource::from_str(&source_str),
            created_at: parse_datetime(row, 7)?,
            updated_at: parse_datetime(row, 8)?,
        })
    }
}

/// 事务内插入班次
fn insert_assignment_in(tx: &Transaction, assignment: &ShiftAssignment) -> RepositoryResult<()> {
    tx.execute(
        r#"INSERT INTO shift_assignment (
            schedule_id, employee_id, work_date, position,
            start_time, end_time, source_type, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
        params![
            &assignment.schedule_id,
            &assignment.employee_id,
            assignment.work_date.format("%Y-%m-%d").to_string(),
            &assignment.position,
            assignment.start_time.format("%H:%M").to_string(),
            assignment.end_time.format("%H:%M").to_string(),
            assignment.source.to_db_str(),
            assignment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            assignment.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

fn parse_time(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveTime> {
    let s: String = row.get(idx)?;
    NaiveTime::parse_from_str(&s, "%H:%M").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn string_vec_to_json(v: &[String]) -> RepositoryResult<Option<String>> {
    if v.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(v)
        .map(Some)
        .map_err(|e| RepositoryError::InternalError(e.to_string()))
}

fn json_to_string_vec(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::types::ScheduleStatus;

    fn setup() -> (Arc<Mutex<Connection>>, ScheduleRepository, AssignmentRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        let conn = Arc::new(Mutex::new(conn));
        // 预置规则集与员工,满足外键
        {
            let c = conn.lock().unwrap();
            c.execute(
                "INSERT INTO rule_set (rule_set_id, rule_set_name) VALUES ('RS1', '默认')",
                [],
            )
            .unwrap();
            c.execute(
                r#"INSERT INTO employee (employee_id, display_name, eligible_positions_json,
                                         monthly_hour_cap, hire_date)
                   VALUES ('E001', '小林', '["hall"]', 160.0, '2024-01-01')"#,
                [],
            )
            .unwrap();
        }

        (
            conn.clone(),
            ScheduleRepository::new(conn.clone()),
            AssignmentRepository::new(conn),
        )
    }

    fn sample_schedule(id: &str) -> Schedule {
        let now = chrono::Utc::now().naive_utc();
        Schedule {
            schedule_id: id.to_string(),
            period_start: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
            position_scope: vec!["hall".to_string()],
            rule_set_id: "RS1".to_string(),
            status: ScheduleStatus::Draft,
            revision: 0,
            confidence: None,
            warnings: Vec::new(),
            suggestions: Vec::new(),
            confirm_comment: None,
            confirmed_by: None,
            confirmed_at: None,
            created_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_assignment(schedule_id: &str, day: u32) -> ShiftAssignment {
        let now = chrono::Utc::now().naive_utc();
        ShiftAssignment {
            schedule_id: schedule_id.to_string(),
            employee_id: "E001".to_string(),
            work_date: NaiveDate::from_ymd_opt(2025, 2, day).unwrap(),
            position: "hall".to_string(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            source: AssignmentSource::Generated,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_and_find() {
        let (_conn, repo, _arepo) = setup();
        repo.create(&sample_schedule("S1")).unwrap();

        let found = repo.find_by_id("S1").unwrap().unwrap();
        assert_eq!(found.status, ScheduleStatus::Draft);
        assert_eq!(found.revision, 0);
        assert_eq!(found.position_scope, vec!["hall"]);
    }

    #[test]
    fn test_optimistic_lock_conflict() {
        let (_conn, repo, _arepo) = setup();
        repo.create(&sample_schedule("S1")).unwrap();

        // 两个用户读取同一 revision
        let mut user_a = repo.find_by_id("S1").unwrap().unwrap();
        let mut user_b = repo.find_by_id("S1").unwrap().unwrap();

        // 用户A先更新,成功
        user_a.status = ScheduleStatus::Generating;
        repo.update(&user_a).unwrap();

        // 用户B带旧 revision 更新,必须失败
        user_b.status = ScheduleStatus::Archived;
        let result = repo.update(&user_b);
        match result {
            Err(RepositoryError::OptimisticLockFailure {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("应返回乐观锁冲突,实际: {:?}", other),
        }
    }

    #[test]
    fn test_commit_generation_replaces_assignments() {
        let (_conn, repo, arepo) = setup();
        repo.create(&sample_schedule("S1")).unwrap();

        let mut schedule = repo.find_by_id("S1").unwrap().unwrap();
        schedule.status = ScheduleStatus::Generated;
        schedule.confidence = Some(0.9);
        schedule.warnings = vec!["2025-02-03 hall 09:00 缺 1 人".to_string()];

        repo.commit_generation(&schedule, &[sample_assignment("S1", 3), sample_assignment("S1", 4)])
            .unwrap();

        let stored = repo.find_by_id("S1").unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Generated);
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.confidence, Some(0.9));
        assert_eq!(stored.warnings.len(), 1);
        assert_eq!(arepo.count_by_schedule("S1").unwrap(), 2);

        // 再次提交(模拟重新生成),整体替换
        let schedule = repo.find_by_id("S1").unwrap().unwrap();
        repo.commit_generation(&schedule, &[sample_assignment("S1", 5)])
            .unwrap();
        assert_eq!(arepo.count_by_schedule("S1").unwrap(), 1);
    }

    #[test]
    fn test_commit_generation_stale_revision_rejected() {
        let (_conn, repo, arepo) = setup();
        repo.create(&sample_schedule("S1")).unwrap();

        let mut stale = repo.find_by_id("S1").unwrap().unwrap();

        // 期间另一个写入推进了 revision
        let mut other = repo.find_by_id("S1").unwrap().unwrap();
        other.status = ScheduleStatus::Generating;
        repo.update(&other).unwrap();

        stale.status = ScheduleStatus::Generated;
        let result = repo.commit_generation(&stale, &[sample_assignment("S1", 3)]);
        assert!(matches!(
            result,
            Err(RepositoryError::OptimisticLockFailure { .. })
        ));
        // 失败的提交不应留下半套班次
        assert_eq!(arepo.count_by_schedule("S1").unwrap(), 0);
    }

    #[test]
    fn test_assignment_edit_bumps_revision() {
        let (_conn, repo, arepo) = setup();
        repo.create(&sample_schedule("S1")).unwrap();

        let mut schedule = repo.find_by_id("S1").unwrap().unwrap();
        schedule.status = ScheduleStatus::Generated;
        repo.commit_generation(&schedule, &[]).unwrap();

        let mut schedule = repo.find_by_id("S1").unwrap().unwrap();
        schedule.status = ScheduleStatus::Adjusting;
        repo.upsert_assignment_with_revision(&schedule, &sample_assignment("S1", 3))
            .unwrap();

        let stored = repo.find_by_id("S1").unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Adjusting);
        assert_eq!(stored.revision, 2);
        assert_eq!(arepo.count_by_schedule("S1").unwrap(), 1);

        // 删除不存在的班次 -> NotFound,事务回滚,revision 不变
        let schedule = repo.find_by_id("S1").unwrap().unwrap();
        let result = repo.remove_assignment_with_revision(
            &schedule,
            "E999",
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
        );
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
        assert_eq!(repo.find_by_id("S1").unwrap().unwrap().revision, 2);
    }
}
