// ==========================================
// 餐饮门店排班系统 - 操作日志仓储
// ==========================================
// 红线: 日志写入失败只告警不阻断,由调用方决定
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::employee_repo::parse_datetime;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的ActionLogRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO action_log (
                action_id, schedule_id, action_type, action_ts, actor, payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &log.action_id,
                &log.schedule_id,
                &log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                &log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                &log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    /// 查询排班表的操作日志（新操作在前）
    pub fn find_by_schedule(&self, schedule_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, schedule_id, action_type, action_ts, actor, payload_json, detail
               FROM action_log
               WHERE schedule_id = ?
               ORDER BY action_ts DESC, action_id DESC"#,
        )?;

        let logs = stmt
            .query_map(params![schedule_id], Self::map_row)?
            .collect::<Result<Vec<ActionLog>, _>>()?;

        Ok(logs)
    }

    /// 查询最近的操作日志
    pub fn find_recent(&self, limit: u32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, schedule_id, action_type, action_ts, actor, payload_json, detail
               FROM action_log
               ORDER BY action_ts DESC, action_id DESC
               LIMIT ?"#,
        )?;

        let logs = stmt
            .query_map(params![limit], Self::map_row)?
            .collect::<Result<Vec<ActionLog>, _>>()?;

        Ok(logs)
    }

    /// 按操作类型统计条数
    pub fn count_by_type(&self, action_type: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE action_type = ?",
            params![action_type],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 映射数据库行到ActionLog对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ActionLog> {
        let payload_str: Option<String> = row.get(5)?;
        Ok(ActionLog {
            action_id: row.get(0)?,
            schedule_id: row.get(1)?,
            action_type: row.get(2)?,
            action_ts: parse_datetime(row, 3)?,
            actor: row.get(4)?,
            payload_json: payload_str.and_then(|s| serde_json::from_str(&s).ok()),
            detail: row.get(6)?,
        })
    }
}
