// ==========================================
// 餐饮门店排班系统 - 规则集仓储
// ==========================================
// 覆盖三张表: rule_set / position_requirement / scheduling_rule
// 红线: Repository 不含业务逻辑,只做数据映射
// ==========================================

use crate::domain::rule::{PositionRequirement, RuleBody, RuleSet, RuleSetDetail, SchedulingRule};
use crate::domain::types::DayType;
use crate::repository::employee_repo::parse_datetime;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// RuleSetRepository - 规则集仓储
// ==========================================
pub struct RuleSetRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RuleSetRepository {
    /// 创建新的RuleSetRepository实例
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
    // rule_set 主数据
    // ==========================================

    /// 创建规则集
    pub fn create(&self, rule_set: &RuleSet) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO rule_set (
                rule_set_id, rule_set_name, consecutive_day_limit,
                rest_hours, holiday_dates_json, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                &rule_set.rule_set_id,
                &rule_set.rule_set_name,
                rule_set.consecutive_day_limit,
                rule_set.rest_hours,
                holidays_to_json(&rule_set.holiday_dates)?,
                rule_set.active as i32,
                rule_set.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                rule_set.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(rule_set.rule_set_id.clone())
    }

    /// 更新规则集主数据
    pub fn update(&self, rule_set: &RuleSet) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            r#"UPDATE rule_set
               SET rule_set_name = ?, consecutive_day_limit = ?, rest_hours = ?,
                   holiday_dates_json = ?, active = ?, updated_at = ?
               WHERE rule_set_id = ?"#,
            params![
                &rule_set.rule_set_name,
                rule_set.consecutive_day_limit,
                rule_set.rest_hours,
                holidays_to_json(&rule_set.holiday_dates)?,
                rule_set.active as i32,
                rule_set.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &rule_set.rule_set_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "RuleSet".to_string(),
                id: rule_set.rule_set_id.clone(),
            });
        }
        Ok(())
    }

    /// 按rule_set_id查询规则集
    pub fn find_by_id(&self, rule_set_id: &str) -> RepositoryResult<Option<RuleSet>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT rule_set_id, rule_set_name, consecutive_day_limit,
                      rest_hours, holiday_dates_json, active, created_at, updated_at
               FROM rule_set WHERE rule_set_id = ?"#,
            params![rule_set_id],
            Self::map_rule_set_row,
        ) {
            Ok(rs) => Ok(Some(rs)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部规则集
    pub fn find_all(&self, only_active: bool) -> RepositoryResult<Vec<RuleSet>> {
        let conn = self.get_conn()?;

        let sql = if only_active {
            r#"SELECT rule_set_id, rule_set_name, consecutive_day_limit,
                      rest_hours, holiday_dates_json, active, created_at, updated_at
               FROM rule_set WHERE active = 1 ORDER BY created_at DESC"#
        } else {
            r#"SELECT rule_set_id, rule_set_name, consecutive_day_limit,
                      rest_hours, holiday_dates_json, active, created_at, updated_at
               FROM rule_set ORDER BY created_at DESC"#
        };

        let mut stmt = conn.prepare(sql)?;
        let rule_sets = stmt
            .query_map([], Self::map_rule_set_row)?
            .collect::<Result<Vec<RuleSet>, _>>()?;

        Ok(rule_sets)
    }

    fn map_rule_set_row(row: &rusqlite::Row) -> rusqlite::Result<RuleSet> {
        let holidays_json: Option<String> = row.get(4)?;
        let holiday_dates: Vec<NaiveDate> = match holidays_json {
            Some(s) => serde_json::from_str(&s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
            None => Vec::new(),
        };

        Ok(RuleSet {
            rule_set_id: row.get(0)?,
            rule_set_name: row.get(1)?,
            consecutive_day_limit: row.get(2)?,
            rest_hours: row.get(3)?,
            holiday_dates,
            active: row.get::<_, i32>(5)? != 0,
            created_at: parse_datetime(row, 6)?,
            updated_at: parse_datetime(row, 7)?,
        })
    }

    // ==========================================
    // position_requirement 人数需求表
    // ==========================================

    /// 整体替换规则集的人数需求表（单事务）
    ///
    /// 需求表按 (岗位, 日型, 小时) 全量提交,部分更新容易留下脏槽位
    pub fn replace_requirements(
        &self,
        rule_set_id: &str,
        requirements: &[PositionRequirement],
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM position_requirement WHERE rule_set_id = ?",
            params![rule_set_id],
        )?;

        for req in requirements {
            tx.execute(
                r#"INSERT INTO position_requirement (
                    rule_set_id, position, day_type, hour, required_count
                ) VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![
                    rule_set_id,
                    &req.position,
                    req.day_type.to_db_str(),
                    req.hour as i32,
                    req.required_count as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(requirements.len())
    }

    /// 查询规则集的人数需求表
    pub fn find_requirements(&self, rule_set_id: &str) -> RepositoryResult<Vec<PositionRequirement>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT rule_set_id, position, day_type, hour, required_count
               FROM position_requirement
               WHERE rule_set_id = ?
               ORDER BY position, day_type, hour"#,
        )?;

        let requirements = stmt
            .query_map(params![rule_set_id], |row| {
                let day_type_str: String = row.get(2)?;
                Ok(PositionRequirement {
                    rule_set_id: row.get(0)?,
                    position: row.get(1)?,
                    day_type: DayType::from_str(&day_type_str),
                    hour: row.get::<_, i32>(3)? as u8,
                    required_count: row.get::<_, i64>(4)? as u32,
                })
            })?
            .collect::<Result<Vec<PositionRequirement>, _>>()?;

        Ok(requirements)
    }

    // ==========================================
    // scheduling_rule 自定义规则
    // ==========================================

    /// 新增自定义规则
    pub fn insert_rule(&self, rule: &SchedulingRule) -> RepositoryResult<String> {
        let params_json = serde_json::to_string(&rule.body)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO scheduling_rule (
                rule_id, rule_set_id, rule_type, params_json, mandatory, active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &rule.rule_id,
                &rule.rule_set_id,
                rule.body.rule_type().to_db_str(),
                &params_json,
                rule.mandatory as i32,
                rule.active as i32,
                rule.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(rule.rule_id.clone())
    }

    /// 停用规则（软删除,保留审计痕迹）
    pub fn deactivate_rule(&self, rule_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            "UPDATE scheduling_rule SET active = 0 WHERE rule_id = ?",
            params![rule_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "SchedulingRule".to_string(),
                id: rule_id.to_string(),
            });
        }
        Ok(())
    }

    /// 查询规则集的自定义规则
    ///
    /// params_json 解析失败的行跳过并告警,不让一条坏规则拖垮整个规则集加载
    pub fn find_rules(
        &self,
        rule_set_id: &str,
        only_active: bool,
    ) -> RepositoryResult<Vec<SchedulingRule>> {
        let conn = self.get_conn()?;

        let sql = if only_active {
            r#"SELECT rule_id, rule_set_id, rule_type, params_json, mandatory, active, created_at
               FROM scheduling_rule
               WHERE rule_set_id = ? AND active = 1
               ORDER BY created_at"#
        } else {
            r#"SELECT rule_id, rule_set_id, rule_type, params_json, mandatory, active, created_at
               FROM scheduling_rule
               WHERE rule_set_id = ?
               ORDER BY created_at"#
        };

        let mut stmt = conn.prepare(sql)?;
        let raw_rows = stmt
            .query_map(params![rule_set_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i32>(4)? != 0,
                    row.get::<_, i32>(5)? != 0,
                    parse_datetime(row, 6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rules = Vec::with_capacity(raw_rows.len());
        for (rule_id, rs_id, params_json, mandatory, active, created_at) in raw_rows {
            match serde_json::from_str::<RuleBody>(&params_json) {
                Ok(body) => rules.push(SchedulingRule {
                    rule_id,
                    rule_set_id: rs_id,
                    body,
                    mandatory,
                    active,
                    created_at,
                }),
                Err(e) => {
                    warn!(rule_id = %rule_id, error = %e, "规则参数解析失败,跳过该规则");
                }
            }
        }

        Ok(rules)
    }

    // ==========================================
    // 聚合查询
    // ==========================================

    /// 查询规则集完整详情（主数据 + 需求表 + 启用规则）
    pub fn find_detail(&self, rule_set_id: &str) -> RepositoryResult<Option<RuleSetDetail>> {
        let rule_set = match self.find_by_id(rule_set_id)? {
            Some(rs) => rs,
            None => return Ok(None),
        };

        let requirements = self.find_requirements(rule_set_id)?;
        let rules = self.find_rules(rule_set_id, true)?;

        Ok(Some(RuleSetDetail {
            rule_set,
            requirements,
            rules,
        }))
    }
}

/// 节假日列表 -> JSON 文本（空列表存 NULL,便于区分“未配置”）
fn holidays_to_json(holidays: &[NaiveDate]) -> RepositoryResult<Option<String>> {
    if holidays.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(holidays)
        .map(Some)
        .map_err(|e| RepositoryError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> RuleSetRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        RuleSetRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn sample_rule_set(id: &str) -> RuleSet {
        let now = chrono::Utc::now().naive_utc();
        RuleSet {
            rule_set_id: id.to_string(),
            rule_set_name: "二月默认".to_string(),
            consecutive_day_limit: Some(5),
            rest_hours: None,
            holiday_dates: vec![NaiveDate::from_ymd_opt(2025, 2, 11).unwrap()],
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_and_find_detail() {
        let repo = setup();
        repo.create(&sample_rule_set("RS1")).unwrap();

        let reqs = vec![
            PositionRequirement {
                rule_set_id: "RS1".to_string(),
                position: "hall".to_string(),
                day_type: DayType::Weekday,
                hour: 9,
                required_count: 2,
            },
            PositionRequirement {
                rule_set_id: "RS1".to_string(),
                position: "hall".to_string(),
                day_type: DayType::Weekend,
                hour: 9,
                required_count: 3,
            },
        ];
        repo.replace_requirements("RS1", &reqs).unwrap();

        repo.insert_rule(&SchedulingRule {
            rule_id: "R1".to_string(),
            rule_set_id: "RS1".to_string(),
            body: RuleBody::Pairing {
                employee_a: "E001".to_string(),
                employee_b: "E002".to_string(),
            },
            mandatory: false,
            active: true,
            created_at: chrono::Utc::now().naive_utc(),
        })
        .unwrap();

        let detail = repo.find_detail("RS1").unwrap().unwrap();
        assert_eq!(detail.rule_set.rule_set_name, "二月默认");
        assert_eq!(detail.rule_set.holiday_dates.len(), 1);
        assert_eq!(detail.requirements.len(), 2);
        assert_eq!(detail.rules.len(), 1);
    }

    #[test]
    fn test_replace_requirements_is_full_swap() {
        let repo = setup();
        repo.create(&sample_rule_set("RS1")).unwrap();

        let first = vec![PositionRequirement {
            rule_set_id: "RS1".to_string(),
            position: "hall".to_string(),
            day_type: DayType::Weekday,
            hour: 9,
            required_count: 2,
        }];
        repo.replace_requirements("RS1", &first).unwrap();

        let second = vec![PositionRequirement {
            rule_set_id: "RS1".to_string(),
            position: "kitchen".to_string(),
            day_type: DayType::Weekday,
            hour: 12,
            required_count: 1,
        }];
        repo.replace_requirements("RS1", &second).unwrap();

        let reqs = repo.find_requirements("RS1").unwrap();
        assert_eq!(reqs.len(), 1, "整体替换后旧槽位不应残留");
        assert_eq!(reqs[0].position, "kitchen");
    }

    #[test]
    fn test_bad_rule_row_skipped() {
        let repo = setup();
        repo.create(&sample_rule_set("RS1")).unwrap();

        // 直接向表里塞一条解析不了的规则,模拟历史脏数据
        {
            let conn = repo.conn.lock().unwrap();
            conn.execute(
                r#"INSERT INTO scheduling_rule (
                    rule_id, rule_set_id, rule_type, params_json, mandatory, active, created_at
                ) VALUES ('BAD', 'RS1', 'PAIRING', '{"type":"NO_SUCH"}', 0, 1, '2025-01-01 00:00:00')"#,
                [],
            )
            .unwrap();
        }

        repo.insert_rule(&SchedulingRule {
            rule_id: "R1".to_string(),
            rule_set_id: "RS1".to_string(),
            body: RuleBody::FreeTextAdvisory {
                text: "尽量别连排新人".to_string(),
            },
            mandatory: false,
            active: true,
            created_at: chrono::Utc::now().naive_utc(),
        })
        .unwrap();

        let rules = repo.find_rules("RS1", true).unwrap();
        assert_eq!(rules.len(), 1, "坏行应被跳过,好行正常返回");
        assert_eq!(rules[0].rule_id, "R1");
    }
}
