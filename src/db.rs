// ==========================================
// 餐饮门店排班系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 内置建库 DDL，库文件不存在时可直接初始化
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建库 DDL（v0.1）
///
/// 约定:
/// - 所有日期/时间以 TEXT 存储（ISO-8601）
/// - JSON 列以 `_json` 后缀命名
/// - schedule.revision 为乐观锁计数器，更新必须带 WHERE revision 条件
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS employee (
    employee_id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    eligible_positions_json TEXT NOT NULL,
    monthly_hour_cap REAL NOT NULL,
    max_off_requests INTEGER NOT NULL DEFAULT 4,
    active INTEGER NOT NULL DEFAULT 1,
    hire_date TEXT NOT NULL,
    contract_end TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS availability_entry (
    employee_id TEXT NOT NULL REFERENCES employee(employee_id) ON DELETE CASCADE,
    work_date TEXT NOT NULL,
    status TEXT NOT NULL,
    preferred_start TEXT,
    preferred_end TEXT,
    note TEXT,
    submitted_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (employee_id, work_date)
);

CREATE TABLE IF NOT EXISTS rule_set (
    rule_set_id TEXT PRIMARY KEY,
    rule_set_name TEXT NOT NULL,
    consecutive_day_limit INTEGER,
    rest_hours REAL,
    holiday_dates_json TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS position_requirement (
    rule_set_id TEXT NOT NULL REFERENCES rule_set(rule_set_id) ON DELETE CASCADE,
    position TEXT NOT NULL,
    day_type TEXT NOT NULL,
    hour INTEGER NOT NULL CHECK(hour >= 0 AND hour < 24),
    required_count INTEGER NOT NULL CHECK(required_count >= 0),
    PRIMARY KEY (rule_set_id, position, day_type, hour)
);

CREATE TABLE IF NOT EXISTS scheduling_rule (
    rule_id TEXT PRIMARY KEY,
    rule_set_id TEXT NOT NULL REFERENCES rule_set(rule_set_id) ON DELETE CASCADE,
    rule_type TEXT NOT NULL,
    params_json TEXT NOT NULL,
    mandatory INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS schedule (
    schedule_id TEXT PRIMARY KEY,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    position_scope_json TEXT NOT NULL,
    rule_set_id TEXT NOT NULL REFERENCES rule_set(rule_set_id),
    status TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 0,
    confidence REAL,
    warnings_json TEXT,
    suggestions_json TEXT,
    confirm_comment TEXT,
    confirmed_by TEXT,
    confirmed_at TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS shift_assignment (
    schedule_id TEXT NOT NULL REFERENCES schedule(schedule_id) ON DELETE CASCADE,
    employee_id TEXT NOT NULL REFERENCES employee(employee_id),
    work_date TEXT NOT NULL,
    position TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    source_type TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (schedule_id, employee_id, work_date)
);

CREATE INDEX IF NOT EXISTS idx_shift_assignment_date
  ON shift_assignment(schedule_id, work_date, position);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    -- schedule_id 可空：部分操作（如导入花名册/配置变更）不绑定具体排班表
    schedule_id TEXT,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_schedule
  ON action_log(schedule_id, action_ts);
"#;

/// 初始化数据库 schema（幂等）
///
/// # 返回
/// - true: 本次调用写入了 schema_version（新库）
/// - false: 库已有版本记录
pub fn init_schema(conn: &Connection) -> rusqlite::Result<bool> {
    conn.execute_batch(SCHEMA_SQL)?;

    let existing = read_schema_version(conn)?;
    match existing {
        Some(v) if v >= CURRENT_SCHEMA_VERSION => Ok(false),
        Some(v) => {
            tracing::warn!(
                found = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本低于当前代码期望，请确认升级脚本已执行"
            );
            Ok(false)
        }
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [CURRENT_SCHEMA_VERSION],
            )?;
            Ok(true)
        }
    }
}
