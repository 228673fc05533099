// ==========================================
// 餐饮门店排班系统 - 集成测试共用工具
// ==========================================
// 说明: 每个测试用独立内存库,互不串扰
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;

use dining_shift_scheduler::app::AppState;
use dining_shift_scheduler::db::{configure_sqlite_connection, init_schema};
use dining_shift_scheduler::domain::employee::{AvailabilitySubmission, Employee};
use dining_shift_scheduler::domain::rule::PositionRequirement;
use dining_shift_scheduler::domain::types::{AvailabilityStatus, DayType};

// 固定测试周期: 2025-03-03(周一) .. 2025-03-09(周日)
pub const PERIOD_START: (i32, u32, u32) = (2025, 3, 3);
pub const PERIOD_END: (i32, u32, u32) = (2025, 3, 9);

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn period_start() -> NaiveDate {
    d(PERIOD_START.0, PERIOD_START.1, PERIOD_START.2)
}

pub fn period_end() -> NaiveDate {
    d(PERIOD_END.0, PERIOD_END.1, PERIOD_END.2)
}

/// 独立内存库上的完整应用装配
pub fn test_state() -> AppState {
    let conn = Connection::open_in_memory().unwrap();
    configure_sqlite_connection(&conn).unwrap();
    init_schema(&conn).unwrap();
    AppState::from_connection(":memory:".to_string(), Arc::new(Mutex::new(conn)), None).unwrap()
}

/// 员工快照(在职,月上限 160h,2024-06-01 入职)
pub fn employee(employee_id: &str, display_name: &str, positions: &[&str]) -> Employee {
    let now = Utc::now().naive_utc();
    Employee {
        employee_id: employee_id.to_string(),
        display_name: display_name.to_string(),
        eligible_positions: positions.iter().map(|p| p.to_string()).collect(),
        monthly_hour_cap: 160.0,
        max_off_requests: 4,
        active: true,
        hire_date: d(2024, 6, 1),
        contract_end: None,
        created_at: now,
        updated_at: now,
    }
}

/// 单岗位在 [hour_from, hour_to) 的需求行(工作日与周末同值)
pub fn uniform_requirements(
    rule_set_id: &str,
    position: &str,
    hour_from: u8,
    hour_to: u8,
    required_count: u32,
) -> Vec<PositionRequirement> {
    let mut rows = Vec::new();
    for day_type in [DayType::Weekday, DayType::Weekend] {
        for hour in hour_from..hour_to {
            rows.push(PositionRequirement {
                rule_set_id: rule_set_id.to_string(),
                position: position.to_string(),
                day_type,
                hour,
                required_count,
            });
        }
    }
    rows
}

/// 提交周期内每天的 OK 意向(无时间窗)
pub fn submit_ok_for_period(state: &AppState, employee_id: &str) {
    let mut date = period_start();
    while date <= period_end() {
        submit(state, employee_id, date, AvailabilityStatus::Ok, None, None);
        date = date.succ_opt().unwrap();
    }
}

pub fn submit(
    state: &AppState,
    employee_id: &str,
    work_date: NaiveDate,
    status: AvailabilityStatus,
    preferred_start: Option<NaiveTime>,
    preferred_end: Option<NaiveTime>,
) {
    let submission = AvailabilitySubmission {
        employee_id: employee_id.to_string(),
        work_date,
        status,
        preferred_start,
        preferred_end,
        note: None,
    };
    state
        .roster_api
        .submit_availability(&submission, "tester")
        .unwrap();
}

/// 常用基线: 规则集 + hall 岗位 10..12 每小时 1 人 + 指定员工全周期 OK
///
/// 返回 rule_set_id
pub fn seed_hall_baseline(state: &AppState, employee_ids: &[&str]) -> String {
    let rule_set = state
        .rule_set_api
        .create_rule_set("测试规则集", None, None, vec![], "tester")
        .unwrap();
    state
        .rule_set_api
        .replace_requirements(
            &rule_set.rule_set_id,
            uniform_requirements(&rule_set.rule_set_id, "hall", 10, 12, 1),
            "tester",
        )
        .unwrap();

    for id in employee_ids {
        state
            .roster_api
            .upsert_employee(&employee(id, &format!("员工{}", id), &["hall"]), "tester")
            .unwrap();
        submit_ok_for_period(state, id);
    }
    rule_set.rule_set_id
}

/// 在基线规则集上创建覆盖全周期的 hall 排班表
pub fn create_hall_schedule(state: &AppState, rule_set_id: &str) -> String {
    state
        .schedule_api
        .create_schedule(
            period_start(),
            period_end(),
            vec!["hall".to_string()],
            rule_set_id,
            "tester",
        )
        .unwrap()
        .schedule_id
}
