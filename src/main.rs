// ==========================================
// 餐饮门店排班系统 - 命令行入口
// ==========================================
// 用途: 本地演示与冒烟验证,空库时写入演示数据并跑一次生成
// ==========================================

use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate, Utc};

use dining_shift_scheduler::app::{get_default_db_path, AppState};
use dining_shift_scheduler::domain::employee::Employee;
use dining_shift_scheduler::domain::rule::PositionRequirement;
use dining_shift_scheduler::domain::types::DayType;
use dining_shift_scheduler::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", dining_shift_scheduler::APP_NAME, dining_shift_scheduler::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, "使用数据库");

    let state = AppState::new(db_path).map_err(|e| anyhow::anyhow!(e))?;

    let rule_set_id = ensure_demo_data(&state)?;

    // 下周一为起点的 7 天周期
    let today = Utc::now().date_naive();
    let offset = 7 - i64::from(today.weekday().num_days_from_monday());
    let period_start = today + Duration::days(offset);
    let period_end = period_start + Duration::days(6);

    let schedule = state.schedule_api.create_schedule(
        period_start,
        period_end,
        vec!["hall".to_string(), "kitchen".to_string()],
        &rule_set_id,
        "admin",
    )?;
    tracing::info!(schedule_id = %schedule.schedule_id, "演示排班表已创建");

    let summary = state
        .schedule_api
        .generate(&schedule.schedule_id, "admin")
        .await
        .context("生成运行失败")?;
    tracing::info!(
        assignments = summary.assignment_count,
        confidence = summary.confidence,
        met = summary.coverage.met,
        understaffed = summary.coverage.understaffed,
        overstaffed = summary.coverage.overstaffed,
        "生成完成"
    );
    for warning in &summary.warnings {
        tracing::warn!("警告: {}", warning);
    }
    for suggestion in &summary.suggestions {
        tracing::info!("建议: {}", suggestion);
    }

    Ok(())
}

/// 空库时写入演示规则集与员工;已有数据时复用第一个启用规则集
fn ensure_demo_data(state: &AppState) -> anyhow::Result<String> {
    let existing = state.rule_set_api.list_rule_sets(true)?;
    if let Some(rule_set) = existing.first() {
        return Ok(rule_set.rule_set_id.clone());
    }

    tracing::info!("空数据库,写入演示数据");
    let rule_set = state
        .rule_set_api
        .create_rule_set("标准周", None, None, vec![], "admin")?;

    // 午市 11-14 / 晚市 17-21;周末各加一人
    let mut requirements = Vec::new();
    for position in ["hall", "kitchen"] {
        for day_type in [DayType::Weekday, DayType::Weekend] {
            let extra = u32::from(day_type == DayType::Weekend);
            for hour in 11u8..14 {
                requirements.push(PositionRequirement {
                    rule_set_id: rule_set.rule_set_id.clone(),
                    position: position.to_string(),
                    day_type,
                    hour,
                    required_count: 1 + extra,
                });
            }
            for hour in 17u8..21 {
                requirements.push(PositionRequirement {
                    rule_set_id: rule_set.rule_set_id.clone(),
                    position: position.to_string(),
                    day_type,
                    hour,
                    required_count: 1 + extra,
                });
            }
        }
    }
    state
        .rule_set_api
        .replace_requirements(&rule_set.rule_set_id, requirements, "admin")?;

    let hire_date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_else(|| Utc::now().date_naive());
    let now = Utc::now().naive_utc();
    let demo_staff = [
        ("E001", "田中", vec!["hall", "kitchen"]),
        ("E002", "佐藤", vec!["hall"]),
        ("E003", "铃木", vec!["kitchen"]),
        ("E004", "高桥", vec!["hall", "kitchen"]),
        ("E005", "渡边", vec!["hall"]),
    ];
    for (employee_id, display_name, positions) in demo_staff {
        let employee = Employee {
            employee_id: employee_id.to_string(),
            display_name: display_name.to_string(),
            eligible_positions: positions.into_iter().map(str::to_string).collect(),
            monthly_hour_cap: 160.0,
            max_off_requests: 4,
            active: true,
            hire_date,
            contract_end: None,
            created_at: now,
            updated_at: now,
        };
        state.roster_api.upsert_employee(&employee, "admin")?;
    }

    Ok(rule_set.rule_set_id)
}
