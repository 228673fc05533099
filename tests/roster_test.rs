// ==========================================
// 餐饮门店排班系统 - 花名册与意向提交集成测试
// ==========================================

mod helpers;

use dining_shift_scheduler::api::ApiError;
use dining_shift_scheduler::domain::employee::AvailabilitySubmission;
use dining_shift_scheduler::domain::types::AvailabilityStatus;
use helpers::*;

fn ng(employee_id: &str, date: chrono::NaiveDate) -> AvailabilitySubmission {
    AvailabilitySubmission {
        employee_id: employee_id.to_string(),
        work_date: date,
        status: AvailabilityStatus::Ng,
        preferred_start: None,
        preferred_end: None,
        note: None,
    }
}

#[tokio::test]
async fn test_off_request_quota_per_month() {
    let state = test_state();
    let mut e = employee("E001", "田中", &["hall"]);
    e.max_off_requests = 2;
    state.roster_api.upsert_employee(&e, "tester").unwrap();

    state
        .roster_api
        .submit_availability(&ng("E001", d(2025, 3, 3)), "tester")
        .unwrap();
    state
        .roster_api
        .submit_availability(&ng("E001", d(2025, 3, 10)), "tester")
        .unwrap();

    // 当月第三次 NG 超配额
    let err = state
        .roster_api
        .submit_availability(&ng("E001", d(2025, 3, 17)), "tester")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    // 改写已有 NG 不重复计数
    state
        .roster_api
        .submit_availability(&ng("E001", d(2025, 3, 10)), "tester")
        .unwrap();

    // 跨月不受本月配额影响
    state
        .roster_api
        .submit_availability(&ng("E001", d(2025, 4, 7)), "tester")
        .unwrap();
}

#[tokio::test]
async fn test_submission_shape_validation() {
    let state = test_state();
    state
        .roster_api
        .upsert_employee(&employee("E001", "田中", &["hall"]), "tester")
        .unwrap();

    // NG 不允许带期望时间窗
    let mut bad = ng("E001", d(2025, 3, 3));
    bad.preferred_start = Some(t(10, 0));
    bad.preferred_end = Some(t(14, 0));
    let err = state
        .roster_api
        .submit_availability(&bad, "tester")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    // 时间窗必须成对
    let half = AvailabilitySubmission {
        employee_id: "E001".to_string(),
        work_date: d(2025, 3, 3),
        status: AvailabilityStatus::Ok,
        preferred_start: Some(t(10, 0)),
        preferred_end: None,
        note: None,
    };
    assert!(state
        .roster_api
        .submit_availability(&half, "tester")
        .is_err());

    // UNKNOWN 只作为内部补位语义,不接受提交
    let unknown = AvailabilitySubmission {
        employee_id: "E001".to_string(),
        work_date: d(2025, 3, 3),
        status: AvailabilityStatus::Unknown,
        preferred_start: None,
        preferred_end: None,
        note: None,
    };
    assert!(state
        .roster_api
        .submit_availability(&unknown, "tester")
        .is_err());
}

#[tokio::test]
async fn test_deactivated_employee_rejects_submission() {
    let state = test_state();
    state
        .roster_api
        .upsert_employee(&employee("E001", "田中", &["hall"]), "tester")
        .unwrap();
    state
        .roster_api
        .deactivate_employee("E001", "tester")
        .unwrap();

    let ok = AvailabilitySubmission {
        employee_id: "E001".to_string(),
        work_date: d(2025, 3, 3),
        status: AvailabilityStatus::Ok,
        preferred_start: None,
        preferred_end: None,
        note: None,
    };
    let err = state
        .roster_api
        .submit_availability(&ok, "tester")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    // 快照保留,列表可见非在职
    assert!(!state.roster_api.get_employee("E001").unwrap().active);
    assert!(state.roster_api.list_employees(true).unwrap().is_empty());
    assert_eq!(state.roster_api.list_employees(false).unwrap().len(), 1);
}
