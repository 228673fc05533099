// ==========================================
// 餐饮门店排班系统 - 入参校验器
// ==========================================
// 职责: API 层共用的入参形状校验
// 红线: 只做形状/范围判定,业务约束归规则引擎与生命周期控制器
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use chrono::NaiveDate;
use std::collections::HashSet;

/// 字符串字段非空(trim 后)
pub fn require_non_empty(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

/// 排班周期形状: 起始不晚于结束
pub fn validate_period(period_start: NaiveDate, period_end: NaiveDate) -> ApiResult<()> {
    if period_start > period_end {
        return Err(ApiError::InvalidInput(format!(
            "排班周期非法: {} > {}",
            period_start, period_end
        )));
    }
    Ok(())
}

/// 岗位范围: 非空、无空白项、无重复
pub fn validate_position_scope(scope: &[String]) -> ApiResult<()> {
    if scope.is_empty() {
        return Err(ApiError::InvalidInput("岗位范围不能为空".to_string()));
    }

    let mut seen = HashSet::new();
    for position in scope {
        if position.trim().is_empty() {
            return Err(ApiError::InvalidInput("岗位范围含空白项".to_string()));
        }
        if !seen.insert(position.as_str()) {
            return Err(ApiError::InvalidInput(format!(
                "岗位范围含重复项: {}",
                position
            )));
        }
    }
    Ok(())
}

/// 小时槽范围: 0..24
pub fn validate_hour(hour: u8, field: &str) -> ApiResult<()> {
    if hour >= 24 {
        return Err(ApiError::InvalidInput(format!(
            "{}越界: {} (合法范围 0..24)",
            field, hour
        )));
    }
    Ok(())
}
