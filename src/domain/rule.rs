// ==========================================
// 餐饮门店排班系统 - 规则集领域模型
// ==========================================
// 规则集 = 岗位人数需求表 + 自定义规则 + 全局覆盖项(连续天数/休息时长/节假日)
// 红线: 结构化规则必须可机器判定;自由文本只作人工提示,永不阻断
// ==========================================

use crate::domain::types::{DayType, RuleType};
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// RuleSet - 规则集
// ==========================================
// 用途: 按运行场景选择(如"旺季"/"淡季")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub rule_set_id: String,                // 规则集ID
    pub rule_set_name: String,              // 规则集名称
    pub consecutive_day_limit: Option<i32>, // 连续工作天数上限覆盖(空=系统默认)
    pub rest_hours: Option<f64>,            // 最小休息时长覆盖(小时,空=系统默认)
    pub holiday_dates: Vec<NaiveDate>,      // 节假日覆盖(按周末需求表处理)
    pub active: bool,                       // 启用标志
    pub created_at: NaiveDateTime,          // 创建时间
    pub updated_at: NaiveDateTime,          // 更新时间
}

impl RuleSet {
    /// 判断日期是否命中节假日覆盖
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_dates.contains(&date)
    }

    /// 解析日型:节假日覆盖优先,其余按日历星期
    pub fn day_type_of(&self, date: NaiveDate) -> DayType {
        if self.is_holiday(date) {
            DayType::Weekend
        } else {
            DayType::from_date(date)
        }
    }
}

// ==========================================
// PositionRequirement - 岗位人数需求
// ==========================================
// 不变量: required_count >= 0;缺失小时行按 0 处理
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRequirement {
    pub rule_set_id: String,  // 所属规则集
    pub position: String,     // 岗位
    pub day_type: DayType,    // 日型
    pub hour: u8,             // 小时 (0..24)
    pub required_count: u32,  // 应配人数
}

/// 按 (岗位, 日型) 聚合为 24 小时稠密向量
///
/// # 返回
/// - HashMap<(position, day_type), [u32; 24]>
pub fn dense_requirement_vectors(
    rows: &[PositionRequirement],
) -> HashMap<(String, DayType), [u32; 24]> {
    let mut vectors: HashMap<(String, DayType), [u32; 24]> = HashMap::new();
    for row in rows {
        let entry = vectors
            .entry((row.position.clone(), row.day_type))
            .or_insert([0u32; 24]);
        if usize::from(row.hour) < 24 {
            entry[usize::from(row.hour)] = row.required_count;
        }
    }
    vectors
}

// ==========================================
// SchedulingRule - 自定义规则
// ==========================================
// 参数体按 rule_type 区分,落库为 params_json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingRule {
    pub rule_id: String,           // 规则ID
    pub rule_set_id: String,       // 所属规则集
    pub body: RuleBody,            // 规则参数体(带类型标签)
    pub mandatory: bool,           // 是否强制(强制=硬约束,否则软约束)
    pub active: bool,              // 启用标志
    pub created_at: NaiveDateTime, // 创建时间
}

impl SchedulingRule {
    pub fn rule_type(&self) -> RuleType {
        self.body.rule_type()
    }

    /// 自由文本提示永远按软约束处理,无视 mandatory 标志
    pub fn is_hard(&self) -> bool {
        self.mandatory && self.rule_type() != RuleType::FreeTextAdvisory
    }
}

// ==========================================
// RuleBody - 规则参数体(标签联合)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleBody {
    /// 搭档规则: 两名员工在同一日期需同班(存在时间重叠的班次)
    Pairing {
        employee_a: String,
        employee_b: String,
    },
    /// 回避规则: 某员工在指定星期/小时段内不安排班次
    ///
    /// weekday 为空表示每天生效;hour_from..hour_to 为左闭右开小时区间
    Avoidance {
        employee_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        weekday: Option<Weekday>,
        hour_from: u8,
        hour_to: u8,
    },
    /// 连续工作天数上限: 可绑定若干员工(空=全员),比系统默认更严时生效
    ConsecutiveCap {
        employee_ids: Vec<String>,
        max_days: u32,
    },
    /// 自由文本提示: 不机器判定,生成时原样转为建议供人工复核
    FreeTextAdvisory { text: String },
}

impl RuleBody {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleBody::Pairing { .. } => RuleType::Pairing,
            RuleBody::Avoidance { .. } => RuleType::Avoidance,
            RuleBody::ConsecutiveCap { .. } => RuleType::ConsecutiveCap,
            RuleBody::FreeTextAdvisory { .. } => RuleType::FreeTextAdvisory,
        }
    }

    /// 规则是否约束指定员工
    pub fn applies_to(&self, employee_id: &str) -> bool {
        match self {
            RuleBody::Pairing {
                employee_a,
                employee_b,
            } => employee_a == employee_id || employee_b == employee_id,
            RuleBody::Avoidance { employee_id: e, .. } => e == employee_id,
            RuleBody::ConsecutiveCap { employee_ids, .. } => {
                employee_ids.is_empty() || employee_ids.iter().any(|e| e == employee_id)
            }
            RuleBody::FreeTextAdvisory { .. } => false,
        }
    }
}

// ==========================================
// RuleSetDetail - 规则集详情(聚合读取)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDetail {
    pub rule_set: RuleSet,
    pub requirements: Vec<PositionRequirement>,
    pub rules: Vec<SchedulingRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_body_json_tag_roundtrip() {
        let body = RuleBody::Avoidance {
            employee_id: "E001".to_string(),
            weekday: Some(Weekday::Tue),
            hour_from: 6,
            hour_to: 12,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains(r#""type":"AVOIDANCE""#), "json={}", json);

        let parsed: RuleBody = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, body);
    }

    #[test]
    fn test_free_text_never_hard() {
        let rule = SchedulingRule {
            rule_id: "R1".to_string(),
            rule_set_id: "RS1".to_string(),
            body: RuleBody::FreeTextAdvisory {
                text: "周五晚高峰尽量安排老员工".to_string(),
            },
            mandatory: true,
            active: true,
            created_at: chrono::Utc::now().naive_utc(),
        };
        assert!(!rule.is_hard(), "自由文本规则即使标记强制也不按硬约束");
    }

    #[test]
    fn test_holiday_override_day_type() {
        let rs = RuleSet {
            rule_set_id: "RS1".to_string(),
            rule_set_name: "旺季".to_string(),
            consecutive_day_limit: None,
            rest_hours: None,
            // 2025-02-11 是周二,被节假日覆盖
            holiday_dates: vec![NaiveDate::from_ymd_opt(2025, 2, 11).unwrap()],
            active: true,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
        };
        assert_eq!(
            rs.day_type_of(NaiveDate::from_ymd_opt(2025, 2, 11).unwrap()),
            DayType::Weekend
        );
        assert_eq!(
            rs.day_type_of(NaiveDate::from_ymd_opt(2025, 2, 12).unwrap()),
            DayType::Weekday
        );
    }

    #[test]
    fn test_dense_requirement_vectors() {
        let rows = vec![
            PositionRequirement {
                rule_set_id: "RS1".to_string(),
                position: "hall".to_string(),
                day_type: DayType::Weekday,
                hour: 12,
                required_count: 3,
            },
            PositionRequirement {
                rule_set_id: "RS1".to_string(),
                position: "hall".to_string(),
                day_type: DayType::Weekday,
                hour: 13,
                required_count: 2,
            },
        ];
        let vectors = dense_requirement_vectors(&rows);
        let v = vectors.get(&("hall".to_string(), DayType::Weekday)).unwrap();
        assert_eq!(v[12], 3);
        assert_eq!(v[13], 2);
        // 缺失小时行按 0 处理
        assert_eq!(v[9], 0);
    }

    #[test]
    fn test_consecutive_cap_applies_to() {
        let all = RuleBody::ConsecutiveCap {
            employee_ids: vec![],
            max_days: 5,
        };
        assert!(all.applies_to("E001"));

        let scoped = RuleBody::ConsecutiveCap {
            employee_ids: vec!["E002".to_string()],
            max_days: 4,
        };
        assert!(!scoped.applies_to("E001"));
        assert!(scoped.applies_to("E002"));
    }
}
