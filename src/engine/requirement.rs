// ==========================================
// 餐饮门店排班系统 - 人数需求解析 (Requirement Resolver)
// ==========================================
// 职责: (日期, 岗位, 小时) -> 应配人数 的稠密解析
// 口径: 日型按日历星期,节假日覆盖映射到周末表;缺失小时行按 0
// 红线: 范围内岗位在周期出现的日型缺整张需求表 -> 配置错误,生成前中止
// ==========================================

use crate::domain::rule::{dense_requirement_vectors, PositionRequirement, RuleSet};
use crate::domain::types::DayType;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

// ==========================================
// RequirementPlan - 周期内稠密需求
// ==========================================
#[derive(Debug, Clone)]
pub struct RequirementPlan {
    /// (日期, 岗位) -> 24 小时应配人数向量
    vectors: HashMap<(NaiveDate, String), [u32; 24]>,
    /// 日期升序、岗位升序的槽位遍历顺序（保证生成确定性）
    ordered_keys: Vec<(NaiveDate, String)>,
}

impl RequirementPlan {
    /// 查询单槽应配人数
    pub fn required(&self, date: NaiveDate, position: &str, hour: u8) -> u32 {
        if hour >= 24 {
            return 0;
        }
        self.vectors
            .get(&(date, position.to_string()))
            .map(|v| v[usize::from(hour)])
            .unwrap_or(0)
    }

    /// 按 (日期, 岗位) 升序遍历需求向量
    pub fn iter_ordered(&self) -> impl Iterator<Item = (&NaiveDate, &str, &[u32; 24])> {
        self.ordered_keys.iter().map(move |key| {
            let v = &self.vectors[key];
            (&key.0, key.1.as_str(), v)
        })
    }

    /// 周期内应配人次合计
    pub fn total_required(&self) -> u32 {
        self.vectors.values().map(|v| v.iter().sum::<u32>()).sum()
    }
}

// ==========================================
// RequirementResolver - 需求解析器
// ==========================================
pub struct RequirementResolver;

impl RequirementResolver {
    pub fn new() -> Self {
        Self
    }

    /// 解析周期内全部 (日期, 岗位) 的需求向量
    ///
    /// # 错误
    /// - 范围内某岗位在周期出现的日型没有任何需求行 -> Err(配置错误描述)
    pub fn resolve(
        &self,
        rule_set: &RuleSet,
        requirements: &[PositionRequirement],
        position_scope: &[String],
        dates: &[NaiveDate],
    ) -> Result<RequirementPlan, String> {
        let tables = dense_requirement_vectors(requirements);

        // 周期内实际出现的日型
        let day_types_in_period: HashSet<DayType> =
            dates.iter().map(|d| rule_set.day_type_of(*d)).collect();

        // 配置完整性: 每个范围内岗位 x 周期内日型 必须有需求表
        for position in position_scope {
            for day_type in &day_types_in_period {
                if !tables.contains_key(&(position.clone(), *day_type)) {
                    return Err(format!(
                        "规则集 {} 缺少岗位 {} 的 {} 需求表",
                        rule_set.rule_set_id, position, day_type
                    ));
                }
            }
        }

        let mut vectors = HashMap::new();
        let mut ordered_keys = Vec::new();

        let mut sorted_dates = dates.to_vec();
        sorted_dates.sort();
        let mut sorted_positions = position_scope.to_vec();
        sorted_positions.sort();

        for date in &sorted_dates {
            let day_type = rule_set.day_type_of(*date);
            for position in &sorted_positions {
                let vector = tables
                    .get(&(position.clone(), day_type))
                    .copied()
                    .unwrap_or([0u32; 24]);
                vectors.insert((*date, position.clone()), vector);
                ordered_keys.push((*date, position.clone()));
            }
        }

        let plan = RequirementPlan {
            vectors,
            ordered_keys,
        };

        debug!(
            dates = sorted_dates.len(),
            positions = sorted_positions.len(),
            total_required = plan.total_required(),
            "需求解析完成"
        );

        Ok(plan)
    }
}

impl Default for RequirementResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule_set(holidays: Vec<NaiveDate>) -> RuleSet {
        RuleSet {
            rule_set_id: "RS1".to_string(),
            rule_set_name: "默认".to_string(),
            consecutive_day_limit: None,
            rest_hours: None,
            holiday_dates: holidays,
            active: true,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    fn req(position: &str, day_type: DayType, hour: u8, count: u32) -> PositionRequirement {
        PositionRequirement {
            rule_set_id: "RS1".to_string(),
            position: position.to_string(),
            day_type,
            hour,
            required_count: count,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
    }

    #[test]
    fn test_resolve_dense_vector() {
        let resolver = RequirementResolver::new();
        // 2025-02-10 周一 / 2025-02-15 周六
        let dates = vec![d(10), d(15)];
        let requirements = vec![
            req("hall", DayType::Weekday, 12, 3),
            req("hall", DayType::Weekend, 12, 5),
        ];

        let plan = resolver
            .resolve(&rule_set(vec![]), &requirements, &["hall".to_string()], &dates)
            .unwrap();

        assert_eq!(plan.required(d(10), "hall", 12), 3);
        assert_eq!(plan.required(d(15), "hall", 12), 5);
        // 缺失小时行按 0
        assert_eq!(plan.required(d(10), "hall", 9), 0);
        assert_eq!(plan.total_required(), 8);
    }

    #[test]
    fn test_holiday_uses_weekend_table() {
        let resolver = RequirementResolver::new();
        // 2025-02-11 周二,列入节假日
        let dates = vec![d(11)];
        let requirements = vec![
            req("hall", DayType::Weekday, 12, 3),
            req("hall", DayType::Weekend, 12, 5),
        ];

        let plan = resolver
            .resolve(
                &rule_set(vec![d(11)]),
                &requirements,
                &["hall".to_string()],
                &dates,
            )
            .unwrap();
        assert_eq!(plan.required(d(11), "hall", 12), 5);
    }

    #[test]
    fn test_missing_table_is_configuration_error() {
        let resolver = RequirementResolver::new();
        // 周期含周末,但 kitchen 只有工作日表
        let dates = vec![d(10), d(15)];
        let requirements = vec![
            req("hall", DayType::Weekday, 12, 3),
            req("hall", DayType::Weekend, 12, 5),
            req("kitchen", DayType::Weekday, 12, 2),
        ];

        let result = resolver.resolve(
            &rule_set(vec![]),
            &requirements,
            &["hall".to_string(), "kitchen".to_string()],
            &dates,
        );
        let err = result.unwrap_err();
        assert!(err.contains("kitchen"), "err={}", err);
    }

    #[test]
    fn test_ordered_iteration_deterministic() {
        let resolver = RequirementResolver::new();
        let dates = vec![d(11), d(10)];
        let requirements = vec![
            req("hall", DayType::Weekday, 12, 1),
            req("bar", DayType::Weekday, 12, 1),
        ];

        let plan = resolver
            .resolve(
                &rule_set(vec![]),
                &requirements,
                &["hall".to_string(), "bar".to_string()],
                &dates,
            )
            .unwrap();

        let keys: Vec<(NaiveDate, String)> = plan
            .iter_ordered()
            .map(|(date, pos, _)| (*date, pos.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (d(10), "bar".to_string()),
                (d(10), "hall".to_string()),
                (d(11), "bar".to_string()),
                (d(11), "hall".to_string()),
            ]
        );
    }
}
