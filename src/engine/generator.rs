// ==========================================
// 餐饮门店排班系统 - 排班生成引擎 (Schedule Generator)
// ==========================================
// 职责: 归一化 -> 需求解析 -> 贪心填充 -> 覆盖/软约束评估 -> 置信度
// 红线: 输出中不允许任何硬约束违规;缺口只产生警告
// 红线: 被撤销/被顶替的运行不产出结果(落库由 API 层乐观锁兜底)
// ==========================================

use crate::config::scheduling_config::SchedulingConfigReader;
use crate::domain::coverage::CoverageReport;
use crate::domain::employee::{AvailabilityEntry, Employee};
use crate::domain::rule::RuleSetDetail;
use crate::domain::schedule::{Schedule, ShiftAssignment};
use crate::engine::availability::AvailabilityStore;
use crate::engine::coverage::CoverageBuilder;
use crate::engine::requirement::RequirementResolver;
use crate::engine::rules::RuleEngine;
use crate::engine::runs::CancelToken;
use crate::engine::slot_filler::{FillContext, SlotFiller};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// GenerationError - 生成失败分类
// ==========================================
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("输入校验失败: {0}")]
    Validation(String),

    #[error("规则集配置错误: {0}")]
    Configuration(String),

    #[error("完全无法生成排班(所有应配槽位实配为 0)")]
    Infeasible { coverage: CoverageReport },

    #[error("生成运行已撤销")]
    Cancelled,

    #[error("生成运行已被更新的运行顶替")]
    Superseded,

    #[error("生成内部错误: {0}")]
    Internal(String),
}

// ==========================================
// GenerationOutcome - 生成结果
// ==========================================
#[derive(Debug)]
pub struct GenerationOutcome {
    pub assignments: Vec<ShiftAssignment>,
    pub coverage: CoverageReport,
    pub warnings: Vec<String>,    // 缺口 + 修复动作
    pub suggestions: Vec<String>, // 软约束改进建议 + 自由文本提示
    pub confidence: f64,          // 0..=1
}

// ==========================================
// ScheduleGenerator - 生成引擎
// ==========================================
pub struct ScheduleGenerator<C: SchedulingConfigReader> {
    config: Arc<C>,
}

impl<C: SchedulingConfigReader> ScheduleGenerator<C> {
    pub fn new(config: Arc<C>) -> Self {
        Self { config }
    }

    /// 单次生成运行
    ///
    /// # 参数
    /// - schedule: 排班表(周期/岗位范围/规则集已选定)
    /// - employees: 花名册快照
    /// - entries: 落库的意向条目(周期外的由归一化忽略)
    /// - rule_set_detail: 规则集 + 需求表 + 自定义规则
    /// - token: 协作式撤销令牌,各阶段之间检查
    pub async fn generate(
        &self,
        schedule: &Schedule,
        employees: &[Employee],
        entries: &[AvailabilityEntry],
        rule_set_detail: &RuleSetDetail,
        token: &CancelToken,
        now: NaiveDateTime,
    ) -> Result<GenerationOutcome, GenerationError> {
        info!(
            schedule_id = %schedule.schedule_id,
            period_start = %schedule.period_start,
            period_end = %schedule.period_end,
            positions = schedule.position_scope.len(),
            "开始生成排班"
        );
        ensure_active(token)?;

        // 步骤1: 出勤意向归一化
        let matrix = AvailabilityStore::new()
            .normalize(
                employees,
                entries,
                schedule.period_start,
                schedule.period_end,
                now,
            )
            .map_err(GenerationError::Validation)?;
        debug!(entries = matrix.len(), "步骤1: 意向矩阵就绪");

        // 步骤2: 硬约束参数解析(规则集覆盖优先于系统默认)
        let rest_hours = match rule_set_detail.rule_set.rest_hours {
            Some(v) => v,
            None => self
                .config
                .get_min_rest_hours()
                .await
                .map_err(|e| GenerationError::Internal(e.to_string()))?,
        };
        let max_consecutive = match rule_set_detail.rule_set.consecutive_day_limit {
            Some(v) => v.max(1) as u32,
            None => self
                .config
                .get_max_consecutive_days()
                .await
                .map_err(|e| GenerationError::Internal(e.to_string()))?
                .max(1) as u32,
        };
        let allow_unknown_fill = self
            .config
            .get_allow_unknown_fill()
            .await
            .map_err(|e| GenerationError::Internal(e.to_string()))?;
        let rule_engine = RuleEngine::new(
            rest_hours,
            max_consecutive,
            rule_set_detail.rules.clone(),
        );
        debug!(
            rest_hours,
            max_consecutive, allow_unknown_fill, "步骤2: 硬约束参数就绪"
        );

        // 步骤3: 需求解析
        let dates = schedule.period_dates();
        let plan = RequirementResolver::new()
            .resolve(
                &rule_set_detail.rule_set,
                &rule_set_detail.requirements,
                &schedule.position_scope,
                &dates,
            )
            .map_err(GenerationError::Configuration)?;
        debug!(total_required = plan.total_required(), "步骤3: 需求计划就绪");
        ensure_active(token)?;

        // 步骤4: 贪心填充 + 修复
        let fill = SlotFiller::fill(
            &FillContext {
                schedule_id: &schedule.schedule_id,
                employees,
                matrix: &matrix,
                plan: &plan,
                rule_engine: &rule_engine,
                allow_unknown_fill,
            },
            now,
        );
        debug!(
            assignments = fill.assignments.len(),
            warnings = fill.warnings.len(),
            "步骤4: 槽位填充完成"
        );
        ensure_active(token)?;

        // 步骤5: 覆盖报告;完全无覆盖按不可行中止
        let coverage = CoverageBuilder::build(&schedule.schedule_id, &fill.assignments, &plan, now);
        if coverage.nothing_covered() {
            return Err(GenerationError::Infeasible { coverage });
        }

        // 步骤6: 软约束评估 + 置信度
        let soft = rule_engine.evaluate_soft(&matrix, &fill.assignments);
        let confidence = self
            .compute_confidence(&coverage, soft.satisfaction_ratio(), &fill.assignments)
            .await?;

        let mut warnings = fill.warnings;
        for slot in coverage.understaffed_slots() {
            let label = format!("{} 缺 {} 人", slot.slot_label(), -slot.diff);
            if !warnings.contains(&label) {
                warnings.push(label);
            }
        }

        info!(
            schedule_id = %schedule.schedule_id,
            assignments = fill.assignments.len(),
            coverage_ratio = coverage.coverage_ratio(),
            confidence,
            "排班生成完成"
        );

        Ok(GenerationOutcome {
            assignments: fill.assignments,
            coverage,
            warnings,
            suggestions: soft.suggestions,
            confidence,
        })
    }

    /// 置信度 = w1*覆盖率 + w2*软约束满足率 + w3*工时均衡度
    async fn compute_confidence(
        &self,
        coverage: &CoverageReport,
        soft_ratio: f64,
        assignments: &[ShiftAssignment],
    ) -> Result<f64, GenerationError> {
        let weights = self
            .config
            .get_confidence_weights()
            .await
            .map_err(|e| GenerationError::Internal(e.to_string()))?;
        let tolerance = self
            .config
            .get_hour_balance_tolerance()
            .await
            .map_err(|e| GenerationError::Internal(e.to_string()))?;

        let balance = hour_balance_ratio(assignments, tolerance);
        let score = weights.coverage * coverage.coverage_ratio()
            + weights.soft * soft_ratio
            + weights.balance * balance;
        Ok(score.clamp(0.0, 1.0))
    }
}

/// 撤销检查,各阶段之间调用
fn ensure_active(token: &CancelToken) -> Result<(), GenerationError> {
    if token.is_cancelled() {
        return Err(GenerationError::Cancelled);
    }
    Ok(())
}

/// 工时均衡度: 已排员工中工时落在 均值*(1±tolerance) 区间的占比
///
/// 员工数 <= 1 时记 1.0
fn hour_balance_ratio(assignments: &[ShiftAssignment], tolerance: f64) -> f64 {
    use std::collections::HashMap;
    let mut hours: HashMap<&str, f64> = HashMap::new();
    for a in assignments {
        *hours.entry(a.employee_id.as_str()).or_insert(0.0) += a.duration_hours();
    }
    if hours.len() <= 1 {
        return 1.0;
    }
    let mean = hours.values().sum::<f64>() / hours.len() as f64;
    if mean <= f64::EPSILON {
        return 1.0;
    }
    let lo = mean * (1.0 - tolerance);
    let hi = mean * (1.0 + tolerance);
    let within = hours.values().filter(|h| lo <= **h && **h <= hi).count();
    within as f64 / hours.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::scheduling_config::ConfidenceWeights;
    use crate::domain::rule::{PositionRequirement, RuleSet};
    use crate::domain::types::{AvailabilityStatus, DayType, ScheduleStatus};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::error::Error;

    struct FixedConfig {
        allow_unknown_fill: bool,
    }

    #[async_trait]
    impl SchedulingConfigReader for FixedConfig {
        async fn get_min_rest_hours(&self) -> Result<f64, Box<dyn Error>> {
            Ok(11.0)
        }
        async fn get_max_consecutive_days(&self) -> Result<i32, Box<dyn Error>> {
            Ok(6)
        }
        async fn get_allow_unknown_fill(&self) -> Result<bool, Box<dyn Error>> {
            Ok(self.allow_unknown_fill)
        }
        async fn get_confidence_weights(&self) -> Result<ConfidenceWeights, Box<dyn Error>> {
            Ok(ConfidenceWeights::default())
        }
        async fn get_hour_balance_tolerance(&self) -> Result<f64, Box<dyn Error>> {
            Ok(0.10)
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
    }

    fn schedule(start: u32, end: u32) -> Schedule {
        let now = Utc::now().naive_utc();
        Schedule {
            schedule_id: "S1".to_string(),
            period_start: d(start),
            period_end: d(end),
            position_scope: vec!["hall".to_string()],
            rule_set_id: "RS1".to_string(),
            status: ScheduleStatus::Generating,
            revision: 1,
            confidence: None,
            warnings: vec![],
            suggestions: vec![],
            confirm_comment: None,
            confirmed_by: None,
            confirmed_at: None,
            created_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn employee(id: &str) -> Employee {
        let now = Utc::now().naive_utc();
        Employee {
            employee_id: id.to_string(),
            display_name: id.to_string(),
            eligible_positions: vec!["hall".to_string()],
            monthly_hour_cap: 160.0,
            max_off_requests: 4,
            active: true,
            hire_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            contract_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn entry(id: &str, day: u32, status: AvailabilityStatus) -> AvailabilityEntry {
        AvailabilityEntry {
            employee_id: id.to_string(),
            work_date: d(day),
            status,
            preferred_start: None,
            preferred_end: None,
            note: None,
            submitted_at: Utc::now().naive_utc(),
        }
    }

    fn detail(hours: &[(u8, u32)]) -> RuleSetDetail {
        let now = Utc::now().naive_utc();
        let mut requirements = Vec::new();
        for day_type in [DayType::Weekday, DayType::Weekend] {
            for (hour, count) in hours {
                requirements.push(PositionRequirement {
                    rule_set_id: "RS1".to_string(),
                    position: "hall".to_string(),
                    day_type,
                    hour: *hour,
                    required_count: *count,
                });
            }
        }
        RuleSetDetail {
            rule_set: RuleSet {
                rule_set_id: "RS1".to_string(),
                rule_set_name: "默认".to_string(),
                consecutive_day_limit: None,
                rest_hours: None,
                holiday_dates: vec![],
                active: true,
                created_at: now,
                updated_at: now,
            },
            requirements,
            rules: vec![],
        }
    }

    fn generator(allow_unknown_fill: bool) -> ScheduleGenerator<FixedConfig> {
        ScheduleGenerator::new(Arc::new(FixedConfig { allow_unknown_fill }))
    }

    fn fresh_token() -> CancelToken {
        crate::engine::runs::GenerationRunRegistry::new()
            .begin("S1")
            .token
    }

    #[tokio::test]
    async fn test_generate_happy_path() {
        let outcome = generator(true)
            .generate(
                &schedule(10, 11),
                &[employee("E001"), employee("E002")],
                &[
                    entry("E001", 10, AvailabilityStatus::Ok),
                    entry("E001", 11, AvailabilityStatus::Ok),
                    entry("E002", 10, AvailabilityStatus::Ok),
                    entry("E002", 11, AvailabilityStatus::Ok),
                ],
                &detail(&[(9, 1), (10, 1), (11, 1)]),
                &fresh_token(),
                Utc::now().naive_utc(),
            )
            .await
            .unwrap();

        assert!(!outcome.assignments.is_empty());
        assert!(outcome.warnings.is_empty(), "warnings={:?}", outcome.warnings);
        assert!((outcome.coverage.coverage_ratio() - 1.0).abs() < f64::EPSILON);
        assert!(outcome.confidence > 0.9, "confidence={}", outcome.confidence);
    }

    #[tokio::test]
    async fn test_generate_deterministic() {
        let employees = [employee("E001"), employee("E002"), employee("E003")];
        let entries = vec![
            entry("E001", 10, AvailabilityStatus::Ok),
            entry("E002", 10, AvailabilityStatus::Maybe),
        ];
        let detail = detail(&[(9, 2), (10, 2)]);
        let now = Utc::now().naive_utc();

        let first = generator(true)
            .generate(&schedule(10, 10), &employees, &entries, &detail, &fresh_token(), now)
            .await
            .unwrap();
        let second = generator(true)
            .generate(&schedule(10, 10), &employees, &entries, &detail, &fresh_token(), now)
            .await
            .unwrap();

        let key = |a: &ShiftAssignment| {
            (
                a.employee_id.clone(),
                a.work_date,
                a.position.clone(),
                a.start_time,
                a.end_time,
            )
        };
        assert_eq!(
            first.assignments.iter().map(key).collect::<Vec<_>>(),
            second.assignments.iter().map(key).collect::<Vec<_>>(),
            "同输入必须产出同结果"
        );
    }

    #[tokio::test]
    async fn test_generate_infeasible_when_everyone_ng() {
        let err = generator(false)
            .generate(
                &schedule(10, 10),
                &[employee("E001")],
                &[entry("E001", 10, AvailabilityStatus::Ng)],
                &detail(&[(9, 1), (10, 1)]),
                &fresh_token(),
                Utc::now().naive_utc(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Infeasible { .. }));
    }

    #[tokio::test]
    async fn test_generate_cancelled_before_start() {
        let token = fresh_token();
        token.cancel();
        let err = generator(true)
            .generate(
                &schedule(10, 10),
                &[employee("E001")],
                &[],
                &detail(&[(9, 1)]),
                &token,
                Utc::now().naive_utc(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
    }

    #[tokio::test]
    async fn test_rule_set_overrides_rest_hours() {
        // 周五(工作日)晚班 14..22 + 周六(周末)早 7 点:
        // 默认 11h 休息下周六早班不成立;规则集放宽到 8h 后(实际 9h 休息)成立
        let mut rsd = detail(&[]);
        for hour in 14..22u8 {
            rsd.requirements.push(PositionRequirement {
                rule_set_id: "RS1".to_string(),
                position: "hall".to_string(),
                day_type: DayType::Weekday,
                hour,
                required_count: 1,
            });
        }
        rsd.requirements.push(PositionRequirement {
            rule_set_id: "RS1".to_string(),
            position: "hall".to_string(),
            day_type: DayType::Weekend,
            hour: 7,
            required_count: 1,
        });

        let employees = [employee("E001")];
        let entries = vec![
            entry("E001", 14, AvailabilityStatus::Ok),
            entry("E001", 15, AvailabilityStatus::Ok),
        ];

        let strict = generator(true)
            .generate(
                &schedule(14, 15),
                &employees,
                &entries,
                &rsd,
                &fresh_token(),
                Utc::now().naive_utc(),
            )
            .await
            .unwrap();
        assert_eq!(strict.assignments.len(), 1, "默认 11h 休息下早班缺口");
        assert!(!strict.warnings.is_empty());

        rsd.rule_set.rest_hours = Some(8.0);
        let relaxed = generator(true)
            .generate(
                &schedule(14, 15),
                &employees,
                &entries,
                &rsd,
                &fresh_token(),
                Utc::now().naive_utc(),
            )
            .await
            .unwrap();
        assert_eq!(relaxed.assignments.len(), 2, "放宽后两班都成立");
    }

    #[test]
    fn test_hour_balance_ratio() {
        let now = Utc::now().naive_utc();
        let mk = |id: &str, start: u32, end: u32| ShiftAssignment {
            schedule_id: "S1".to_string(),
            employee_id: id.to_string(),
            work_date: d(10),
            position: "hall".to_string(),
            start_time: chrono::NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: chrono::NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            source: crate::domain::types::AssignmentSource::Generated,
            created_at: now,
            updated_at: now,
        };

        // 8h 与 8h: 全部在均值 ±10% 内
        assert!((hour_balance_ratio(&[mk("E001", 9, 17), mk("E002", 9, 17)], 0.10) - 1.0).abs() < 1e-9);
        // 2h 与 8h: 两者都落在均值 5h 的 ±10% 外
        assert!(hour_balance_ratio(&[mk("E001", 9, 11), mk("E002", 9, 17)], 0.10) < 1e-9);
        // 单人恒为 1.0
        assert!((hour_balance_ratio(&[mk("E001", 9, 11)], 0.10) - 1.0).abs() < 1e-9);
    }
}
