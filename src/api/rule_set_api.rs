// ==========================================
// 餐饮门店排班系统 - 规则集 API
// ==========================================
// 职责: 规则集维护、人数需求表整体替换、自定义规则增停
// 红线: 结构化规则入库前必须通过形状校验;自由文本不做机器判定
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::rule::{PositionRequirement, RuleBody, RuleSet, RuleSetDetail, SchedulingRule};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::rule_set_repo::RuleSetRepository;

// ==========================================
// RuleSetApi - 规则集 API
// ==========================================
pub struct RuleSetApi {
    rule_set_repo: Arc<RuleSetRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl RuleSetApi {
    pub fn new(
        rule_set_repo: Arc<RuleSetRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            rule_set_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 规则集
    // ==========================================

    /// 创建规则集
    pub fn create_rule_set(
        &self,
        rule_set_name: &str,
        consecutive_day_limit: Option<i32>,
        rest_hours: Option<f64>,
        holiday_dates: Vec<NaiveDate>,
        actor: &str,
    ) -> ApiResult<RuleSet> {
        validator::require_non_empty(rule_set_name, "规则集名称")?;
        validator::require_non_empty(actor, "操作人")?;
        Self::validate_overrides(consecutive_day_limit, rest_hours)?;

        let now = Utc::now().naive_utc();
        let rule_set = RuleSet {
            rule_set_id: uuid::Uuid::new_v4().to_string(),
            rule_set_name: rule_set_name.to_string(),
            consecutive_day_limit,
            rest_hours,
            holiday_dates,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.rule_set_repo.create(&rule_set)?;

        self.log_change(
            actor,
            format!("创建规则集: {} ({})", rule_set.rule_set_name, rule_set.rule_set_id),
        );
        info!(rule_set_id = %rule_set.rule_set_id, "规则集已创建");
        Ok(rule_set)
    }

    /// 更新规则集(名称/全局覆盖项/节假日/启用标志)
    pub fn update_rule_set(&self, rule_set: &RuleSet, actor: &str) -> ApiResult<()> {
        validator::require_non_empty(&rule_set.rule_set_name, "规则集名称")?;
        validator::require_non_empty(actor, "操作人")?;
        Self::validate_overrides(rule_set.consecutive_day_limit, rule_set.rest_hours)?;

        self.rule_set_repo.update(rule_set)?;
        self.log_change(actor, format!("更新规则集: {}", rule_set.rule_set_id));
        Ok(())
    }

    /// 查询规则集列表
    pub fn list_rule_sets(&self, only_active: bool) -> ApiResult<Vec<RuleSet>> {
        Ok(self.rule_set_repo.find_all(only_active)?)
    }

    /// 查询规则集详情(规则集 + 需求表 + 自定义规则)
    pub fn get_rule_set_detail(&self, rule_set_id: &str) -> ApiResult<RuleSetDetail> {
        self.rule_set_repo
            .find_detail(rule_set_id)?
            .ok_or_else(|| ApiError::NotFound(format!("RuleSet(id={})不存在", rule_set_id)))
    }

    // ==========================================
    // 人数需求表
    // ==========================================

    /// 整体替换人数需求表
    ///
    /// 按 (岗位, 日型, 小时) 全量提交;部分更新容易留下脏槽位
    pub fn replace_requirements(
        &self,
        rule_set_id: &str,
        requirements: Vec<PositionRequirement>,
        actor: &str,
    ) -> ApiResult<usize> {
        validator::require_non_empty(actor, "操作人")?;
        self.ensure_rule_set_exists(rule_set_id)?;

        for req in &requirements {
            validator::require_non_empty(&req.position, "需求表岗位")?;
            validator::validate_hour(req.hour, "需求表小时")?;
            if req.rule_set_id != rule_set_id {
                return Err(ApiError::InvalidInput(format!(
                    "需求行归属不一致: {} != {}",
                    req.rule_set_id, rule_set_id
                )));
            }
        }

        let written = self
            .rule_set_repo
            .replace_requirements(rule_set_id, &requirements)?;
        self.log_change(
            actor,
            format!("替换需求表: {} ({} 行)", rule_set_id, written),
        );
        Ok(written)
    }

    // ==========================================
    // 自定义规则
    // ==========================================

    /// 新增自定义规则
    pub fn add_rule(
        &self,
        rule_set_id: &str,
        body: RuleBody,
        mandatory: bool,
        actor: &str,
    ) -> ApiResult<String> {
        validator::require_non_empty(actor, "操作人")?;
        self.ensure_rule_set_exists(rule_set_id)?;
        Self::validate_rule_body(&body)?;

        let rule = SchedulingRule {
            rule_id: uuid::Uuid::new_v4().to_string(),
            rule_set_id: rule_set_id.to_string(),
            body,
            mandatory,
            active: true,
            created_at: Utc::now().naive_utc(),
        };
        let rule_id = self.rule_set_repo.insert_rule(&rule)?;

        self.log_change(
            actor,
            format!(
                "新增规则: {} ({}, mandatory={})",
                rule_id,
                rule.rule_type(),
                mandatory
            ),
        );
        Ok(rule_id)
    }

    /// 停用规则(软删除,保留审计痕迹)
    pub fn deactivate_rule(&self, rule_id: &str, actor: &str) -> ApiResult<()> {
        validator::require_non_empty(actor, "操作人")?;

        self.rule_set_repo.deactivate_rule(rule_id)?;
        self.log_change(actor, format!("停用规则: {}", rule_id));
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn ensure_rule_set_exists(&self, rule_set_id: &str) -> ApiResult<()> {
        self.rule_set_repo
            .find_by_id(rule_set_id)?
            .ok_or_else(|| ApiError::NotFound(format!("RuleSet(id={})不存在", rule_set_id)))?;
        Ok(())
    }

    fn validate_overrides(
        consecutive_day_limit: Option<i32>,
        rest_hours: Option<f64>,
    ) -> ApiResult<()> {
        if let Some(limit) = consecutive_day_limit {
            if limit < 1 {
                return Err(ApiError::InvalidInput(format!(
                    "连续工作天数上限必须 >= 1: {}",
                    limit
                )));
            }
        }
        if let Some(hours) = rest_hours {
            if hours <= 0.0 || hours >= 24.0 {
                return Err(ApiError::InvalidInput(format!(
                    "最小休息时长必须落在 (0, 24): {}",
                    hours
                )));
            }
        }
        Ok(())
    }

    fn validate_rule_body(body: &RuleBody) -> ApiResult<()> {
        match body {
            RuleBody::Pairing {
                employee_a,
                employee_b,
            } => {
                validator::require_non_empty(employee_a, "搭档员工A")?;
                validator::require_non_empty(employee_b, "搭档员工B")?;
                if employee_a == employee_b {
                    return Err(ApiError::InvalidInput(
                        "搭档规则的两名员工不能相同".to_string(),
                    ));
                }
            }
            RuleBody::Avoidance {
                employee_id,
                hour_from,
                hour_to,
                ..
            } => {
                validator::require_non_empty(employee_id, "回避员工")?;
                validator::validate_hour(*hour_from, "回避起始小时")?;
                if *hour_to > 24 || hour_from >= hour_to {
                    return Err(ApiError::InvalidInput(format!(
                        "回避小时区间非法: {}..{}",
                        hour_from, hour_to
                    )));
                }
            }
            RuleBody::ConsecutiveCap {
                employee_ids,
                max_days,
            } => {
                if *max_days < 1 {
                    return Err(ApiError::InvalidInput(format!(
                        "连续天数上限必须 >= 1: {}",
                        max_days
                    )));
                }
                for id in employee_ids {
                    validator::require_non_empty(id, "约束员工")?;
                }
            }
            RuleBody::FreeTextAdvisory { text } => {
                validator::require_non_empty(text, "自由文本提示")?;
            }
        }
        Ok(())
    }

    /// 审计写入失败不回滚已提交的业务写入
    fn log_change(&self, actor: &str, detail: String) {
        let log = ActionLog::new(
            uuid::Uuid::new_v4().to_string(),
            None,
            ActionType::RuleSetChange,
            actor.to_string(),
        )
        .with_detail(detail);
        if let Err(err) = self.action_log_repo.insert(&log) {
            tracing::warn!(action_type = %log.action_type, error = %err, "操作日志写入失败");
        }
    }
}
