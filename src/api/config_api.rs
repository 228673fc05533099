// ==========================================
// 餐饮门店排班系统 - 系统配置 API
// ==========================================
// 职责: config_kv 全局配置的读写与取值校验
// 红线: 未知键与非法取值一律拒绝,不静默落库
// ==========================================

use std::sync::Arc;

use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::config::scheduling_config::ConfidenceWeights;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::action_log_repo::ActionLogRepository;

// ==========================================
// ConfigApi - 系统配置 API
// ==========================================
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ConfigApi {
    pub fn new(
        config_manager: Arc<ConfigManager>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            config_manager,
            action_log_repo,
        }
    }

    /// 读取全局配置值(不存在返回 None,引擎侧有内置默认)
    pub fn get_value(&self, key: &str) -> ApiResult<Option<String>> {
        self.config_manager
            .get_global_config_value(key)
            .map_err(|e| ApiError::InternalError(e.to_string()))
    }

    /// 写入全局配置值
    ///
    /// 键必须是已知配置键,值必须通过该键的取值校验
    pub fn set_value(&self, key: &str, value: &str, actor: &str) -> ApiResult<()> {
        validator::require_non_empty(actor, "操作人")?;
        Self::validate_entry(key, value)?;

        self.config_manager
            .set_global_config_value(key, value)
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let log = ActionLog::new(
            uuid::Uuid::new_v4().to_string(),
            None,
            ActionType::ConfigUpdate,
            actor.to_string(),
        )
        .with_payload(&serde_json::json!({ "key": key, "value": value }));
        if let Err(err) = self.action_log_repo.insert(&log) {
            tracing::warn!(key = %key, error = %err, "操作日志写入失败");
        }

        info!(key = %key, "全局配置已更新");
        Ok(())
    }

    /// 按键校验取值
    fn validate_entry(key: &str, value: &str) -> ApiResult<()> {
        match key {
            config_keys::MIN_REST_HOURS => {
                let hours: f64 = value
                    .parse()
                    .map_err(|_| ApiError::InvalidInput(format!("{} 不是数值: {}", key, value)))?;
                if hours <= 0.0 || hours >= 24.0 {
                    return Err(ApiError::InvalidInput(format!(
                        "{} 必须落在 (0, 24): {}",
                        key, value
                    )));
                }
            }
            config_keys::MAX_CONSECUTIVE_DAYS => {
                let days: i32 = value
                    .parse()
                    .map_err(|_| ApiError::InvalidInput(format!("{} 不是整数: {}", key, value)))?;
                if days < 1 {
                    return Err(ApiError::InvalidInput(format!(
                        "{} 必须 >= 1: {}",
                        key, value
                    )));
                }
            }
            config_keys::ALLOW_UNKNOWN_FILL => {
                if !matches!(value.to_lowercase().as_str(), "true" | "false" | "0" | "1") {
                    return Err(ApiError::InvalidInput(format!(
                        "{} 必须是布尔值: {}",
                        key, value
                    )));
                }
            }
            config_keys::CONFIDENCE_WEIGHTS => {
                let weights: ConfidenceWeights = serde_json::from_str(value).map_err(|_| {
                    ApiError::InvalidInput(format!("{} 不是合法 JSON 权重: {}", key, value))
                })?;
                if weights.coverage < 0.0 || weights.soft < 0.0 || weights.balance < 0.0 {
                    return Err(ApiError::InvalidInput(format!(
                        "{} 权重不能为负: {}",
                        key, value
                    )));
                }
                if weights.coverage + weights.soft + weights.balance <= 0.0 {
                    return Err(ApiError::InvalidInput(format!(
                        "{} 权重之和必须为正: {}",
                        key, value
                    )));
                }
            }
            config_keys::HOUR_BALANCE_TOLERANCE => {
                let tolerance: f64 = value
                    .parse()
                    .map_err(|_| ApiError::InvalidInput(format!("{} 不是数值: {}", key, value)))?;
                if !(0.0..=1.0).contains(&tolerance) {
                    return Err(ApiError::InvalidInput(format!(
                        "{} 必须落在 [0, 1]: {}",
                        key, value
                    )));
                }
            }
            _ => {
                return Err(ApiError::InvalidInput(format!("未知配置键: {}", key)));
            }
        }
        Ok(())
    }
}
