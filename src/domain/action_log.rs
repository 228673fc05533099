// ==========================================
// 餐饮门店排班系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写操作必须落审计日志;日志写入失败只告警,不阻断业务
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 对齐: action_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志ID (UUID)
    pub schedule_id: Option<String>,     // 关联排班表 (导入/配置类操作可为空)
    pub action_type: String,             // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,        // 操作时间戳
    pub actor: String,                   // 操作人
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    ScheduleCreate,     // 创建排班表
    Generate,           // 排班生成
    GenerateCancel,     // 生成撤销/被顶替
    AssignmentEdit,     // 单条班次编辑
    Confirm,            // 确认排班表
    Unconfirm,          // 撤销确认
    Archive,            // 归档
    RosterImport,       // 导入员工花名册
    AvailabilityImport, // 导入出勤意向
    RuleSetChange,      // 规则集变更
    ConfigUpdate,       // 系统配置更新
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ScheduleCreate => "ScheduleCreate",
            ActionType::Generate => "Generate",
            ActionType::GenerateCancel => "GenerateCancel",
            ActionType::AssignmentEdit => "AssignmentEdit",
            ActionType::Confirm => "Confirm",
            ActionType::Unconfirm => "Unconfirm",
            ActionType::Archive => "Archive",
            ActionType::RosterImport => "RosterImport",
            ActionType::AvailabilityImport => "AvailabilityImport",
            ActionType::RuleSetChange => "RuleSetChange",
            ActionType::ConfigUpdate => "ConfigUpdate",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ScheduleCreate" => Some(ActionType::ScheduleCreate),
            "Generate" => Some(ActionType::Generate),
            "GenerateCancel" => Some(ActionType::GenerateCancel),
            "AssignmentEdit" => Some(ActionType::AssignmentEdit),
            "Confirm" => Some(ActionType::Confirm),
            "Unconfirm" => Some(ActionType::Unconfirm),
            "Archive" => Some(ActionType::Archive),
            "RosterImport" => Some(ActionType::RosterImport),
            "AvailabilityImport" => Some(ActionType::AvailabilityImport),
            "RuleSetChange" => Some(ActionType::RuleSetChange),
            "ConfigUpdate" => Some(ActionType::ConfigUpdate),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `action_id`: 日志ID (通常使用UUID)
    /// - `schedule_id`: 关联排班表ID (可选)
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人
    pub fn new(
        action_id: String,
        schedule_id: Option<String>,
        action_type: ActionType,
        actor: String,
    ) -> Self {
        Self {
            action_id,
            schedule_id,
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor,
            payload_json: None,
            detail: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 设置详细描述
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}
