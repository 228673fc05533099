// ==========================================
// 餐饮门店排班系统 - 引擎层事件发布
// ==========================================
// 职责: 定义排班事件发布 trait,实现依赖倒置
// 说明: Engine 层定义 trait,外层(如通知/同步服务)实现适配器
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 排班事件类型
// ==========================================

/// 排班事件触发类型,用于通知下游系统
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEventType {
    /// 排班表生成完成
    ScheduleGenerated,
    /// 班次手工编辑
    AssignmentEdited,
    /// 排班表确认
    ScheduleConfirmed,
    /// 确认撤销
    ScheduleUnconfirmed,
    /// 排班表归档
    ScheduleArchived,
    /// 规则集变更
    RuleSetChanged,
    /// 意向/花名册导入
    SnapshotImported,
}

impl ScheduleEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            ScheduleEventType::ScheduleGenerated => "ScheduleGenerated",
            ScheduleEventType::AssignmentEdited => "AssignmentEdited",
            ScheduleEventType::ScheduleConfirmed => "ScheduleConfirmed",
            ScheduleEventType::ScheduleUnconfirmed => "ScheduleUnconfirmed",
            ScheduleEventType::ScheduleArchived => "ScheduleArchived",
            ScheduleEventType::RuleSetChanged => "RuleSetChanged",
            ScheduleEventType::SnapshotImported => "SnapshotImported",
        }
    }
}

/// 排班事件,包含排班表ID、触发类型和影响范围
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEvent {
    /// 排班表 ID
    pub schedule_id: String,
    /// 事件类型
    pub event_type: ScheduleEventType,
    /// 事件来源描述
    pub source: Option<String>,
    /// 受影响的岗位列表(None 表示全部)
    pub affected_positions: Option<Vec<String>>,
    /// 受影响的日期范围
    pub affected_date_range: Option<(NaiveDate, NaiveDate)>,
    /// 是否需要全量处理
    pub is_full_scope: bool,
}

impl ScheduleEvent {
    /// 创建全量事件
    pub fn full_scope(
        schedule_id: String,
        event_type: ScheduleEventType,
        source: Option<String>,
    ) -> Self {
        Self {
            schedule_id,
            event_type,
            source,
            affected_positions: None,
            affected_date_range: None,
            is_full_scope: true,
        }
    }

    /// 创建增量事件
    pub fn incremental(
        schedule_id: String,
        event_type: ScheduleEventType,
        source: Option<String>,
        positions: Option<Vec<String>>,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Self {
        Self {
            schedule_id,
            event_type,
            source,
            affected_positions: positions,
            affected_date_range: date_range,
            is_full_scope: false,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 排班事件发布者 Trait
///
/// Engine 层定义,外层实现,解除引擎对通知链路的直接依赖
pub trait ScheduleEventPublisher: Send + Sync {
    /// 发布排班事件
    ///
    /// # 返回
    /// - `Ok(task_id)`: 任务 ID(如果支持)或空字符串
    /// - `Err`: 发布失败
    fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者,用于不需要事件发布的场景(如单元测试)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ScheduleEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - schedule_id={}, event_type={}",
            event.schedule_id,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装,简化 Option<Arc<dyn ScheduleEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ScheduleEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn ScheduleEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例(不发布事件)
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件(如果有发布者)
    pub fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者,跳过事件 - schedule_id={}, event_type={}",
                    event.schedule_id,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
