// ==========================================
// 餐饮门店排班系统 - 排班配置读取 Trait
// ==========================================
// 职责: 定义排班引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

// ==========================================
// ConfidenceWeights - 置信度加权
// ==========================================
// 置信度 = coverage * 覆盖率 + soft * 软约束满足率 + balance * 工时均衡度
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub coverage: f64, // 覆盖率权重
    pub soft: f64,     // 软约束满足率权重
    pub balance: f64,  // 工时均衡度权重
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            coverage: 0.5,
            soft: 0.3,
            balance: 0.2,
        }
    }
}

// ==========================================
// SchedulingConfigReader Trait
// ==========================================
// 用途: 规则引擎与生成引擎所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait SchedulingConfigReader: Send + Sync {
    /// 获取班次间最小休息时长（小时）
    ///
    /// # 默认值
    /// - 11.0
    ///
    /// # 用途
    /// - 硬约束: 前一班结束到下一班开始的间隔不得小于该值
    async fn get_min_rest_hours(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取连续工作天数上限（系统默认,可被规则集覆盖）
    ///
    /// # 默认值
    /// - 6
    ///
    /// # 用途
    /// - 硬约束: 任意连续排班天数不得超过该值
    async fn get_max_consecutive_days(&self) -> Result<i32, Box<dyn Error>>;

    /// 是否允许在缺员槽位上使用未提交意向（UNKNOWN）的员工
    ///
    /// # 默认值
    /// - true
    ///
    /// # 用途
    /// - 生成引擎第五档候选的开关;关闭后缺口直接记为警告
    async fn get_allow_unknown_fill(&self) -> Result<bool, Box<dyn Error>>;

    /// 获取置信度加权
    ///
    /// # 默认值
    /// - coverage=0.5, soft=0.3, balance=0.2
    async fn get_confidence_weights(&self) -> Result<ConfidenceWeights, Box<dyn Error>>;

    /// 获取工时均衡容差（相对平均工时的偏差比例）
    ///
    /// # 默认值
    /// - 0.10（±10%）
    ///
    /// # 用途
    /// - 员工当期工时落在 [均值*(1-容差), 均值*(1+容差)] 内记为均衡
    async fn get_hour_balance_tolerance(&self) -> Result<f64, Box<dyn Error>>;
}
