// ==========================================
// 餐饮门店排班系统 - 领域类型定义
// ==========================================
// 红线: 状态机是枚举制,不允许用字符串漂移
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 出勤意向状态 (Availability Status)
// ==========================================
// 红线: UNKNOWN 是独立第三态,不等同于 OK 也不等同于 NG
// UNKNOWN 仅由未提交推导得出,不允许落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Ok,      // 可出勤
    Maybe,   // 待协调(可出勤但有保留)
    Ng,      // 不可出勤
    Unknown, // 未提交(推导态)
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityStatus::Ok => write!(f, "OK"),
            AvailabilityStatus::Maybe => write!(f, "MAYBE"),
            AvailabilityStatus::Ng => write!(f, "NG"),
            AvailabilityStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl AvailabilityStatus {
    /// 从字符串解析状态
    ///
    /// 解析失败按 NG 处理（保守口径：宁可不排班，不可误排班）
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "OK" => AvailabilityStatus::Ok,
            "MAYBE" => AvailabilityStatus::Maybe,
            "NG" => AvailabilityStatus::Ng,
            "UNKNOWN" => AvailabilityStatus::Unknown,
            _ => AvailabilityStatus::Ng,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Ok => "OK",
            AvailabilityStatus::Maybe => "MAYBE",
            AvailabilityStatus::Ng => "NG",
            AvailabilityStatus::Unknown => "UNKNOWN",
        }
    }

    /// 是否可作为排班候选（NG 之外都可进入候选池）
    pub fn is_assignable(&self) -> bool {
        !matches!(self, AvailabilityStatus::Ng)
    }
}

// ==========================================
// 日型 (Day Type)
// ==========================================
// 用于选择人数需求表: 工作日 / 周末
// 节假日覆盖配置在规则集上,由需求解析器处理,不在此处计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayType {
    Weekday, // 工作日
    Weekend, // 周末
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayType::Weekday => write!(f, "WEEKDAY"),
            DayType::Weekend => write!(f, "WEEKEND"),
        }
    }
}

impl DayType {
    /// 按日历星期分类（周六/周日为周末）
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }

    /// 从字符串解析日型
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "WEEKEND" => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DayType::Weekday => "WEEKDAY",
            DayType::Weekend => "WEEKEND",
        }
    }
}

// ==========================================
// 排班表状态 (Schedule Status)
// ==========================================
// 状态机: DRAFT -> GENERATING -> GENERATED -> ADJUSTING -> CONFIRMED
//         CONFIRMED --撤销确认--> ADJUSTING
//         任意非归档状态 --显式归档--> ARCHIVED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Draft,      // 草稿(已选规则集与岗位范围,无班次)
    Generating, // 生成中(单次长任务,可撤销/可被顶替)
    Generated,  // 已生成(未手工调整)
    Adjusting,  // 调整中(至少一次手工编辑)
    Confirmed,  // 已确认(禁止编辑)
    Archived,   // 已归档(终态,仅显式归档可达)
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ScheduleStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GENERATING" => ScheduleStatus::Generating,
            "GENERATED" => ScheduleStatus::Generated,
            "ADJUSTING" => ScheduleStatus::Adjusting,
            "CONFIRMED" => ScheduleStatus::Confirmed,
            "ARCHIVED" => ScheduleStatus::Archived,
            _ => ScheduleStatus::Draft, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Draft => "DRAFT",
            ScheduleStatus::Generating => "GENERATING",
            ScheduleStatus::Generated => "GENERATED",
            ScheduleStatus::Adjusting => "ADJUSTING",
            ScheduleStatus::Confirmed => "CONFIRMED",
            ScheduleStatus::Archived => "ARCHIVED",
        }
    }

    /// 是否允许单条编辑（4.5 编辑服务入口条件）
    pub fn is_editable(&self) -> bool {
        matches!(self, ScheduleStatus::Generated | ScheduleStatus::Adjusting)
    }

    /// 是否允许发起生成
    pub fn can_generate(&self) -> bool {
        matches!(
            self,
            ScheduleStatus::Draft | ScheduleStatus::Generated | ScheduleStatus::Adjusting
        )
    }

    /// 是否允许确认
    pub fn can_confirm(&self) -> bool {
        matches!(self, ScheduleStatus::Generated | ScheduleStatus::Adjusting)
    }
}

// ==========================================
// 班次来源 (Assignment Source)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentSource {
    Generated, // 引擎生成
    Manual,    // 人工编辑
}

impl fmt::Display for AssignmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl AssignmentSource {
    /// 从字符串解析班次来源
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MANUAL" => AssignmentSource::Manual,
            _ => AssignmentSource::Generated,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssignmentSource::Generated => "GENERATED",
            AssignmentSource::Manual => "MANUAL",
        }
    }
}

// ==========================================
// 覆盖等级 (Coverage Level)
// ==========================================
// 每个 (日期, 岗位, 小时) 槽位的实配/应配对比结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageLevel {
    Met,          // 满足
    Understaffed, // 缺员
    Overstaffed,  // 超员
}

impl fmt::Display for CoverageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageLevel::Met => write!(f, "MET"),
            CoverageLevel::Understaffed => write!(f, "UNDERSTAFFED"),
            CoverageLevel::Overstaffed => write!(f, "OVERSTAFFED"),
        }
    }
}

impl CoverageLevel {
    /// 由覆盖差值分类（diff = 实配 - 应配）
    pub fn from_diff(diff: i32) -> Self {
        match diff {
            0 => CoverageLevel::Met,
            d if d < 0 => CoverageLevel::Understaffed,
            _ => CoverageLevel::Overstaffed,
        }
    }
}

// ==========================================
// 约束违规严重度 (Violation Severity)
// ==========================================
// 红线: 硬约束违规绝不降级为警告;人手不足的缺口永远是警告,不是硬失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationSeverity {
    Soft, // 软约束(应避免,不阻断)
    Hard, // 硬约束(必须阻断)
}

impl fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationSeverity::Soft => write!(f, "SOFT"),
            ViolationSeverity::Hard => write!(f, "HARD"),
        }
    }
}

// ==========================================
// 自定义规则类型 (Rule Type)
// ==========================================
// 结构化规则可机器判定;自由文本仅作人工提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    Pairing,          // 搭档规则(两人需同班)
    Avoidance,        // 回避规则(某人回避某时段)
    ConsecutiveCap,   // 连续工作天数上限(可指定员工)
    FreeTextAdvisory, // 自由文本提示(不机器判定)
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RuleType {
    /// 从字符串解析规则类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PAIRING" => Some(RuleType::Pairing),
            "AVOIDANCE" => Some(RuleType::Avoidance),
            "CONSECUTIVE_CAP" => Some(RuleType::ConsecutiveCap),
            "FREE_TEXT_ADVISORY" => Some(RuleType::FreeTextAdvisory),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RuleType::Pairing => "PAIRING",
            RuleType::Avoidance => "AVOIDANCE",
            RuleType::ConsecutiveCap => "CONSECUTIVE_CAP",
            RuleType::FreeTextAdvisory => "FREE_TEXT_ADVISORY",
        }
    }
}

// ==========================================
// 时间约定 (Time Convention)
// ==========================================
// 班次与期望时间窗均不跨日;end == 00:00 按当日 24:00(收尾)处理
// 小时槽 h 覆盖区间 [h:00, h+1:00),整点粒度判定

/// 起始时间 -> 当日分钟数
pub fn start_minutes(t: chrono::NaiveTime) -> u32 {
    use chrono::Timelike;
    t.hour() * 60 + t.minute()
}

/// 结束时间 -> 当日分钟数（00:00 视为 1440,即 24:00）
pub fn end_minutes(t: chrono::NaiveTime) -> u32 {
    use chrono::Timelike;
    if t.hour() == 0 && t.minute() == 0 && t.second() == 0 {
        24 * 60
    } else {
        t.hour() * 60 + t.minute()
    }
}

/// 判定时间段 [start, end) 是否完整覆盖小时槽 h
///
/// 按整槽口径:需求人数要求整个小时在岗,半截班次不计入该槽覆盖
pub fn span_covers_hour(start: chrono::NaiveTime, end: chrono::NaiveTime, hour: u8) -> bool {
    let h = u32::from(hour);
    start_minutes(start) <= h * 60 && (h + 1) * 60 <= end_minutes(end)
}
