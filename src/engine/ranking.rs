// ==========================================
// 餐饮门店排班系统 - 候选人分层排序 (Candidate Ranking)
// ==========================================
// 职责: 槽位填充时的候选人五层优先级与层内决胜
// 分层: OK命中窗 > OK未命中窗 > MAYBE命中窗 > MAYBE调整 > UNKNOWN
// 决胜: 当期已排工时少者优先,再按员工ID升序(保证生成确定性)
// ==========================================

use crate::domain::employee::AvailabilityEntry;
use crate::domain::types::AvailabilityStatus;
use std::cmp::Ordering;

// ==========================================
// CandidateTier - 候选层级
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CandidateTier {
    OkMatching = 0,    // OK 且小时落在期望窗内(无窗视同命中)
    OkNonMatching = 1, // OK 但小时越出期望窗
    MaybeMatching = 2, // MAYBE 且命中期望窗
    MaybeAdjusted = 3, // MAYBE 且越出期望窗
    Unknown = 4,       // 未提交,仅在允许兜底时参与
}

impl CandidateTier {
    pub fn label(&self) -> &'static str {
        match self {
            CandidateTier::OkMatching => "OK命中期望窗",
            CandidateTier::OkNonMatching => "OK越窗",
            CandidateTier::MaybeMatching => "MAYBE命中期望窗",
            CandidateTier::MaybeAdjusted => "MAYBE调整",
            CandidateTier::Unknown => "未提交兜底",
        }
    }
}

/// 按意向条目与目标小时判定候选层级
///
/// NG 不产生层级(调用方先行过滤);无期望窗视同命中
pub fn tier_of(entry: &AvailabilityEntry, hour: u8) -> Option<CandidateTier> {
    let matching = !entry.has_window() || entry.window_covers_hour(hour);
    match entry.status {
        AvailabilityStatus::Ng => None,
        AvailabilityStatus::Ok => Some(if matching {
            CandidateTier::OkMatching
        } else {
            CandidateTier::OkNonMatching
        }),
        AvailabilityStatus::Maybe => Some(if matching {
            CandidateTier::MaybeMatching
        } else {
            CandidateTier::MaybeAdjusted
        }),
        AvailabilityStatus::Unknown => Some(CandidateTier::Unknown),
    }
}

// ==========================================
// RankedCandidate - 参与排序的候选人
// ==========================================
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub employee_id: String,
    pub tier: CandidateTier,
    pub assigned_hours: f64, // 当期已排工时(决胜键)
}

impl RankedCandidate {
    /// 层级 -> 已排工时 -> 员工ID 的全序比较
    pub fn ordering(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| {
                self.assigned_hours
                    .partial_cmp(&other.assigned_hours)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| self.employee_id.cmp(&other.employee_id))
    }
}

/// 候选人原地排序(确定性: 键全序,sort_by 稳定)
pub fn rank_candidates(candidates: &mut [RankedCandidate]) {
    candidates.sort_by(|a, b| a.ordering(b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn entry(status: AvailabilityStatus, window: Option<(u32, u32)>) -> AvailabilityEntry {
        AvailabilityEntry {
            employee_id: "E001".to_string(),
            work_date: NaiveDate::from_ymd_opt(2025, 2, 5).unwrap(),
            status,
            preferred_start: window.map(|(s, _)| NaiveTime::from_hms_opt(s, 0, 0).unwrap()),
            preferred_end: window.map(|(_, e)| NaiveTime::from_hms_opt(e, 0, 0).unwrap()),
            note: None,
            submitted_at: Utc::now().naive_utc(),
        }
    }

    fn candidate(id: &str, tier: CandidateTier, hours: f64) -> RankedCandidate {
        RankedCandidate {
            employee_id: id.to_string(),
            tier,
            assigned_hours: hours,
        }
    }

    #[test]
    fn test_tier_of_status_and_window() {
        // OK 无窗 = 命中
        assert_eq!(
            tier_of(&entry(AvailabilityStatus::Ok, None), 12),
            Some(CandidateTier::OkMatching)
        );
        // OK 带窗,窗内/窗外
        assert_eq!(
            tier_of(&entry(AvailabilityStatus::Ok, Some((9, 17))), 12),
            Some(CandidateTier::OkMatching)
        );
        assert_eq!(
            tier_of(&entry(AvailabilityStatus::Ok, Some((9, 17))), 18),
            Some(CandidateTier::OkNonMatching)
        );
        // MAYBE
        assert_eq!(
            tier_of(&entry(AvailabilityStatus::Maybe, Some((9, 17))), 12),
            Some(CandidateTier::MaybeMatching)
        );
        assert_eq!(
            tier_of(&entry(AvailabilityStatus::Maybe, Some((9, 17))), 18),
            Some(CandidateTier::MaybeAdjusted)
        );
        // NG 不产生候选
        assert_eq!(tier_of(&entry(AvailabilityStatus::Ng, None), 12), None);
        // UNKNOWN
        assert_eq!(
            tier_of(&entry(AvailabilityStatus::Unknown, None), 12),
            Some(CandidateTier::Unknown)
        );
    }

    #[test]
    fn test_ranking_tier_then_hours_then_id() {
        let mut candidates = vec![
            candidate("E003", CandidateTier::Unknown, 0.0),
            candidate("E002", CandidateTier::OkMatching, 16.0),
            candidate("E001", CandidateTier::OkMatching, 8.0),
            candidate("E005", CandidateTier::MaybeMatching, 0.0),
            candidate("E004", CandidateTier::OkMatching, 8.0),
        ];
        rank_candidates(&mut candidates);

        let ids: Vec<&str> = candidates.iter().map(|c| c.employee_id.as_str()).collect();
        // 同层同工时按 ID 升序: E001 在 E004 前
        assert_eq!(ids, vec!["E001", "E004", "E002", "E005", "E003"]);
    }
}
