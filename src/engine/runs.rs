// ==========================================
// 餐饮门店排班系统 - 生成运行登记 (Generation Run Registry)
// ==========================================
// 职责: 每张排班表同一时刻至多一个生成运行;后发运行顶替先发运行
// 红线: 顶替只发生在同一张表上;被顶替/被撤销的运行绝不落库
// 说明: 落库侧的最终防线是乐观锁(顶替方置 GENERATING 时 revision 已前移,
//       旧运行提交必然失败),登记表负责尽早让旧运行停下来
// ==========================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// ==========================================
// CancelToken - 协作式撤销令牌
// ==========================================
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ==========================================
// RunHandle - 单次运行句柄
// ==========================================
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub schedule_id: String,
    pub epoch: u64, // 同表内单调递增,用于识别是否被顶替
    pub token: CancelToken,
}

#[derive(Debug)]
struct RunSlot {
    epoch: u64,
    token: CancelToken,
}

// ==========================================
// GenerationRunRegistry - 运行登记表
// ==========================================
#[derive(Debug, Default)]
pub struct GenerationRunRegistry {
    runs: Mutex<HashMap<String, RunSlot>>,
}

impl GenerationRunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新运行;同表已有运行时旧运行被顶替(令牌置撤销,epoch 前移)
    pub fn begin(&self, schedule_id: &str) -> RunHandle {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let epoch = match runs.get(schedule_id) {
            Some(slot) => {
                slot.token.cancel();
                warn!(schedule_id = %schedule_id, old_epoch = slot.epoch, "已有生成运行被新运行顶替");
                slot.epoch + 1
            }
            None => 1,
        };
        let token = CancelToken::new();
        runs.insert(
            schedule_id.to_string(),
            RunSlot {
                epoch,
                token: token.clone(),
            },
        );
        info!(schedule_id = %schedule_id, epoch, "生成运行已登记");
        RunHandle {
            schedule_id: schedule_id.to_string(),
            epoch,
            token,
        }
    }

    /// 显式撤销当前运行;无运行时返回 false
    pub fn cancel(&self, schedule_id: &str) -> bool {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        match runs.get(schedule_id) {
            Some(slot) => {
                slot.token.cancel();
                info!(schedule_id = %schedule_id, epoch = slot.epoch, "生成运行已撤销");
                true
            }
            None => false,
        }
    }

    /// 句柄是否仍是该表的当前运行(未被顶替)
    pub fn is_current(&self, handle: &RunHandle) -> bool {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.get(&handle.schedule_id)
            .map(|slot| slot.epoch == handle.epoch)
            .unwrap_or(false)
    }

    /// 运行收尾: 只有当前运行可注销登记
    pub fn finish(&self, handle: &RunHandle) {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        if runs
            .get(&handle.schedule_id)
            .map(|slot| slot.epoch == handle.epoch)
            .unwrap_or(false)
        {
            runs.remove(&handle.schedule_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supersede_cancels_previous_run() {
        let registry = GenerationRunRegistry::new();
        let first = registry.begin("S1");
        assert!(!first.token.is_cancelled());
        assert!(registry.is_current(&first));

        let second = registry.begin("S1");
        assert!(first.token.is_cancelled(), "旧运行应被置撤销");
        assert!(!second.token.is_cancelled());
        assert!(!registry.is_current(&first));
        assert!(registry.is_current(&second));
        assert_eq!(second.epoch, first.epoch + 1);
    }

    #[test]
    fn test_supersede_scoped_to_one_schedule() {
        let registry = GenerationRunRegistry::new();
        let s1 = registry.begin("S1");
        let s2 = registry.begin("S2");

        registry.begin("S1");
        assert!(s1.token.is_cancelled());
        assert!(!s2.token.is_cancelled(), "顶替只作用于同一张表");
    }

    #[test]
    fn test_explicit_cancel() {
        let registry = GenerationRunRegistry::new();
        assert!(!registry.cancel("S1"), "无运行时撤销返回 false");

        let handle = registry.begin("S1");
        assert!(registry.cancel("S1"));
        assert!(handle.token.is_cancelled());
    }

    #[test]
    fn test_finish_only_removes_current() {
        let registry = GenerationRunRegistry::new();
        let old = registry.begin("S1");
        let new = registry.begin("S1");

        // 被顶替的旧运行收尾不能注销新运行
        registry.finish(&old);
        assert!(registry.is_current(&new));

        registry.finish(&new);
        assert!(!registry.is_current(&new));
    }
}
