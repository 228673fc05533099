// ==========================================
// 餐饮门店排班系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::scheduling_config::{ConfidenceWeights, SchedulingConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }
}

// ==========================================
// SchedulingConfigReader Trait 实现
// ==========================================
#[async_trait]
impl SchedulingConfigReader for ConfigManager {
    async fn get_min_rest_hours(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::MIN_REST_HOURS, "11")?;
        Ok(value.parse::<f64>().unwrap_or(11.0))
    }

    async fn get_max_consecutive_days(&self) -> Result<i32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::MAX_CONSECUTIVE_DAYS, "6")?;
        Ok(value.parse::<i32>().unwrap_or(6))
    }

    async fn get_allow_unknown_fill(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ALLOW_UNKNOWN_FILL, "true")?;
        match value.to_lowercase().as_str() {
            "false" | "0" | "off" => Ok(false),
            _ => Ok(true),
        }
    }

    async fn get_confidence_weights(&self) -> Result<ConfidenceWeights, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::CONFIDENCE_WEIGHTS, "")?;
        if value.is_empty() {
            return Ok(ConfidenceWeights::default());
        }

        let weights: ConfidenceWeights = serde_json::from_str(&value).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::CONFIDENCE_WEIGHTS,
                raw_value = %value,
                "置信度权重配置格式错误，使用默认权重"
            );
            ConfidenceWeights::default()
        });
        Ok(weights)
    }

    async fn get_hour_balance_tolerance(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::HOUR_BALANCE_TOLERANCE, "0.10")?;
        Ok(value.parse::<f64>().unwrap_or(0.10))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 硬约束默认值（规则集可覆盖）
    pub const MIN_REST_HOURS: &str = "min_rest_hours";
    pub const MAX_CONSECUTIVE_DAYS: &str = "max_consecutive_days";

    // 生成引擎
    pub const ALLOW_UNKNOWN_FILL: &str = "allow_unknown_fill";

    // 置信度
    pub const CONFIDENCE_WEIGHTS: &str = "confidence_weights"; // JSON {coverage, soft, balance}
    pub const HOUR_BALANCE_TOLERANCE: &str = "hour_balance_tolerance";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_without_rows() {
        let mgr = setup();
        assert_eq!(mgr.get_min_rest_hours().await.unwrap(), 11.0);
        assert_eq!(mgr.get_max_consecutive_days().await.unwrap(), 6);
        assert!(mgr.get_allow_unknown_fill().await.unwrap());
        assert_eq!(mgr.get_hour_balance_tolerance().await.unwrap(), 0.10);

        let w = mgr.get_confidence_weights().await.unwrap();
        assert_eq!(w.coverage, 0.5);
        assert_eq!(w.soft, 0.3);
        assert_eq!(w.balance, 0.2);
    }

    #[tokio::test]
    async fn test_override_and_bad_value_fallback() {
        let mgr = setup();

        mgr.set_global_config_value(config_keys::MIN_REST_HOURS, "12")
            .unwrap();
        assert_eq!(mgr.get_min_rest_hours().await.unwrap(), 12.0);

        mgr.set_global_config_value(config_keys::ALLOW_UNKNOWN_FILL, "false")
            .unwrap();
        assert!(!mgr.get_allow_unknown_fill().await.unwrap());

        // 非法数值回落默认
        mgr.set_global_config_value(config_keys::MAX_CONSECUTIVE_DAYS, "abc")
            .unwrap();
        assert_eq!(mgr.get_max_consecutive_days().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_confidence_weights_json() {
        let mgr = setup();
        mgr.set_global_config_value(
            config_keys::CONFIDENCE_WEIGHTS,
            r#"{"coverage":0.6,"soft":0.2,"balance":0.2}"#,
        )
        .unwrap();

        let w = mgr.get_confidence_weights().await.unwrap();
        assert_eq!(w.coverage, 0.6);

        // 坏 JSON 回落默认
        mgr.set_global_config_value(config_keys::CONFIDENCE_WEIGHTS, "not-json")
            .unwrap();
        let w = mgr.get_confidence_weights().await.unwrap();
        assert_eq!(w.coverage, 0.5);
    }
}
