// ==========================================
// 餐饮门店排班系统 - 应用状态
// ==========================================
// 职责: 装配仓储/引擎/API,持有应用级共享状态
// 约定: 全部 API 共享同一个 SQLite 连接(互斥访问)
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ConfigApi, RosterApi, RuleSetApi, ScheduleApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::runs::GenerationRunRegistry;
use crate::engine::ScheduleEventPublisher;
use crate::importer::SnapshotImporter;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::employee_repo::EmployeeRepository;
use crate::repository::rule_set_repo::RuleSetRepository;
use crate::repository::schedule_repo::{AssignmentRepository, ScheduleRepository};

/// 应用状态,持有全部 API 实例与共享资源
pub struct AppState {
    pub db_path: String,

    pub schedule_api: Arc<ScheduleApi>,
    pub roster_api: Arc<RosterApi>,
    pub rule_set_api: Arc<RuleSetApi>,
    pub config_api: Arc<ConfigApi>,
    pub snapshot_importer: Arc<SnapshotImporter>,

    pub action_log_repo: Arc<ActionLogRepository>,
    pub run_registry: Arc<GenerationRunRegistry>,
}

impl AppState {
    /// 打开(必要时初始化)数据库并装配全部 API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化 AppState");

        let conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let created = init_schema(&conn).map_err(|e| format!("数据库结构初始化失败: {}", e))?;
        if created {
            tracing::info!("数据库结构首次建立");
        }

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)), None)
    }

    /// 从已有连接装配(供测试与嵌入场景使用)
    pub fn from_connection(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        event_publisher: Option<Arc<dyn ScheduleEventPublisher>>,
    ) -> Result<Self, String> {
        // 仓储层
        let employee_repo = Arc::new(EmployeeRepository::new(conn.clone()));
        let schedule_repo = Arc::new(ScheduleRepository::new(conn.clone()));
        let assignment_repo = Arc::new(AssignmentRepository::new(conn.clone()));
        let rule_set_repo = Arc::new(RuleSetRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        // 配置与运行控制
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn).map_err(|e| format!("配置管理器初始化失败: {}", e))?,
        );
        let run_registry = Arc::new(GenerationRunRegistry::new());

        // API 层
        let schedule_api = Arc::new(ScheduleApi::new(
            schedule_repo,
            assignment_repo,
            employee_repo.clone(),
            rule_set_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
            run_registry.clone(),
            event_publisher,
        ));
        let roster_api = Arc::new(RosterApi::new(
            employee_repo.clone(),
            action_log_repo.clone(),
        ));
        let rule_set_api = Arc::new(RuleSetApi::new(rule_set_repo, action_log_repo.clone()));
        let config_api = Arc::new(ConfigApi::new(config_manager, action_log_repo.clone()));
        let snapshot_importer = Arc::new(SnapshotImporter::new(
            employee_repo,
            action_log_repo.clone(),
        ));

        tracing::info!("AppState 装配完成");
        Ok(Self {
            db_path,
            schedule_api,
            roster_api,
            rule_set_api,
            config_api,
            snapshot_importer,
            action_log_repo,
            run_registry,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 DINING_SHIFT_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("DINING_SHIFT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./dining_shift_scheduler.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录,避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("dining-shift-scheduler-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("dining-shift-scheduler");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("dining_shift_scheduler.db");
    }

    path.to_string_lossy().to_string()
}
