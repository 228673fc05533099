// ==========================================
// 餐饮门店排班系统 - 导入层
// ==========================================
// 职责: 外部快照文件(花名册/出勤意向)的批量入库
// ==========================================

pub mod snapshot_importer;

pub use snapshot_importer::{ImportReport, RowError, SnapshotImporter};
