use std::path::Path;

use sqlx::{
    ConnectOptions, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

use crate::config::StoreConfig;
use crate::error::AppError;

/// 按配置打开 SQLite 连接池（文件不存在时创建，目录一并创建）。
///
/// 连接级参数（journal_mode / synchronous / busy_timeout）放在连接选项上，池中每个连接都生效。
pub async fn connect_sqlite(cfg: &StoreConfig) -> Result<SqlitePool, AppError> {
    let path = Path::new(&cfg.sqlite_path);
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::Internal(format!("创建数据目录失败 {dir:?}: {e}")))?;
    }

    let journal_mode = if cfg.sqlite_wal {
        SqliteJournalMode::Wal
    } else {
        SqliteJournalMode::Delete
    };
    let opt = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(journal_mode)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(cfg.busy_timeout())
        .disable_statement_logging();

    SqlitePoolOptions::new()
        .max_connections(cfg.max_connections.max(1))
        .connect_with(opt)
        .await
        .map_err(|e| AppError::Internal(format!("sqlite connect: {e}")))
}
