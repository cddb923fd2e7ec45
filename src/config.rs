use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 存在时以环境变量为准）
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式：full | compact
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_format() -> String {
        "full".to_string()
    }

    /// 生成默认的 EnvFilter 指令
    pub fn filter_directive(&self) -> String {
        format!("customer_stats={},tower_http=info", self.level)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀（为空表示挂在根路径）
    #[serde(default)]
    pub prefix: String,
    /// 单个请求的处理时限（秒），0 表示不限制
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    fn default_request_timeout() -> u64 {
        10
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            request_timeout_secs: Self::default_request_timeout(),
        }
    }
}

/// 存储配置（计数表与资格参考表共用同一个 SQLite 文件）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite 文件路径
    #[serde(default = "StoreConfig::default_sqlite_path")]
    pub sqlite_path: String,
    /// 是否启用 WAL
    #[serde(default = "StoreConfig::default_sqlite_wal")]
    pub sqlite_wal: bool,
    /// 连接池上限
    #[serde(default = "StoreConfig::default_max_connections")]
    pub max_connections: u32,
    /// 等待写锁的时间（毫秒）
    #[serde(default = "StoreConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// 瞬时冲突（SQLITE_BUSY/SQLITE_LOCKED）的最大重试次数
    #[serde(default = "StoreConfig::default_max_retries")]
    pub max_retries: u32,
    /// 重试退避基数（毫秒），第 n 次重试等待 n * backoff
    #[serde(default = "StoreConfig::default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl StoreConfig {
    fn default_sqlite_path() -> String {
        "./data/customer_stats.db".to_string()
    }
    fn default_sqlite_wal() -> bool {
        true
    }
    fn default_max_connections() -> u32 {
        8
    }
    fn default_busy_timeout_ms() -> u64 {
        5_000
    }
    fn default_max_retries() -> u32 {
        3
    }
    fn default_retry_backoff_ms() -> u64 {
        20
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Self::default_sqlite_path(),
            sqlite_wal: Self::default_sqlite_wal(),
            max_connections: Self::default_max_connections(),
            busy_timeout_ms: Self::default_busy_timeout_ms(),
            max_retries: Self::default_max_retries(),
            retry_backoff_ms: Self::default_retry_backoff_ms(),
        }
    }
}

/// 小时分桶配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// 分桶与按日切分使用的参考时区（IANA 名称，如 UTC、Asia/Shanghai）。
    /// 不随宿主机本地时区变化。
    #[serde(default = "BucketConfig::default_timezone")]
    pub timezone: String,
}

impl BucketConfig {
    fn default_timezone() -> String {
        "UTC".to_string()
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            timezone: Self::default_timezone(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// 存储配置
    #[serde(default)]
    pub store: StoreConfig,
    /// 分桶配置
    #[serde(default)]
    pub buckets: BucketConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::get_config_path())
    }

    /// 从指定路径加载配置（文件可缺省，缺省时全部走默认值 + 环境变量）
    pub fn load_from(config_path: &std::path::Path) -> Result<Self, ConfigError> {
        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path).required(false))
            // 支持环境变量覆盖，例如：APP_SERVER__PORT、APP_STORE__SQLITE_PATH
            // （字段名本身含下划线，层级分隔符用双下划线）
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径（可由 APP_CONFIG_FILE 指定）
    fn get_config_path() -> PathBuf {
        std::env::var("APP_CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load_from(std::path::Path::new("./does-not-exist.toml"))
            .expect("defaults");
        assert_eq!(cfg.buckets.timezone, "UTC");
        assert_eq!(cfg.store.max_retries, 3);
        assert!(cfg.api.request_timeout().is_some());
    }
}
