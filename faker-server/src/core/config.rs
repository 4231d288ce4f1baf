use std::path::PathBuf;
use std::time::Duration;

/// 服务配置 - 虚拟打印机的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | DATABASE_PATH | $WORK_DIR/receipts.redb | 小票数据库 |
/// | LISTEN_HOST | 0.0.0.0 | 监听地址 |
/// | PRINTER_PORT | 9100 | 打印端口 |
/// | LISTEN_BACKLOG | 50 | 监听队列长度 |
/// | MAX_CONNECTIONS | 50 | 最大并发会话数 |
/// | POOL_ACQUIRE_TIMEOUT_MS | 5000 | 获取会话槽位超时(毫秒) |
/// | READ_TIMEOUT_MS | 1000 | 单次读取超时(毫秒) |
/// | IDLE_TIMEOUT_SECS | 30 | 会话空闲超时(秒) |
/// | MIN_JOB_BYTES | 50 | 打印任务最小字节数 |
/// | LINE_WIDTH | 42 | 纸宽(字符) |
/// | CACHE_CAPACITY | 500 | 最近小票缓存条数 |
/// | RETENTION_DAYS | 30 | 小票保留天数 |
/// | CLEANUP_INTERVAL_SECS | 3600 | 清理间隔(秒) |
/// | RETRY_QUEUE_SIZE | 1000 | 重试队列容量 |
/// | RETRY_SEED_SECS | 5 | 首次重试延迟(秒) |
/// | RETRY_CAP_SECS | 300 | 最大重试延迟(秒) |
/// | SUPABASE_URL | - | 下游订单库地址 |
/// | SUPABASE_SERVICE_ROLE_KEY | - | 下游订单库密钥 |
/// | RESTAURANT_ID | a1b2c3d4-... | 餐厅 ID |
/// | AXIOM_TOKEN | - | 监控事件令牌 |
/// | AXIOM_DATASET | kitchen-orders | 监控事件数据集 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | LOG_DIR | - | 日志目录 (设置时按天滚动写入文件) |
///
/// # 示例
///
/// ```ignore
/// PRINTER_PORT=9101 LOG_LEVEL=debug cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放数据库和日志
    pub work_dir: String,
    /// redb 数据库文件路径
    pub database_path: String,
    pub listen_host: String,
    pub printer_port: u16,
    pub listen_backlog: u32,

    // === 会话 ===
    /// 最大并发会话数 (连接池大小)
    pub max_connections: usize,
    pub pool_acquire_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub idle_timeout_secs: u64,
    /// 小于该字节数且不含初始化/切纸指令的会话视为状态探测
    pub min_job_bytes: usize,
    pub line_width: usize,

    // === 存储 ===
    pub cache_capacity: usize,
    pub retention_days: i64,
    pub cleanup_interval_secs: u64,

    // === 投递 ===
    pub retry_queue_size: usize,
    pub retry_seed_secs: u64,
    pub retry_cap_secs: u64,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub restaurant_id: String,

    // === 监控 ===
    pub axiom_token: Option<String>,
    pub axiom_dataset: String,

    // === 日志 ===
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

pub const DEFAULT_RESTAURANT_ID: &str = "a1b2c3d4-e5f6-7890-abcd-ef1234567890";

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 非空环境变量
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into());
        let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| {
            PathBuf::from(&work_dir)
                .join("receipts.redb")
                .to_string_lossy()
                .into_owned()
        });

        Self {
            work_dir,
            database_path,
            listen_host: std::env::var("LISTEN_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            printer_port: env_or("PRINTER_PORT", 9100),
            listen_backlog: env_or("LISTEN_BACKLOG", 50),

            max_connections: env_or("MAX_CONNECTIONS", 50),
            pool_acquire_timeout_ms: env_or("POOL_ACQUIRE_TIMEOUT_MS", 5000),
            read_timeout_ms: env_or("READ_TIMEOUT_MS", 1000),
            idle_timeout_secs: env_or("IDLE_TIMEOUT_SECS", 30),
            min_job_bytes: env_or("MIN_JOB_BYTES", 50),
            line_width: env_or("LINE_WIDTH", faker_printer::DEFAULT_LINE_WIDTH),

            cache_capacity: env_or("CACHE_CAPACITY", 500),
            retention_days: env_or("RETENTION_DAYS", 30),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", 3600),

            retry_queue_size: env_or("RETRY_QUEUE_SIZE", 1000),
            retry_seed_secs: env_or("RETRY_SEED_SECS", 5),
            retry_cap_secs: env_or("RETRY_CAP_SECS", 300),
            supabase_url: env_opt("SUPABASE_URL"),
            supabase_key: env_opt("SUPABASE_SERVICE_ROLE_KEY"),
            restaurant_id: std::env::var("RESTAURANT_ID")
                .unwrap_or_else(|_| DEFAULT_RESTAURANT_ID.into()),

            axiom_token: env_opt("AXIOM_TOKEN"),
            axiom_dataset: std::env::var("AXIOM_DATASET")
                .unwrap_or_else(|_| "kitchen-orders".into()),

            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            log_dir: env_opt("LOG_DIR"),
        }
    }

    /// 测试配置: 临时端口、短超时、无下游
    ///
    /// 不读取环境变量，保证测试结果稳定
    pub fn for_tests(work_dir: impl Into<String>) -> Self {
        let work_dir = work_dir.into();
        let database_path = PathBuf::from(&work_dir)
            .join("receipts.redb")
            .to_string_lossy()
            .into_owned();

        Self {
            work_dir,
            database_path,
            listen_host: "127.0.0.1".into(),
            printer_port: 0,
            listen_backlog: 16,
            max_connections: 4,
            pool_acquire_timeout_ms: 100,
            read_timeout_ms: 50,
            idle_timeout_secs: 1,
            min_job_bytes: 50,
            line_width: faker_printer::DEFAULT_LINE_WIDTH,
            cache_capacity: 500,
            retention_days: 30,
            cleanup_interval_secs: 3600,
            retry_queue_size: 16,
            retry_seed_secs: 5,
            retry_cap_secs: 300,
            supabase_url: None,
            supabase_key: None,
            restaurant_id: DEFAULT_RESTAURANT_ID.into(),
            axiom_token: None,
            axiom_dataset: "kitchen-orders".into(),
            log_level: "debug".into(),
            log_json: false,
            log_dir: None,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.printer_port)
    }

    pub fn pool_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_acquire_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// 下游订单库是否已配置
    pub fn downstream_configured(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_key.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
