//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::observability::ObservabilityConfig;

/// 固定的目标系统名称，由运行环境解析为地址和凭据
pub const DESTINATION_NAME: &str = "S4HCLOUD";

/// 定时任务名称
pub const JOB_NAME: &str = "salesreasonforrejection";

/// 控制执行频率（分钟）的环境变量
pub const FREQUENCY_ENV: &str = "JOB_FREQUENCY_MIN";

/// 未配置或配置无效时的默认执行频率（分钟）
pub const DEFAULT_FREQUENCY_MINUTES: u32 = 1;

/// 定时任务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub name: String,
    pub frequency_minutes: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: JOB_NAME.to_string(),
            frequency_minutes: DEFAULT_FREQUENCY_MINUTES,
        }
    }
}

/// 任务触发方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSchedule {
    /// cron 表达式（cron crate 格式，首位为秒）
    Cron(String),
    /// cron 步长无法表达的频率，按固定间隔触发
    Every(Duration),
}

impl JobConfig {
    /// 生效的执行频率（分钟），0 按默认值处理
    pub fn effective_minutes(&self) -> u32 {
        if self.frequency_minutes == 0 {
            DEFAULT_FREQUENCY_MINUTES
        } else {
            self.frequency_minutes
        }
    }

    /// 根据频率选择触发方式
    ///
    /// - 1..=59 分钟：分钟步长 `0 */N * * * *`
    /// - 能整除一天的整小时数：小时步长 `0 0 */H * * *`
    /// - 1440 分钟：每天零点
    /// - 其余频率：固定间隔
    pub fn schedule(&self) -> JobSchedule {
        let minutes = self.effective_minutes();
        match minutes {
            1..=59 => JobSchedule::Cron(format!("0 */{minutes} * * * *")),
            1440 => JobSchedule::Cron("0 0 0 * * *".to_string()),
            m if m % 60 == 0 && 24 % (m / 60) == 0 => {
                JobSchedule::Cron(format!("0 0 */{} * * *", m / 60))
            }
            m => JobSchedule::Every(Duration::from_secs(u64::from(m) * 60)),
        }
    }
}

/// 解析执行频率
///
/// 缺失、非数字或为 0 时回退到默认值 1 分钟。
pub fn parse_frequency(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|minutes| *minutes > 0)
        .unwrap_or(DEFAULT_FREQUENCY_MINUTES)
}

/// 目标系统（S/4HANA）连接配置
///
/// 运行环境提供 `destinations` 变量时以其为准，这里的值作为本地开发的回退。
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// SAP 客户端号，设置后附加 `sap-client` 查询参数
    pub sap_client: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            name: DESTINATION_NAME.to_string(),
            url: String::new(),
            username: None,
            password: None,
            sap_client: None,
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("sap_client", &self.sap_client)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// OData 服务路径配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// OData 服务根路径前缀
    pub odata_base_path: String,
    /// 待处理信用冻结记录的自定义 CDS 服务
    pub credit_block_service: String,
    pub credit_block_entity_set: String,
    /// 标准销售订单服务
    pub standard_order_service: String,
    /// 免费订单服务
    pub free_of_charge_order_service: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            odata_base_path: "/sap/opu/odata/sap".to_string(),
            credit_block_service: "YY1_SALESDOCCREDITBLOCK_API_CDS".to_string(),
            credit_block_entity_set: "YY1_SalesDocCreditBlock_API".to_string(),
            standard_order_service: "API_SALES_ORDER_SRV".to_string(),
            free_of_charge_order_service: "API_SALES_ORDER_WITHOUT_CHARGE_SRV".to_string(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub job: JobConfig,
    pub destination: DestinationConfig,
    pub services: ServicesConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（CREDIT_BLOCK_ 前缀，如 CREDIT_BLOCK_DESTINATION__URL -> destination.url）
    /// 5. JOB_FREQUENCY_MIN -> job.frequency_minutes
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("CREDIT_BLOCK_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("CREDIT_BLOCK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if let Ok(raw) = std::env::var(FREQUENCY_ENV) {
            config.job.frequency_minutes = parse_frequency(Some(&raw));
        } else if config.job.frequency_minutes == 0 {
            config.job.frequency_minutes = DEFAULT_FREQUENCY_MINUTES;
        }

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
