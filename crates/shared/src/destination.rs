//! 目标系统解析
//!
//! 按名称解析 S/4HANA 连接参数。优先读取运行环境注入的 `destinations`
//! 变量（JSON 数组，每项包含 name/url/username/password），找不到时回退到
//! 配置文件中的 `destination` 段。

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::DestinationConfig;
use crate::error::{Result, SharedError};

/// 运行环境注入目标系统列表的环境变量
pub const DESTINATIONS_ENV: &str = "destinations";

/// `destinations` 变量中的单个条目
#[derive(Debug, Deserialize)]
struct DestinationEntry {
    name: String,
    url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// 已解析的目标系统
///
/// 构造后只读，由各组件通过 `Arc` 共享。
#[derive(Clone)]
pub struct Destination {
    pub name: String,
    /// 不带末尾 `/` 的基础地址
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sap_client: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("sap_client", &self.sap_client)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Destination {
    /// 从进程环境和配置解析目标系统
    pub fn resolve(config: &DestinationConfig) -> Result<Self> {
        let from_env = std::env::var(DESTINATIONS_ENV).ok();
        Self::resolve_with(config, from_env.as_deref())
    }

    /// 使用给定的 `destinations` 内容解析目标系统
    pub fn resolve_with(config: &DestinationConfig, destinations: Option<&str>) -> Result<Self> {
        if let Some(raw) = destinations.filter(|raw| !raw.trim().is_empty()) {
            let entries: Vec<DestinationEntry> =
                serde_json::from_str(raw).map_err(|e| SharedError::InvalidDestination {
                    name: config.name.clone(),
                    reason: format!("{DESTINATIONS_ENV} 变量不是合法的 JSON 数组: {e}"),
                })?;

            if let Some(entry) = entries.into_iter().find(|entry| entry.name == config.name) {
                debug!(destination = %config.name, "使用运行环境提供的目标系统");
                return Self::build(
                    config,
                    entry.url,
                    entry.username,
                    entry.password,
                );
            }
        }

        if config.url.trim().is_empty() {
            return Err(SharedError::DestinationNotFound {
                name: config.name.clone(),
            });
        }

        debug!(destination = %config.name, "使用配置文件中的目标系统");
        Self::build(
            config,
            config.url.clone(),
            config.username.clone(),
            config.password.clone(),
        )
    }

    fn build(
        config: &DestinationConfig,
        url: String,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let url = url.trim().trim_end_matches('/').to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SharedError::InvalidDestination {
                name: config.name.clone(),
                reason: format!("url 必须以 http:// 或 https:// 开头: {url}"),
            });
        }

        Ok(Self {
            name: config.name.clone(),
            url,
            username,
            password,
            sap_client: config.sap_client.clone().filter(|c| !c.is_empty()),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        })
    }
}
