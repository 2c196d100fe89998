//! OData v2 HTTP 客户端
//!
//! 封装对 S/4HANA 的查询和 `$batch` 写入：
//! - 查询按 `__next` 链接自动翻页
//! - 写入前获取 CSRF token，cookie 由客户端的 cookie store 回放

use std::collections::HashSet;
use std::sync::Arc;

use credit_block_shared::config::ServicesConfig;
use credit_block_shared::destination::Destination;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::batch::{
    BatchOperation, ChangesetResponse, decode_batch_response, encode_changeset,
    extract_error_message, new_boundary,
};
use crate::error::{Result, WorkerError};

const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, Deserialize)]
struct ODataEnvelope<T> {
    d: ODataCollection<T>,
}

#[derive(Debug, Deserialize)]
struct ODataCollection<T> {
    results: Vec<T>,
    #[serde(rename = "__next", default)]
    next: Option<String>,
}

/// OData 客户端
///
/// 内部持有连接池和 cookie store，克隆开销低，可在各任务间共享。
#[derive(Clone)]
pub struct ODataClient {
    http: reqwest::Client,
    destination: Arc<Destination>,
    services: Arc<ServicesConfig>,
}

impl ODataClient {
    pub fn new(destination: Destination, services: ServicesConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(destination.timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http,
            destination: Arc::new(destination),
            services: Arc::new(services),
        })
    }

    pub fn services(&self) -> &ServicesConfig {
        &self.services
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// 服务根地址，如 `https://host/sap/opu/odata/sap/API_SALES_ORDER_SRV`
    pub fn service_root(&self, service: &str) -> String {
        format!(
            "{}/{}/{}",
            self.destination.url,
            self.services.odata_base_path.trim_matches('/'),
            service
        )
    }

    /// 附加认证信息和 sap-client 参数
    fn with_credentials(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.destination.username {
            Some(username) => request.basic_auth(username, self.destination.password.as_deref()),
            None => request,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = self.with_credentials(request);
        match &self.destination.sap_client {
            Some(client) => request.query(&[("sap-client", client.as_str())]),
            None => request,
        }
    }

    /// 读取实体集的全部记录
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        service: &str,
        entity_set: &str,
    ) -> Result<Vec<T>> {
        let root = self.service_root(service);
        let first = format!("{root}/{entity_set}");
        let mut results = Vec::new();
        let mut visited = HashSet::from([first.clone()]);

        let request = self
            .authorize(self.http.get(&first))
            .query(&[("$format", "json")])
            .header(ACCEPT, "application/json");
        let mut page: ODataCollection<T> = Self::read_json::<ODataEnvelope<T>>(request.send().await?)
            .await?
            .d;

        loop {
            results.extend(page.results);

            let Some(next) = page.next else {
                break;
            };
            // 绝对链接由服务端生成，已带 sap-client
            let absolute = next.starts_with("http://") || next.starts_with("https://");
            let url = if absolute {
                next
            } else {
                format!("{root}/{}", next.trim_start_matches('/'))
            };
            if !visited.insert(url.clone()) {
                warn!(service, entity_set, url = %url, "下一页链接重复，停止分页");
                break;
            }
            debug!(service, entity_set, url = %url, "读取下一页");

            let request = if absolute {
                self.with_credentials(self.http.get(&url))
            } else {
                self.authorize(self.http.get(&url))
            };
            let request = request.header(ACCEPT, "application/json");
            page = Self::read_json::<ODataEnvelope<T>>(request.send().await?)
                .await?
                .d;
        }

        Ok(results)
    }

    /// 以单个 changeset 提交写操作
    pub async fn submit_changeset(
        &self,
        service: &str,
        operations: &[BatchOperation],
    ) -> Result<Vec<ChangesetResponse>> {
        let root = self.service_root(service);
        let csrf_token = self.fetch_csrf_token(&root).await?;

        let batch_boundary = new_boundary("batch");
        let changeset_boundary = new_boundary("changeset");
        let body = encode_changeset(&batch_boundary, &changeset_boundary, operations);

        let mut request = self
            .authorize(self.http.post(format!("{root}/$batch")))
            .header(
                CONTENT_TYPE,
                format!("multipart/mixed; boundary={batch_boundary}"),
            )
            .header(ACCEPT, "multipart/mixed")
            .body(body);
        if let Some(token) = csrf_token {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(WorkerError::Backend {
                status: status.as_u16(),
                message: extract_error_message(&text).unwrap_or(text),
            });
        }

        decode_batch_response(&content_type, &text)
    }

    /// 获取 CSRF token
    ///
    /// 后端未返回 token 时继续提交，由后端决定是否拒绝。
    async fn fetch_csrf_token(&self, service_root: &str) -> Result<Option<String>> {
        let response = self
            .authorize(self.http.get(format!("{service_root}/")))
            .header(CSRF_HEADER, "Fetch")
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.eq_ignore_ascii_case("required"))
            .map(str::to_string);

        if token.is_none() {
            warn!(
                service_root,
                status = response.status().as_u16(),
                "未获取到 CSRF token，继续提交"
            );
        }

        Ok(token)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(WorkerError::Backend {
                status: status.as_u16(),
                message: extract_error_message(&text).unwrap_or(text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}
