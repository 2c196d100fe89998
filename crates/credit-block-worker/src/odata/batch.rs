//! OData v2 `$batch` 编解码
//!
//! 请求侧把一组写操作编码为单个 changeset 的 multipart/mixed 报文；
//! 响应侧在边界处一次性解码为 [`ChangesetResponse`]，上层不再按结构临时判断。
//!
//! 响应结构约定：
//! - changeset 成功：嵌套 multipart，每个操作对应一个子响应
//! - changeset 失败：单个 application/http 响应，错误体中
//!   `error.innererror.errordetails` 非空时按列表处理，否则按单条消息处理

use mime::Mime;
use serde_json::Value;

use crate::error::{Result, WorkerError};

const CRLF: &str = "\r\n";

/// changeset 中的单个写操作
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperation {
    /// HTTP 方法，如 `PATCH`
    pub method: &'static str,
    /// 相对服务根的资源路径
    pub path: String,
    pub body: Value,
}

/// 单个子响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResponse {
    pub status: u16,
    /// 响应体中内嵌的错误信息（`error.message.value`）
    pub error_message: Option<String>,
}

impl ItemResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 一个 changeset 的响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesetResponse {
    /// changeset 已执行，逐项返回状态
    Success { items: Vec<ItemResponse> },
    /// changeset 整体失败，错误详情为列表
    FailureList { status: u16, details: Vec<String> },
    /// changeset 整体失败，只有一条错误信息
    FailureSingle { status: u16, message: String },
}

impl ChangesetResponse {
    /// 指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::FailureList { .. } => "failure_list",
            Self::FailureSingle { .. } => "failure_single",
        }
    }
}

/// 生成 multipart 边界
pub fn new_boundary(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4())
}

/// 将写操作编码为包含单个 changeset 的 `$batch` 请求体
pub fn encode_changeset(
    batch_boundary: &str,
    changeset_boundary: &str,
    operations: &[BatchOperation],
) -> String {
    let mut body = String::new();

    body.push_str(&format!("--{batch_boundary}{CRLF}"));
    body.push_str(&format!(
        "Content-Type: multipart/mixed; boundary={changeset_boundary}{CRLF}{CRLF}"
    ));

    for (index, operation) in operations.iter().enumerate() {
        body.push_str(&format!("--{changeset_boundary}{CRLF}"));
        body.push_str(&format!("Content-Type: application/http{CRLF}"));
        body.push_str(&format!("Content-Transfer-Encoding: binary{CRLF}"));
        body.push_str(&format!("Content-ID: {}{CRLF}{CRLF}", index + 1));

        body.push_str(&format!("{} {} HTTP/1.1{CRLF}", operation.method, operation.path));
        body.push_str(&format!("Content-Type: application/json{CRLF}"));
        body.push_str(&format!("Accept: application/json{CRLF}"));
        body.push_str(&format!("If-Match: *{CRLF}{CRLF}"));
        body.push_str(&operation.body.to_string());
        body.push_str(CRLF);
    }

    body.push_str(&format!("--{changeset_boundary}--{CRLF}"));
    body.push_str(CRLF);
    body.push_str(&format!("--{batch_boundary}--{CRLF}"));
    body
}

/// 解码 `$batch` 响应
pub fn decode_batch_response(content_type: &str, body: &str) -> Result<Vec<ChangesetResponse>> {
    let boundary = boundary_of(content_type).ok_or_else(|| {
        WorkerError::Decode(format!("batch 响应缺少 boundary: {content_type}"))
    })?;

    let normalized = body.replace(CRLF, "\n");
    split_multipart(&normalized, &boundary)
        .into_iter()
        .map(decode_part)
        .collect()
}

fn decode_part(part: &str) -> Result<ChangesetResponse> {
    let (headers, content) = split_head(part);
    let content_type = header(headers, "content-type").unwrap_or_default();

    if is_multipart_mixed(content_type) {
        let boundary = boundary_of(content_type).ok_or_else(|| {
            WorkerError::Decode(format!("changeset 响应缺少 boundary: {content_type}"))
        })?;
        let items = split_multipart(content, &boundary)
            .into_iter()
            .map(|sub_part| {
                let (_, http) = split_head(sub_part);
                parse_http_response(http)
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(ChangesetResponse::Success { items });
    }

    let (status, body) = parse_status_and_body(content)?;
    if (200..300).contains(&status) {
        return Ok(ChangesetResponse::Success {
            items: vec![ItemResponse {
                status,
                error_message: None,
            }],
        });
    }

    let details = extract_error_details(body);
    if details.is_empty() {
        let message = extract_error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
        Ok(ChangesetResponse::FailureSingle { status, message })
    } else {
        Ok(ChangesetResponse::FailureList { status, details })
    }
}

fn parse_http_response(text: &str) -> Result<ItemResponse> {
    let (status, body) = parse_status_and_body(text)?;
    let error_message = if (200..300).contains(&status) {
        None
    } else {
        extract_error_message(body)
    };
    Ok(ItemResponse {
        status,
        error_message,
    })
}

/// 解析 `HTTP/1.1 204 No Content` 形式的状态行，返回状态码和响应体
fn parse_status_and_body(text: &str) -> Result<(u16, &str)> {
    let (head, body) = split_head(text.trim_start());
    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| WorkerError::Decode(format!("无效的 HTTP 状态行: {status_line}")))?;
    Ok((status, body.trim()))
}

/// 提取 OData 错误体中的主消息
///
/// 兼容 v2（`error.message.value`）和 v4（`error.message` 为字符串）两种格式。
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value.get("error")?.get("message")?;
    match message {
        Value::String(text) => Some(text.clone()),
        other => other.get("value")?.as_str().map(str::to_string),
    }
}

/// 提取 `error.innererror.errordetails[*].message`
pub fn extract_error_details(body: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    value
        .pointer("/error/innererror/errordetails")
        .and_then(Value::as_array)
        .map(|details| {
            details
                .iter()
                .filter_map(|detail| detail.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_mime(content_type: &str) -> Option<Mime> {
    content_type.trim().parse::<Mime>().ok()
}

fn is_multipart_mixed(content_type: &str) -> bool {
    parse_mime(content_type).is_some_and(|mime| mime.essence_str() == "multipart/mixed")
}

/// 从 Content-Type 中读取 boundary 参数（引号由 mime 解析去除）
fn boundary_of(content_type: &str) -> Option<String> {
    let mime = parse_mime(content_type)?;
    mime.get_param(mime::BOUNDARY)
        .map(|boundary| boundary.as_str().to_string())
}

/// 按边界切分 multipart 正文（输入已统一为 `\n` 换行）
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();

    for segment in body.split(delimiter.as_str()).skip(1) {
        if segment.starts_with("--") {
            break;
        }
        // 分隔符所在行的剩余部分（传输填充）不属于正文
        let content = match segment.find('\n') {
            Some(index) => &segment[index + 1..],
            None => "",
        };
        parts.push(content.trim_end_matches('\n'));
    }

    parts
}

/// 以首个空行切分头部和正文
fn split_head(text: &str) -> (&str, &str) {
    match text.find("\n\n") {
        Some(index) => (&text[..index], &text[index + 2..]),
        None => (text, ""),
    }
}

fn header<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim())
        } else {
            None
        }
    })
}
