//! ODataClient 集成测试
//!
//! 使用 wiremock 模拟 S/4HANA OData 服务，覆盖分页读取、CSRF token 获取、
//! `$batch` 提交与响应解码，以及后端错误映射。

use credit_block_shared::config::{DestinationConfig, ServicesConfig};
use credit_block_shared::destination::Destination;
use credit_block_worker::models::{OrderService, RejectionReason, UpdateRequest};
use credit_block_worker::odata::{ChangesetResponse, ODataClient};
use credit_block_worker::reader::CreditBlockSource;
use credit_block_worker::updater::ChangesetWriter;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREDIT_BLOCK_PATH: &str =
    "/sap/opu/odata/sap/YY1_SALESDOCCREDITBLOCK_API_CDS/YY1_SalesDocCreditBlock_API";
const STANDARD_ROOT: &str = "/sap/opu/odata/sap/API_SALES_ORDER_SRV";

// ==================== 辅助函数 ====================

fn client_for(server: &MockServer) -> ODataClient {
    let config = DestinationConfig {
        url: server.uri(),
        username: Some("user".to_string()),
        password: Some("pw".to_string()),
        sap_client: Some("100".to_string()),
        ..Default::default()
    };
    let destination = Destination::resolve_with(&config, None).unwrap();
    ODataClient::new(destination, ServicesConfig::default()).unwrap()
}

fn request(order: &str, item: &str, reason: RejectionReason) -> UpdateRequest {
    UpdateRequest {
        order_id: order.to_string(),
        item_id: item.to_string(),
        rejection_reason: reason,
    }
}

async fn mount_csrf(server: &MockServer, service_root: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{service_root}/")))
        .and(header("x-csrf-token", "Fetch"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-csrf-token", "tok-123")
                .insert_header("set-cookie", "SAP_SESSIONID=abc; Path=/"),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn batch_response(body: &[&str], boundary: &str) -> ResponseTemplate {
    ResponseTemplate::new(202).set_body_raw(
        body.join("\r\n").into_bytes(),
        &format!("multipart/mixed; boundary={boundary}"),
    )
}

// ==================== 读取 ====================

#[tokio::test]
async fn test_fetch_pending_follows_next_link() {
    let server = MockServer::start().await;

    // 带 skiptoken 的第二页先注册，优先匹配
    Mock::given(method("GET"))
        .and(path(CREDIT_BLOCK_PATH))
        .and(query_param("$skiptoken", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d": { "results": [
                { "SalesDocument": "2", "SalesDocumentItem": "10", "SDDocumentCategory": "I", "SetCreditBlock": false }
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(CREDIT_BLOCK_PATH))
        .and(query_param("$format", "json"))
        .and(query_param("sap-client", "100"))
        .and(header("authorization", "Basic dXNlcjpwdw=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d": {
                "results": [
                    { "SalesDocument": "1", "SalesDocumentItem": "10", "SDDocumentCategory": "C", "SetCreditBlock": true },
                    { "SalesDocument": "1", "SalesDocumentItem": "20", "SDDocumentCategory": "C", "SetCreditBlock": true }
                ],
                "__next": "YY1_SalesDocCreditBlock_API?$skiptoken=2"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let records = client_for(&server).fetch_pending().await.unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].sales_document, "1");
    assert!(records[0].set_credit_block);
    assert_eq!(records[2].sales_document, "2");
    assert_eq!(records[2].sd_document_category, "I");
    assert!(!records[2].set_credit_block);
}

#[tokio::test]
async fn test_fetch_pending_stops_on_repeated_next_link() {
    let server = MockServer::start().await;

    // 第二页的 __next 指向自身
    Mock::given(method("GET"))
        .and(path(CREDIT_BLOCK_PATH))
        .and(query_param("$skiptoken", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d": {
                "results": [
                    { "SalesDocument": "2", "SalesDocumentItem": "10", "SDDocumentCategory": "C", "SetCreditBlock": true }
                ],
                "__next": "YY1_SalesDocCreditBlock_API?$skiptoken=2"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(CREDIT_BLOCK_PATH))
        .and(query_param("$format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d": {
                "results": [
                    { "SalesDocument": "1", "SalesDocumentItem": "10", "SDDocumentCategory": "C", "SetCreditBlock": true }
                ],
                "__next": "YY1_SalesDocCreditBlock_API?$skiptoken=2"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let records = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        client_for(&server).fetch_pending(),
    )
    .await
    .expect("重复的下一页链接应终止分页")
    .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_absolute_next_link_keeps_its_own_sap_client() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CREDIT_BLOCK_PATH))
        .and(query_param("$skiptoken", "2"))
        .and(header("authorization", "Basic dXNlcjpwdw=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "d": { "results": [] } })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(CREDIT_BLOCK_PATH))
        .and(query_param("$format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d": {
                "results": [],
                "__next": format!("{}{CREDIT_BLOCK_PATH}?sap-client=100&$skiptoken=2", server.uri())
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).fetch_pending().await.unwrap();

    let received = server.received_requests().await.unwrap();
    let second = received
        .iter()
        .find(|r| r.url.query_pairs().any(|(k, _)| k == "$skiptoken"))
        .unwrap();
    let clients: Vec<String> = second
        .url
        .query_pairs()
        .filter(|(k, _)| k == "sap-client")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(clients, vec!["100".to_string()]);
}

#[tokio::test]
async fn test_fetch_pending_maps_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CREDIT_BLOCK_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "401", "message": { "lang": "en", "value": "Logon failed" } }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_pending().await.unwrap_err();

    assert_eq!(err.code(), "BACKEND_ERROR");
    assert!(err.to_string().contains("401"));
    assert!(err.to_string().contains("Logon failed"));
}

#[tokio::test]
async fn test_fetch_pending_rejects_malformed_payload() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CREDIT_BLOCK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_pending().await.unwrap_err();
    assert_eq!(err.code(), "DECODE_ERROR");
}

// ==================== 写入 ====================

#[tokio::test]
async fn test_submit_sends_csrf_token_and_decodes_items() {
    let server = MockServer::start().await;
    mount_csrf(&server, STANDARD_ROOT).await;

    Mock::given(method("POST"))
        .and(path(format!("{STANDARD_ROOT}/$batch")))
        .and(header("x-csrf-token", "tok-123"))
        .and(body_string_contains(
            "PATCH A_SalesOrderItem(SalesOrder='1',SalesOrderItem='10') HTTP/1.1",
        ))
        .and(body_string_contains(
            "PATCH A_SalesOrderItem(SalesOrder='1',SalesOrderItem='20') HTTP/1.1",
        ))
        .respond_with(batch_response(
            &[
                "--batchresponse_1",
                "Content-Type: multipart/mixed; boundary=changesetresponse_1",
                "",
                "--changesetresponse_1",
                "Content-Type: application/http",
                "Content-Transfer-Encoding: binary",
                "",
                "HTTP/1.1 204 No Content",
                "",
                "",
                "--changesetresponse_1",
                "Content-Type: application/http",
                "Content-Transfer-Encoding: binary",
                "",
                "HTTP/1.1 204 No Content",
                "",
                "",
                "--changesetresponse_1--",
                "",
                "--batchresponse_1--",
                "",
            ],
            "batchresponse_1",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let responses = client
        .submit(
            OrderService::Standard,
            &[
                request("1", "10", RejectionReason::Block),
                request("1", "20", RejectionReason::Clear),
            ],
        )
        .await
        .unwrap();

    assert_eq!(responses.len(), 1);
    let ChangesetResponse::Success { items } = &responses[0] else {
        panic!("expected success, got {:?}", responses[0]);
    };
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.status == 204));

    // 批量请求需携带 CSRF 获取时下发的会话 cookie
    let received = server.received_requests().await.unwrap();
    let batch = received
        .iter()
        .find(|r| r.url.path().ends_with("/$batch"))
        .unwrap();
    let cookie = batch
        .headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.contains("SAP_SESSIONID=abc"));

    let body = String::from_utf8_lossy(&batch.body);
    assert!(body.contains(r#"{"SalesDocumentRjcnReason":"70"}"#));
    assert!(body.contains(r#"{"SalesDocumentRjcnReason":""}"#));
    assert!(body.contains("If-Match: *"));
}

#[tokio::test]
async fn test_submit_free_of_charge_failure_list() {
    let server = MockServer::start().await;
    let root = "/sap/opu/odata/sap/API_SALES_ORDER_WITHOUT_CHARGE_SRV";
    mount_csrf(&server, root).await;

    let error = json!({
        "error": {
            "code": "V1/001",
            "message": { "lang": "en", "value": "Errors in changeset" },
            "innererror": { "errordetails": [
                { "code": "V1/302", "message": "Item 10 blocked", "severity": "error" },
                { "code": "V1/302", "message": "Item 20 blocked", "severity": "error" }
            ]}
        }
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path(format!("{root}/$batch")))
        .and(body_string_contains(
            "A_SalesOrderWithoutChargeItem(SalesOrderWithoutCharge='9',SalesOrderWithoutChargeItem='10')",
        ))
        .respond_with(batch_response(
            &[
                "--batchresponse_2",
                "Content-Type: application/http",
                "Content-Transfer-Encoding: binary",
                "",
                "HTTP/1.1 400 Bad Request",
                "Content-Type: application/json",
                "",
                &error,
                "--batchresponse_2--",
                "",
            ],
            "batchresponse_2",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let responses = client_for(&server)
        .submit(
            OrderService::FreeOfCharge,
            &[
                request("9", "10", RejectionReason::Block),
                request("9", "20", RejectionReason::Block),
            ],
        )
        .await
        .unwrap();

    assert_eq!(
        responses,
        vec![ChangesetResponse::FailureList {
            status: 400,
            details: vec!["Item 10 blocked".to_string(), "Item 20 blocked".to_string()],
        }]
    );
}

#[tokio::test]
async fn test_submit_maps_batch_level_http_error() {
    let server = MockServer::start().await;
    mount_csrf(&server, STANDARD_ROOT).await;

    Mock::given(method("POST"))
        .and(path(format!("{STANDARD_ROOT}/$batch")))
        .respond_with(ResponseTemplate::new(403).set_body_string("CSRF token validation failed"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .submit(
            OrderService::Standard,
            &[request("1", "10", RejectionReason::Block)],
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "BACKEND_ERROR");
    assert!(err.to_string().contains("CSRF token validation failed"));
}
