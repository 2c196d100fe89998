//! 配置加载集成测试
//!
//! 验证配置文件、CREDIT_BLOCK_ 前缀环境变量与 JOB_FREQUENCY_MIN 的覆盖顺序。
//! 环境变量是进程级状态，所有断言集中在同一个测试中顺序执行。

use std::fs;
use std::path::PathBuf;

use credit_block_shared::config::{AppConfig, JobSchedule};
use credit_block_shared::destination::Destination;
use credit_block_shared::observability::metrics::{
    record_changeset, record_item, record_records_fetched, record_run,
};

fn write_config_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("credit-block-config-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("创建临时配置目录失败");
    fs::write(
        dir.join("default.toml"),
        r#"
[job]
frequency_minutes = 10

[destination]
url = "https://file.example.com/"
username = "FILE_USER"
sap_client = "100"

[observability]
log_level = "debug"
"#,
    )
    .expect("写入 default.toml 失败");
    fs::write(
        dir.join("credit-block-worker.toml"),
        r#"
[services]
credit_block_entity_set = "YY1_Custom_API"
"#,
    )
    .expect("写入服务配置失败");
    dir
}

#[test]
fn test_layered_config_loading() {
    let dir = write_config_dir();

    // SAFETY: 本测试二进制中只有这一个测试读写环境变量
    unsafe {
        std::env::set_var("CONFIG_DIR", &dir);
        std::env::remove_var("JOB_FREQUENCY_MIN");
        std::env::remove_var("destinations");
    }

    let config = AppConfig::load("credit-block-worker").expect("加载配置失败");
    assert_eq!(config.service_name, "credit-block-worker");
    assert_eq!(config.job.frequency_minutes, 10);
    assert_eq!(config.job.name, "salesreasonforrejection");
    assert_eq!(config.destination.username.as_deref(), Some("FILE_USER"));
    assert_eq!(config.services.credit_block_entity_set, "YY1_Custom_API");
    assert_eq!(config.services.standard_order_service, "API_SALES_ORDER_SRV");
    assert_eq!(config.observability.log_level, "debug");

    let destination = Destination::resolve(&config.destination).expect("解析目标系统失败");
    assert_eq!(destination.url, "https://file.example.com");
    assert_eq!(destination.sap_client.as_deref(), Some("100"));

    // 环境变量覆盖配置文件
    unsafe {
        std::env::set_var("CREDIT_BLOCK_DESTINATION__URL", "https://env.example.com");
        std::env::set_var("JOB_FREQUENCY_MIN", "3");
    }
    let config = AppConfig::load("credit-block-worker").expect("加载配置失败");
    assert_eq!(config.destination.url, "https://env.example.com");
    assert_eq!(config.job.frequency_minutes, 3);
    assert_eq!(
        config.job.schedule(),
        JobSchedule::Cron("0 */3 * * * *".to_string())
    );

    // 超过一小时的频率不再生成分钟步长
    unsafe {
        std::env::set_var("JOB_FREQUENCY_MIN", "90");
    }
    let config = AppConfig::load("credit-block-worker").expect("加载配置失败");
    assert_eq!(
        config.job.schedule(),
        JobSchedule::Every(std::time::Duration::from_secs(90 * 60))
    );

    // 非数字频率回退到 1 分钟
    unsafe {
        std::env::set_var("JOB_FREQUENCY_MIN", "often");
    }
    let config = AppConfig::load("credit-block-worker").expect("加载配置失败");
    assert_eq!(config.job.frequency_minutes, 1);

    // destinations 变量优先于配置
    unsafe {
        std::env::set_var(
            "destinations",
            r#"[{"name":"S4HCLOUD","url":"https://btp.example.com","username":"BTP_USER","password":"pw"}]"#,
        );
    }
    let destination = Destination::resolve(&config.destination).expect("解析目标系统失败");
    assert_eq!(destination.url, "https://btp.example.com");
    assert_eq!(destination.username.as_deref(), Some("BTP_USER"));

    unsafe {
        std::env::remove_var("CREDIT_BLOCK_DESTINATION__URL");
        std::env::remove_var("JOB_FREQUENCY_MIN");
        std::env::remove_var("destinations");
        std::env::remove_var("CONFIG_DIR");
    }
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_metrics_recording_without_recorder() {
    record_run("read_failed", 0.01);
    record_run("nothing_to_update", 0.02);
    record_run("dispatched", 0.5);
    record_records_fetched(0);
    record_records_fetched(42);
    record_changeset("standard", "success");
    record_changeset("free_of_charge", "failure_single");
    record_item("standard", "updated");
    record_item("standard", "failed");
}
