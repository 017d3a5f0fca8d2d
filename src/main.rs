use clap::Parser;
use small_gameserver::adapters::{FleetClient, FleetEndpoint};
use small_gameserver::config::{CliConfig, ServerConfig};
use small_gameserver::core::ConfigProvider;
use small_gameserver::utils::monitor::HealthMonitor;
use small_gameserver::utils::{logger, validation::Validate};
use small_gameserver::ServerEngine;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 解析配置 (CLI > TOML > 環境變數 > 預設值)
    let config = match ServerConfig::resolve(cli.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌 (主控台 + 平台收集的檔案)
    let log_init = if config.log_json {
        logger::init_json_logger(&config.log_dir, config.port, config.verbose)
    } else {
        logger::init_server_logger(&config.log_dir, config.port, config.verbose)
    };
    let log_path = match log_init {
        Ok(path) => path,
        Err(e) => {
            eprintln!("❌ Failed to initialize logging: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting small-gameserver");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor_enabled;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }
    let monitor = HealthMonitor::new(monitor_enabled, config.memory_limit_mb);

    tracing::info!("📁 Log file: {}", log_path);

    match run_server(config, monitor, log_path).await {
        Ok(()) => {
            tracing::info!("✅ Game server process completed successfully!");
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Game server process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                small_gameserver::utils::error::ErrorSeverity::Low => 0, // 警告，但成功
                small_gameserver::utils::error::ErrorSeverity::Medium => 2, // 重試錯誤
                small_gameserver::utils::error::ErrorSeverity::High => 1, // 處理錯誤
                small_gameserver::utils::error::ErrorSeverity::Critical => 3, // 系統錯誤
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

/// Connect the lifecycle client and hand control to the engine.
async fn run_server(
    config: ServerConfig,
    monitor: HealthMonitor,
    log_path: String,
) -> small_gameserver::Result<()> {
    let endpoint = FleetEndpoint::from_config(&config);
    let backend = FleetClient::connect(
        endpoint,
        config.request_timeout(),
        config.health_interval(),
    )
    .await?;

    let engine = ServerEngine::new(Arc::new(backend), &config, monitor, vec![log_path]);
    engine.run().await
}
