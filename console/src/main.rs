mod config;
mod host;

use std::sync::Arc;

use anyhow::Context;
use boothfleet_activation::models::IssuedCredentials;
use boothfleet_activation::store::{CredentialStore, FileCredentialStore, FileSelectionStore};
use boothfleet_activation::{ActivationContext, ApiClient, BoothApi, ClientConfig, ScanSession};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Cli, Command};
use crate::host::{HostOutcome, TerminalHost};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenv::dotenv().ok();

    // 加载配置，命令行参数优先
    let cli = Cli::parse();
    let config = cli.apply(ClientConfig::from_env());

    // 初始化日志，输出到 stderr，不干扰交互提示
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "boothfleet={lvl},boothfleet_activation={lvl}",
                    lvl = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("启动 BoothFleet 控制台...");
    info!("配置信息:");
    info!("  - API 地址: {}", config.api_url);
    info!("  - 请求超时: {} ms", config.request_timeout_ms);
    info!("  - 数据目录: {}", config.data_dir.display());

    let api = Arc::new(ApiClient::new(&config).context("创建 API 客户端失败")?);
    let credentials = Arc::new(FileCredentialStore::new(config.credentials_dir()));

    match cli.command() {
        Command::Activate { booth } => activate(&config, api, credentials, booth).await,
        Command::Regenerate { booth } => regenerate(api.as_ref(), credentials.as_ref(), &booth).await,
    }
}

async fn activate(
    config: &ClientConfig,
    api: Arc<ApiClient>,
    credentials: Arc<FileCredentialStore>,
    booth: Option<String>,
) -> anyhow::Result<()> {
    let selection = Arc::new(FileSelectionStore::new(config.selection_path()));
    let mut context = ActivationContext::new(selection);
    if let Some(booth_id) = booth {
        info!("预选展台: {}", booth_id);
        context = context.with_preselected_booth(booth_id);
    }

    let mut session = ScanSession::new(api, context, credentials);
    let mut host = TerminalHost::new(
        tokio::io::BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );

    let outcome = tokio::select! {
        res = host.run(&mut session) => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };

    let outcome = match outcome {
        Some(res) => res?,
        None => {
            warn!("收到中断信号，取消激活");
            session.cancel();
            HostOutcome::Cancelled
        }
    };
    session.dispose();

    match outcome {
        HostOutcome::Activated { booth_id } => info!("展台 {} 激活完成", booth_id),
        HostOutcome::Cancelled => info!("激活已取消"),
        HostOutcome::Left => info!("激活未完成，已退出"),
    }
    Ok(())
}

async fn regenerate(
    api: &dyn BoothApi,
    credentials: &dyn CredentialStore,
    booth_id: &str,
) -> anyhow::Result<()> {
    let license = api
        .regenerate_license(booth_id)
        .await
        .with_context(|| format!("重新生成展台 {} 的许可证失败", booth_id))?;

    // 保留已有凭据中的云同步配置，只替换许可证
    let previous = credentials.load(booth_id).await.unwrap_or_else(|e| {
        warn!("读取旧凭据失败，将重新创建: {}", e);
        None
    });
    let updated = match previous {
        Some(mut creds) => {
            creds.license_key = license.license_key.clone();
            creds.issued_at = Utc::now();
            creds
        }
        None => IssuedCredentials {
            booth_id: booth_id.to_string(),
            booth_name: None,
            fingerprint_short: None,
            license_key: license.license_key.clone(),
            cloud_sync: None,
            issued_at: Utc::now(),
        },
    };
    credentials
        .save(&updated)
        .await
        .context("保存新许可证失败")?;

    println!("✓ 展台 {} 的许可证已重新生成，旧许可证已失效", booth_id);
    println!("  许可证: {}", license.license_key);
    if let Some(message) = &license.message {
        println!("  {}", message);
    }
    Ok(())
}
