use boothfleet_activation::ClientConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BoothFleet 展台激活控制台
#[derive(Debug, Parser)]
#[command(name = "boothfleet", version, about)]
pub struct Cli {
    /// 后端 API 地址（覆盖 BOOTHFLEET_API_URL）
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// 本地数据目录（覆盖 BOOTHFLEET_DATA_DIR）
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 扫码激活展台（默认）
    Activate {
        /// 预选展台，扫码后跳过展台选择
        #[arg(long)]
        booth: Option<String>,
    },
    /// 许可证丢失时重新生成，旧许可证随即失效
    Regenerate {
        #[arg(long)]
        booth: String,
    },
}

impl Cli {
    /// 环境变量配置叠加命令行参数
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(url) = &self.api_url {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        config
    }

    pub fn command(&self) -> Command {
        match &self.command {
            Some(Command::Activate { booth }) => Command::Activate {
                booth: booth.clone(),
            },
            Some(Command::Regenerate { booth }) => Command::Regenerate {
                booth: booth.clone(),
            },
            None => Command::Activate { booth: None },
        }
    }
}
