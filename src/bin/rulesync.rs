//! rulesync 命令行入口

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rulesync::{
    FmcClient, ReconcileMode, RemoteOptions, RuleSet, SettleStrategy, SyncConfig, SyncOutcome, Synchronizer,
    FMC_GLOBAL_DOMAIN,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rulesync", version, about = "Keep a remote access policy in sync with an ordered rule set")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 校验规则集文件（不访问远端）
    Validate {
        plan: PathBuf,
    },
    /// 使远端与规则集一致，输出新状态
    Sync {
        #[command(flatten)]
        remote: RemoteArgs,
        plan: PathBuf,
        /// 上一次输出的状态文件
        #[arg(long)]
        state: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 读取远端并刷新状态文件
    Read {
        #[command(flatten)]
        remote: RemoteArgs,
        state: PathBuf,
        /// 接收状态中未声明的字段
        #[arg(long)]
        full: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 按名称接管远端已有的规则
    Adopt {
        #[command(flatten)]
        remote: RemoteArgs,
        plan: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RemoteArgs {
    #[arg(long, env = "RULESYNC_BASE_URL")]
    base_url: String,
    #[arg(long, env = "RULESYNC_TOKEN", hide_env_values = true)]
    token: String,
    #[arg(long, env = "RULESYNC_DOMAIN", default_value = FMC_GLOBAL_DOMAIN)]
    domain: String,
    /// HTTP 超时（秒）
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    #[arg(long, default_value_t = 1000)]
    bulk_size: usize,
    /// 批量删除后的等待时长（秒）
    #[arg(long, default_value_t = 3)]
    settle: u64,
}

impl RemoteArgs {
    fn synchronizer(&self) -> Result<Synchronizer> {
        let mut options = RemoteOptions::new(self.base_url.clone(), self.token.clone());
        options.domain = self.domain.clone();
        options.timeout = Duration::from_secs(self.timeout);

        let config = SyncConfig::builder()
            .bulk_size_create(self.bulk_size)
            .bulk_size_delete(self.bulk_size)
            .settle(SettleStrategy::FixedDelay(Duration::from_secs(self.settle)))
            .remote_options(options.clone())
            .build();
        let client = FmcClient::new(&options).context("failed to build the HTTP client")?;
        Ok(Synchronizer::new(Arc::new(client), config)?)
    }
}

async fn load(path: &Path) -> Result<RuleSet> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

async fn store(state: &RuleSet, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    match out {
        Some(path) => tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

/// 部分状态总是先落盘，再报告错误
async fn finish(outcome: SyncOutcome, out: Option<&Path>) -> Result<()> {
    store(&outcome.state, out).await?;
    match outcome.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { plan } => {
            let plan = load(&plan).await?;
            rulesync::RankValidator::validate_rule_set(&plan)?;
            println!("OK: {} rule(s)", plan.rules.len());
            Ok(())
        }
        Command::Sync {
            remote,
            plan,
            state,
            out,
        } => {
            let sync = remote.synchronizer()?;
            let plan = load(&plan).await?;
            let current = match state {
                Some(path) => Some(load(&path).await?),
                None => None,
            };
            let outcome = sync.synchronize(&plan, current.as_ref()).await;
            finish(outcome, out.as_deref()).await
        }
        Command::Read {
            remote,
            state,
            full,
            out,
        } => {
            let sync = remote.synchronizer()?;
            let state = load(&state).await?;
            let mode = if full { ReconcileMode::Full } else { ReconcileMode::Partial };
            let outcome = sync.read(&state, mode).await;
            finish(outcome, out.as_deref()).await
        }
        Command::Adopt { remote, plan, out } => {
            let sync = remote.synchronizer()?;
            let plan = load(&plan).await?;
            let outcome = sync.adopt(&plan).await;
            finish(outcome, out.as_deref()).await
        }
    }
}
