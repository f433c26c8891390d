use clap::Parser;
use cos_sync::cli::{Cli, RunConfig};
use cos_sync::config::AppConfig;
use cos_sync::logging::{LogConfig, SizeRotatingWriter};
use cos_sync::{Direction, ObjectStore, OpendalStore, SyncEngine, SyncReport};
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

/// 初始化日志系统
fn init_logging(config: &LogConfig) {
    if !config.enabled {
        // 日志已禁用，只初始化一个空的 subscriber
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    // RUST_LOG 优先，其次是配置的级别
    let mut env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(config.tracing_level().into())
        .from_env_lossy();
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse::<tracing_subscriber::filter::Directive>() {
            env_filter = env_filter.add_directive(d);
        }
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let file_layer = config.file.as_ref().and_then(|path| {
        match SizeRotatingWriter::new(path, config.max_size_mb) {
            Ok(writer) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false),
            ),
            Err(e) => {
                eprintln!("无法打开日志文件 {}: {}", path.display(), e);
                None
            }
        }
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 创建存储客户端，凭证只在这里使用
fn create_store(run: &RunConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let options = run.app.remote.store_options();
    let bucket = &run.sync.bucket;

    if let Some(root) = &run.emulate_root {
        return Ok(Arc::new(OpendalStore::emulated(root, bucket, &options)?));
    }

    let creds = run
        .credentials
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("secret_id and secret_key are required"))?;
    Ok(Arc::new(OpendalStore::cos(
        bucket,
        &creds.secret_id,
        &creds.secret_key,
        &options,
    )?))
}

/// 写入 GitHub Action 输出 `path`
fn write_action_output(report: &SyncReport) -> anyhow::Result<()> {
    let Some(path) = std::env::var_os("GITHUB_OUTPUT") else {
        return Ok(());
    };
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "path={}", report.locations_joined())?;
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<SyncReport> {
    let app = AppConfig::load(cli.config.as_deref())?;
    let cwd = std::env::current_dir()?;
    let run = cli.into_run_config(app, &cwd)?;

    init_logging(&run.app.log);

    let store = create_store(&run)?;
    let engine = SyncEngine::new(run.sync, store);
    let report = engine.run(None).await?;

    let cleaned = if report.files_cleaned > 0 {
        format!(", cleaned {} files", report.files_cleaned)
    } else {
        String::new()
    };
    tracing::info!(
        "{}ed {} files{}",
        report.direction,
        report.files_transferred,
        cleaned
    );

    if report.direction == Direction::Upload {
        tracing::info!(">> {}", report.locations_joined());
        write_action_output(&report)?;
    }

    Ok(report)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let direction = cli.direction;

    if let Err(e) = run(cli).await {
        eprintln!("::error::fail to {} files to cos: {:#}", direction, e);
        std::process::exit(1);
    }
}
