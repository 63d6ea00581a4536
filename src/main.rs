use chrono::Utc;
use clap::Parser;
use placeholder_etl::config::LogFormat;
use placeholder_etl::core::{ConfigProvider, RunContext};
use placeholder_etl::utils::error::{ErrorSeverity, EtlError};
use placeholder_etl::utils::{logger, validation::Validate};
use placeholder_etl::{
    CancelFlag, CliConfig, EtlEngine, LocalStorage, PlaceholderPipeline, RunSummary, Stage,
    TomlConfig,
};

async fn run_pipeline<C: ConfigProvider>(
    config: C,
    stage: Stage,
    run: &RunContext,
    monitor_enabled: bool,
    cancel: CancelFlag,
) -> Result<RunSummary, EtlError> {
    let storage = LocalStorage::new(config.output_path());
    tracing::info!("📁 Output directory: {}", storage.base_path().display());

    let pipeline = PlaceholderPipeline::new(storage, config).with_cancel_flag(cancel);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);
    engine.run(stage, run).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("Starting placeholder-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = cli.validate() {
        fail(&e);
    }

    let toml = match &cli.config {
        Some(path) => {
            tracing::info!("📄 Loading configuration from {}", path);
            match TomlConfig::from_file(path).and_then(|config| {
                config.validate()?;
                Ok(config)
            }) {
                Ok(config) => Some(config),
                Err(e) => fail(&e),
            }
        }
        None => None,
    };

    let monitor_enabled = cli.monitor || toml.as_ref().is_some_and(TomlConfig::monitoring_enabled);
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let mut run = RunContext::new(Utc::now());
    if let Some(date) = &cli.date {
        run = run.with_partition(date.clone());
    }

    let cancel = CancelFlag::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("⏹️ Interrupt received; finishing the current records");
            ctrl_c.cancel();
        }
    });

    let stage = cli.stage;
    let result = match toml {
        Some(config) => run_pipeline(config, stage, &run, monitor_enabled, cancel).await,
        None => run_pipeline(cli, stage, &run, monitor_enabled, cancel).await,
    };

    match result {
        Ok(summary) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Err(e) => fail(&e),
    }

    Ok(())
}

fn fail(e: &EtlError) -> ! {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
