use anyhow::Context;
use clap::Parser;
use dispatch_reports::{
    CliArgs, Command, EngineConfig, LoggingConfig, ReportEngine, ReportRequest, init_logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging(LoggingConfig::from_env())?;

    let cli = CliArgs::parse();
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(timeout_ms) = cli.lock_timeout_ms {
        config.locks.timeout_ms = timeout_ms;
    }
    let engine = ReportEngine::new(config);

    match cli.command {
        Command::Generate(args) => {
            let request = ReportRequest::from_args(args)?;
            let summary = engine.run(request).await.context("report generation failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::CheckPaxTemplate { template } => {
            let missing = engine.check_pax_template(&template)?;
            println!("{}", serde_json::to_string_pretty(&missing)?);
            if !missing.is_empty() {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}
