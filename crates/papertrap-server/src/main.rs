// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// papertrap — virtual IPP printer.
//
// Entry point. Initialises logging, then maps the small command surface
// onto the administrative API of `PrinterService`.

use std::path::PathBuf;
use std::process::ExitCode;

use papertrap_core::config::ServerConfig;
use papertrap_server::service::PrinterService;
use tracing::{error, info};

const USAGE: &str = "\
papertrap — virtual IPP printer

USAGE:
    papertrap serve [--port N] [--name NAME] [--job-dir DIR] [--config-dir DIR]
                    [--no-advertise] [--plugin ID]...
    papertrap set-printer-name <NAME> [--config-dir DIR]
    papertrap import-attributes <PATH> [--config-dir DIR] [--job-dir DIR]
    papertrap configure-plugin <ID> <JSON> [--config-dir DIR] [--job-dir DIR]
    papertrap clear-jobs [--job-dir DIR]
";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// Flags shared by every subcommand.
struct CommonArgs {
    config: ServerConfig,
    plugins: Vec<String>,
    positional: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<CommonArgs, String> {
    let mut config = ServerConfig::default();
    let mut plugins = Vec::new();
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--port" => {
                config.port = value_for("--port")?
                    .parse()
                    .map_err(|e| format!("invalid --port: {e}"))?;
            }
            "--name" => config.printer_name = value_for("--name")?,
            "--job-dir" => config.job_dir = PathBuf::from(value_for("--job-dir")?),
            "--config-dir" => config.config_dir = PathBuf::from(value_for("--config-dir")?),
            "--no-advertise" => config.advertise = false,
            "--plugin" => plugins.push(value_for("--plugin")?),
            flag if flag.starts_with("--") => return Err(format!("unknown flag: {flag}")),
            value => positional.push(value.to_string()),
        }
    }

    Ok(CommonArgs {
        config,
        plugins,
        positional,
    })
}

async fn run(args: Vec<String>) -> papertrap_core::error::Result<()> {
    let Some((command, rest)) = args.split_first() else {
        eprint!("{USAGE}");
        return Err(papertrap_core::PapertrapError::Server("no command given".into()));
    };
    let parsed = parse_args(rest)
        .map_err(|e| papertrap_core::PapertrapError::Server(format!("{e}\n{USAGE}")))?;

    match command.as_str() {
        "serve" => serve(parsed).await,
        "set-printer-name" => {
            let name = expect_positional(&parsed, 0, "printer name")?;
            let service = PrinterService::init(parsed.config.clone()).await?;
            service.set_printer_name(&name).await
        }
        "import-attributes" => {
            let path = expect_positional(&parsed, 0, "attributes path")?;
            let service = PrinterService::init(parsed.config.clone()).await?;
            service.import_attributes(std::path::Path::new(&path)).await
        }
        "configure-plugin" => {
            let id = expect_positional(&parsed, 0, "plugin id")?;
            let json = expect_positional(&parsed, 1, "configuration JSON")?;
            let service = PrinterService::init(parsed.config.clone()).await?;
            service.configure_plugin(&id, &json).await
        }
        "clear-jobs" => {
            let service = PrinterService::init(parsed.config.clone()).await?;
            let removed = service.clear_jobs().await?;
            info!(removed, "jobs cleared");
            Ok(())
        }
        other => {
            eprint!("{USAGE}");
            Err(papertrap_core::PapertrapError::Server(format!(
                "unknown command: {other}"
            )))
        }
    }
}

fn expect_positional(
    parsed: &CommonArgs,
    index: usize,
    what: &str,
) -> papertrap_core::error::Result<String> {
    parsed
        .positional
        .get(index)
        .cloned()
        .ok_or_else(|| papertrap_core::PapertrapError::Server(format!("missing {what}\n{USAGE}")))
}

async fn serve(parsed: CommonArgs) -> papertrap_core::error::Result<()> {
    let mut service = PrinterService::init(parsed.config).await?;

    for plugin in &parsed.plugins {
        service.load_plugin(plugin).await?;
    }

    service.start().await?;
    info!("papertrap running; Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| papertrap_core::PapertrapError::Server(format!("signal: {e}")))?;

    service.stop().await?;
    Ok(())
}
