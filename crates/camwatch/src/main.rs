mod cli;
mod error;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use camwatch_core::{ActuatorNotifier, HttpConnector, Multiplexer, WatchConfig};

use crate::cli::{Cli, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let watch = camwatch_config::load_watch_config(cli.config.as_deref())?;

    if cli.check {
        print_roster(&watch);
        return Ok(());
    }

    let connector = HttpConnector::new(&watch.timing)?;
    let notifier = ActuatorNotifier::new(&watch.timing)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(cancel.clone()));

    Multiplexer::new(watch, connector, notifier).run(cancel).await;
    Ok(())
}

async fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt received, shutting down"),
        Err(e) => {
            // Without a signal handler the process only stops when killed.
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            return;
        }
    }
    cancel.cancel();
}

fn print_roster(watch: &WatchConfig) {
    println!("{} camera(s) configured", watch.cameras.len());
    for camera in &watch.cameras {
        println!(
            "  {name}: {host}:{port} [{events}] -> vera {vhost}:{vport} device {device}",
            name = camera.name,
            host = camera.host,
            port = camera.port,
            events = camera.events,
            vhost = camera.actuator.host,
            vport = camera.actuator.port,
            device = camera.actuator.device_id,
        );
    }
}
