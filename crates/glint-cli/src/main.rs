//! Glint - light-show choreography from the command line

use clap::Parser;
use colored::Colorize;
use futures::StreamExt;
use tracing::debug;

mod commands;
mod render;
mod setup;

use commands::Cli;
use render::Printer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = glint_config::load_or_default(cli.config.as_deref())?;
    if let Err(e) = glint_telemetry::init_subscriber(&config.telemetry) {
        eprintln!("{}: {}", "Logging disabled".yellow(), e);
    }
    setup::apply_overrides(&mut config, &cli)?;

    let collaborators = setup::collaborators(cli.balls, cli.analysis.as_deref())?;
    let coordinator = setup::coordinator(&config, collaborators)?;
    let mut events = coordinator
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("event stream already taken"))?;

    let request = setup::build_request(cli.prompt_text(), &config.engine, cli.song.as_deref());
    debug!(request_id = %request.id, "Submitting request");
    if !coordinator.submit(request) {
        // The rejection reason is already queued as an event
        if let Some(event) = events.try_next() {
            Printer::new(cli.json).print(&event);
        }
        anyhow::bail!("request was not accepted");
    }

    let mut printer = Printer::new(cli.json);
    let mut failed = false;
    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                printer.print(&event);
                if event.is_terminal() {
                    failed = matches!(event, glint_agent::EngineEvent::Error { .. });
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                coordinator.interrupt().await;
                // Interrupted is already in the channel
                while let Some(event) = events.try_next() {
                    printer.print(&event);
                }
                break;
            }
        }
    }
    coordinator.wait_idle().await;

    let usage = coordinator.usage();
    debug!(
        tokens = usage.totals.total_tokens,
        cost = usage.totals.total_cost,
        "Session usage"
    );

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
