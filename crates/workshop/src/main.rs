use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use utils::version;
use workshop::app::{run_comparison, Simulation, SimulationReport, SCENARIOS};
use workshop::config::{Cli, Commands, CompareArgs, RunArgs, SimulationConfig};
use workshop::infrastructure::{EventFormat, EVENTS_TARGET};
use workshop::logging;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = logging::init();
    tracing::info!("Starting workshop {}", &**version::VERSION);

    let command = async {
        match cli.command {
            Commands::Run(run_args) => run_simulation(*run_args).await,
            Commands::Compare(compare_args) => run_compare(compare_args).await,
        }
    };

    tokio::select! {
        result = command => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("install Ctrl+C handler failed")?;
            tracing::info!("Received Ctrl+C, abandoning the simulation");
            Ok(())
        }
    }
}

async fn run_simulation(run_args: RunArgs) -> Result<()> {
    let config = SimulationConfig::try_from(&run_args).context("invalid configuration")?;
    let format = config.event_format;
    let report = Simulation::new(config)
        .context("build workshop failed")?
        .run()
        .await
        .context("simulation failed")?;
    print_report(format, "run", &report);
    Ok(())
}

async fn run_compare(compare_args: CompareArgs) -> Result<()> {
    let outcomes = run_comparison(&SCENARIOS, &compare_args.common)
        .await
        .context("comparison failed")?;
    for outcome in &outcomes {
        let label = format!(
            "{} ({} bays, {} mechanics)",
            outcome.scenario.name, outcome.scenario.bays, outcome.scenario.mechanics
        );
        print_report(compare_args.common.event_format, &label, &outcome.report);
    }
    Ok(())
}

fn print_report(format: EventFormat, label: &str, report: &SimulationReport) {
    let line = match format {
        EventFormat::Text => format!(
            "{label}: {} vehicles in {:?}",
            report.vehicles, report.elapsed
        ),
        EventFormat::Json => serde_json::json!({ "label": label, "report": report }).to_string(),
    };
    tracing::info!(target: EVENTS_TARGET, "{}", line);
}
