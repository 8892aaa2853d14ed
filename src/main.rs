use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;

use fleet_scheduler::domain::simulator::simulator::{Simulator, SystemSimulator};
use fleet_scheduler::domain::utils::statistics;
use fleet_scheduler::{build_overseer, load_config, load_world, logger};

/// Runs the batch scheduler against a simulated fleet.
#[derive(Parser, Debug)]
#[command(name = "fleet-scheduler", version, about)]
struct Cli {
    /// World description (nodes, jobs, targets) as JSON.
    #[arg(long)]
    world: PathBuf,

    /// Scheduler and batch configuration as JSON. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of driver ticks to run after the preparation round.
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// Write statistic rows to this CSV file.
    #[arg(long)]
    stats: Option<String>,

    /// Write analytics events to this file.
    #[arg(long)]
    analytics: Option<PathBuf>,

    /// 0 prints only the totals, 1 adds a line per node.
    #[arg(long, default_value_t = 1)]
    summary_depth: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logger::init();
    let _analytics_guard = match &cli.analytics {
        Some(path) => Some(logger::init_analytics(path).context("could not set up the analytics log")?),
        None => None,
    };

    if let Some(stats) = &cli.stats {
        statistics::init_global(Some(stats.clone())).with_context(|| format!("could not open statistics file {}", stats))?;
    }

    let world = load_world(&cli.world).with_context(|| format!("could not load world {}", cli.world.display()))?;
    let config = load_config(cli.config.as_ref()).context("could not load configuration")?;
    let simulator: Arc<dyn SystemSimulator> = Arc::new(Simulator::new(config.simulator.clone()));

    let mut overseer = build_overseer(&world, config, simulator)?;
    println!("{}", "Fleet discovered".bold());
    print!("{}", overseer.manager().summary(cli.summary_depth));

    let prepared = overseer.prepare()?;
    println!("{} {} power", "Preparation delivered".green(), prepared);

    let reports = overseer.run(cli.ticks).await?;
    let assigned: usize = reports.iter().map(|report| report.assigned).sum();
    let deferred: usize = reports.iter().map(|report| report.deferred).sum();
    let delivered: i64 = reports.iter().map(|report| report.power_delivered).sum();

    println!(
        "{} {} ticks, {} batches assigned, {} deferred, {} power delivered",
        "Finished".green().bold(),
        reports.len(),
        assigned,
        if deferred > 0 { deferred.to_string().yellow() } else { deferred.to_string().normal() },
        delivered
    );
    print!("{}", overseer.manager().summary(cli.summary_depth));
    print!("{}", overseer.manager().profiler().report().dimmed());

    statistics::shutdown_global();
    Ok(())
}
