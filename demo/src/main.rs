//! stopgrid: run agents over a tile board and print what they do.

mod script;
mod settings;

use std::path::PathBuf;

use anyhow::{Result, ensure};
use clap::Parser;
use log::info;
use stopgrid_sim::{EventKind, MAX_SIDE, Simulation};

use script::{Cell, Step};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with simulation settings.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Board side; drawn from the configured bounds when omitted.
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=MAX_SIDE as i64))]
    side: Option<i32>,

    /// Number of agents; drawn from the configured bounds when omitted.
    #[arg(short, long)]
    agents: Option<usize>,

    /// Ticks to run.
    #[arg(short, long, default_value_t = 100)]
    ticks: u64,

    /// Print the board every N ticks (0 prints only the final board).
    #[arg(long, value_name = "N", default_value_t = 10)]
    every: u64,

    /// RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Start with 8-directional movement.
    #[arg(long)]
    diagonal: bool,

    /// Start in seek mode.
    #[arg(long)]
    seek: bool,

    /// Mark a stop tile before the run.
    #[arg(long = "stop", value_name = "X,Y")]
    stops: Vec<Cell>,

    /// Scheduled change, `TICK:ACTION[:ARG]` with ACTION one of block,
    /// unblock, stop (X,Y) or diagonal, seek (on|off).
    #[arg(short, long = "event", value_name = "STEP")]
    events: Vec<Step>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => settings::from_file(path)?,
        None => Default::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.diagonal |= args.diagonal;
    config.seek_mode |= args.seek;

    let mut sim = match args.side {
        Some(side) => Simulation::with_side(side, config)?,
        None => Simulation::new(config)?,
    };
    for Cell(p) in &args.stops {
        let tile = sim
            .grid()
            .id_of(*p)
            .ok_or_else(|| anyhow::anyhow!("stop {p} is outside the board"))?;
        sim.toggle_stop(tile)?;
    }
    let placed = match args.agents {
        Some(n) => sim.populate(n),
        None => sim.populate_random(),
    };
    sim.observe(EventKind::TileClaimed, |e| info!("{e}"));

    let mut script = args.events.clone();
    script.sort_by_key(|s| s.tick);
    let mut pending = script.iter().peekable();

    println!(
        "{0}x{0} board, {1} agents\n{2}",
        sim.grid().side(),
        placed.len(),
        sim.snapshot()
    );
    for tick in 0..args.ticks {
        while let Some(step) = pending.next_if(|s| s.tick <= tick) {
            step.apply(&mut sim)?;
        }
        sim.step_movers();
        let report = sim.tick();
        ensure!(sim.check_claims(), "claim bookkeeping broke at tick {tick}");
        log::debug!("{report:?}");
        if args.every > 0 && (tick + 1) % args.every == 0 {
            println!("tick {}\n{}", tick + 1, sim.snapshot());
        }
    }

    let holding = sim.agents().iter().filter(|a| a.is_holding()).count();
    println!(
        "after {} ticks: {holding}/{} agents holding a stop\n{}",
        sim.tick_count(),
        sim.agents().len(),
        sim.snapshot()
    );
    Ok(())
}
