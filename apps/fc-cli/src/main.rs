use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};

use device_manager as dm;
use dm::{DeviceSink, DeviceStore};

#[derive(Parser, Debug)]
#[command(
    name = "fc",
    version,
    about = "Fermentation controller device manager",
    disable_help_subcommand = true
)]
struct Cli {
    /// Slot table file
    #[arg(long, global = true, default_value = "fc-devices.yaml")]
    store: PathBuf,

    /// Board description YAML; overrides --preset
    #[arg(long, global = true)]
    board: Option<PathBuf>,

    /// Built-in board preset
    #[arg(long, global = true, default_value = "rev-c")]
    preset: String,

    /// Manager settings YAML
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hardware backend
    #[arg(long, global = true, value_enum, default_value_t = Backend::Mock)]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Sysfs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the single-wire buses the board exposes
    Buses,
    /// List device slots
    List {
        /// Only this slot
        #[arg(long)]
        slot: Option<usize>,
        /// Include empty slots
        #[arg(long, action = ArgAction::SetTrue)]
        all: bool,
        /// Attach live sensor readings
        #[arg(long, action = ArgAction::SetTrue)]
        read: bool,
    },
    /// Apply a device definition, e.g. '{"i":0,"c":1,"b":1,"f":9,"h":2,"p":4,"a":"28AABBCCDDEEFF00"}'
    Update {
        json: String,
    },
    /// Enumerate attached hardware
    Scan {
        /// Hardware kind code (1 pin, 2 probe, 3 switch)
        #[arg(long)]
        hardware: Option<u8>,
        #[arg(long)]
        pin: Option<u8>,
        /// Only hardware usable for this function code
        #[arg(long)]
        function: Option<u8>,
        /// Take a reading from each probe
        #[arg(long, action = ArgAction::SetTrue)]
        values: bool,
        /// Skip hardware already assigned to a slot
        #[arg(long, action = ArgAction::SetTrue)]
        unused: bool,
    },
    /// Serve the line protocol (U, d, h commands) on stdin/stdout
    Serve,
    /// Clear every slot
    Reset,
    /// Install configured devices and print Prometheus metrics
    Metrics,
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let hub = dm::MetricsHub::new().context("metrics init")?;
    let mut manager = open_manager(&cli, &hub)?;

    match cli.command {
        Commands::Buses => {
            for bus in manager.board().bus_info() {
                println!("{}\t{}", bus.pin, bus.driver);
            }
            Ok(())
        }
        Commands::List { slot, all, read } => {
            let query = dm::DisplayQuery {
                slot,
                read,
                write: None,
                include_empty: all,
            };
            respond(|sink| manager.list_devices(&query, sink).map(|_| ()))
        }
        Commands::Update { json } => {
            let pairs = dm::request_pairs(&json).context("parsing device definition")?;
            let outcome = manager.update_device(&dm::DeviceUpdate::from_pairs(pairs))?;
            if let Some(rejection) = &outcome.rejection {
                eprintln!("rejected: {rejection}");
            }
            respond(|sink| emit_outcome(&outcome, sink))
        }
        Commands::Scan {
            hardware,
            pin,
            function,
            values,
            unused,
        } => {
            let query = dm::HardwareQuery {
                hardware: hardware.and_then(dm::DeviceHardware::from_code),
                pin,
                values,
                unused_only: unused,
                function: function
                    .and_then(dm::DeviceFunction::from_code)
                    .filter(|f| *f != dm::DeviceFunction::None),
            };
            respond(|sink| manager.enumerate_devices(&query, sink).map(|_| ()))
        }
        Commands::Serve => serve(&mut manager),
        Commands::Reset => {
            manager.reset_store().context("clearing slot table")?;
            info!("slot table cleared");
            Ok(())
        }
        Commands::Metrics => {
            print!("{}", hub.encode_text());
            Ok(())
        }
    }
}

fn setup_tracing() {
    // Best-effort; stdout carries protocol output, so logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn open_manager(cli: &Cli, hub: &dm::MetricsHub) -> Result<dm::DeviceManager<dm::FileStore>> {
    let board_config = match &cli.board {
        Some(path) => dm::load_board_file(path)
            .with_context(|| format!("loading board file {}", path.display()))?,
        None => dm::BoardConfig::preset(&cli.preset)
            .ok_or_else(|| anyhow::anyhow!("unknown board preset: {}", cli.preset))?,
    };
    let board = match cli.backend {
        Backend::Mock => dm::Board::mock(board_config).context("building mock board")?,
        Backend::Sysfs => dm::Board::sysfs(board_config),
    };
    let store = dm::FileStore::open(&cli.store)
        .with_context(|| format!("opening slot table {}", cli.store.display()))?;
    let settings = match &cli.config {
        Some(path) => dm::load_manager_config(path)
            .with_context(|| format!("loading manager settings {}", path.display()))?,
        None => dm::ManagerConfig::default(),
    };
    info!(
        board = %board.config().name,
        store = %store.path().display(),
        "device manager ready"
    );
    let mut manager = dm::DeviceManager::with_config(board, store, settings).with_metrics(hub);
    manager.install_configured_devices();
    Ok(manager)
}

fn emit_outcome(outcome: &dm::UpdateOutcome, sink: &mut dyn DeviceSink) -> dm::Result<()> {
    sink.emit(&dm::DeviceRecord {
        slot: Some(outcome.slot),
        config: outcome.config,
        value: None,
    })
}

/// Run `f` against a stdout writer framed as one response.
fn respond(f: impl FnOnce(&mut dyn DeviceSink) -> dm::Result<()>) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = dm::DeviceWriter::new(stdout.lock());
    writer.open()?;
    f(&mut writer)?;
    writer.close()?;
    Ok(())
}

fn serve<S: DeviceStore>(manager: &mut dm::DeviceManager<S>) -> Result<()> {
    let stdin = io::stdin();
    info!("serving line protocol on stdin");
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let command = match dm::parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                error!("bad request: {e}");
                continue;
            }
        };
        let result = match command {
            dm::Command::Update(update) => match manager.update_device(&update) {
                Ok(outcome) => respond(|sink| emit_outcome(&outcome, sink)),
                Err(e) => Err(e.into()),
            },
            dm::Command::List(query) => respond(|sink| manager.list_devices(&query, sink).map(|_| ())),
            dm::Command::Enumerate(query) => {
                respond(|sink| manager.enumerate_devices(&query, sink).map(|_| ()))
            }
        };
        if let Err(e) = result {
            error!("request failed: {e:#}");
        }
    }
    io::stdout().flush()?;
    Ok(())
}
