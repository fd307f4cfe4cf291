// vim: tw=80
//! Inspect and reset the devices of a dm-zoned composite

use std::{io, path::PathBuf, process::exit};

use clap::{crate_version, ArgAction, Parser};
use dmz_core::{CompositeDevice, Config, Operation, Result, SafetyGuard};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone, Debug)]
/// Print the geometry of one or more devices, as a single composite
struct Info {
    /// Zone size in 512-byte sectors.  Required if no device is zoned.
    #[clap(long)]
    zone_size: Option<u64>,
    /// Print the zone table too
    #[clap(long)]
    zones:     bool,
    #[clap(required(true))]
    devices:   Vec<PathBuf>,
}

impl Info {
    fn main(self, config: Config) -> Result<()> {
        let config = config.zone_sectors(self.zone_size);
        let dev = CompositeDevice::open(&self.devices, Operation::Check,
                                        &config)?;
        for bd in dev.backends() {
            println!("{bd}");
        }
        println!("{dev}");
        if self.zones {
            for z in dev.zones() {
                println!("{}", z.display(dev.backends()[z.backend].name()));
            }
        }
        Ok(())
    }
}

#[derive(Parser, Clone, Debug)]
/// Print the name of whatever holds a device open, if anything
struct Holder {
    device: PathBuf,
}

impl Holder {
    fn main(self, config: Config) -> Result<()> {
        if let Some(holder) = SafetyGuard::new(&config).holder_of(&self.device)?
        {
            println!("{holder}");
        }
        Ok(())
    }
}

#[derive(Parser, Clone, Debug)]
/// Reset the write pointer of every zone.  Destroys all data.
struct ResetZones {
    /// Proceed even if the devices contain a filesystem or partition table
    #[clap(short, long)]
    force:     bool,
    /// Zone size in 512-byte sectors.  Required if no device is zoned.
    #[clap(long)]
    zone_size: Option<u64>,
    #[clap(required(true))]
    devices:   Vec<PathBuf>,
}

impl ResetZones {
    fn main(self, config: Config) -> Result<()> {
        let config = config.force(self.force).zone_sectors(self.zone_size);
        let mut dev = CompositeDevice::open(&self.devices,
                                            Operation::ResetZones, &config)?;
        dev.reset_zones()?;
        dev.sync()?;
        dev.close();
        Ok(())
    }
}

#[derive(Parser, Clone, Debug)]
enum SubCommand {
    Holder(Holder),
    Info(Info),
    ResetZones(ResetZones),
}

#[derive(Parser, Clone, Debug)]
#[clap(version = crate_version!())]
struct Cli {
    /// Increase verbosity.  May be repeated.
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[clap(subcommand)]
    cmd:     SubCommand,
}

fn main() {
    let cli: Cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    debug!("{:?}", cli.cmd);

    let config = Config::default();
    let r = match cli.cmd {
        SubCommand::Holder(holder) => holder.main(config),
        SubCommand::Info(info) => info.main(config),
        SubCommand::ResetZones(reset) => reset.main(config),
    };
    if let Err(e) = r {
        eprintln!("{e}");
        exit(1);
    }
}
