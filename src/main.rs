use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::{fs::File, path::PathBuf, time::Duration};
use time::UtcOffset;
use zio_ctl::{
    available_triggers, AttrOwner, Conf, ControlDescription, ControlForm, LogSettings, Monitor,
    Session,
};

#[derive(Parser, Debug)]
#[command(name = "zio-ctl", version, about = "Inspect and edit ZIO control blocks")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "zio-ctl.toml")]
    config: PathBuf,

    /// Control file (device node or sysfs file)
    #[arg(short = 'f', long)]
    control: Option<PathBuf>,

    /// sysfs directory of the device, for attribute names
    #[arg(short, long)]
    sysfs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current control
    Show {
        /// List every editable field
        #[arg(long)]
        fields: bool,
    },
    /// Edit fields (name=value) and write the control back
    Set {
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
        /// Write even if the device would reject the control
        #[arg(long)]
        force: bool,
        /// Print the resulting control without writing it
        #[arg(long)]
        dry_run: bool,
    },
    /// List the attributes described by the device
    Describe,
    /// List the triggers the kernel offers
    Triggers,
    /// Follow a control device and report every block
    Monitor {
        /// Stop after this many blocks
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Stop after this many seconds
        #[arg(short = 't', long)]
        seconds: Option<u64>,
    },
    /// Print a commented configuration file
    Template,
}

fn parse_assignment(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got {arg:?}"))
}

fn init_logging(settings: &LogSettings) -> Result<()> {
    let level = LevelFilter::from(settings.level);
    let config = ConfigBuilder::new()
        .set_time_offset(UtcOffset::UTC)
        .set_time_format_rfc3339()
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = &settings.file {
        let file = File::create(path)
            .with_context(|| format!("creating log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level, config, file));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

fn print_fields(form: &ControlForm, desc: &ControlDescription) {
    for (name, value) in form.iter() {
        match slot_label(name, desc) {
            Some(label) if !value.is_empty() => println!("{name:<20} {value:<12} # {label}"),
            _ => println!("{name:<20} {value}"),
        }
    }
}

/// Label for `channel.std.3`-style names.
fn slot_label(name: &str, desc: &ControlDescription) -> Option<String> {
    let mut parts = name.split('.');
    let owner = match parts.next()? {
        "channel" => AttrOwner::Channel,
        "trigger" => AttrOwner::Trigger,
        _ => return None,
    };
    let extended = match parts.next()? {
        "std" => false,
        "ext" => true,
        _ => return None,
    };
    let index = parts.next()?.parse().ok()?;
    Some(desc.label(owner, extended, index))
}

fn run(cli: Cli, conf: Conf) -> Result<()> {
    let control = cli.control.or(conf.device.control.clone());
    let sysfs_dir = cli.sysfs_dir.or(conf.device.sysfs_dir.clone());
    let session = || -> Result<Session> {
        let path = control
            .clone()
            .ok_or_else(|| anyhow!("no control file given (use --control or the config file)"))?;
        Ok(Session::open(path, sysfs_dir.clone())?)
    };

    match cli.command {
        Command::Show { fields } => {
            let session = session()?;
            let ctrl = session.read()?;
            print!("{ctrl}");
            if fields {
                print_fields(&ControlForm::from_block(&ctrl), session.description());
            }
        }
        Command::Set {
            assignments,
            force,
            dry_run,
        } => {
            let session = session()?;
            let current = session.read()?;
            let mut form = ControlForm::from_block(&current);
            for (name, value) in &assignments {
                form.set(name, value)?;
            }
            let ctrl = form.apply(&current);
            if conf.device.check_before_write && !force {
                ctrl.check_against(&current)?;
            }
            if dry_run {
                print!("{ctrl}");
                return Ok(());
            }
            session.write(&ctrl)?;
            let now = session.read()?;
            if now != ctrl {
                info!("device adjusted the control after write");
            }
            print!("{now}");
        }
        Command::Describe => {
            let session = session()?;
            if session.sysfs_dir().is_none() {
                bail!("describe needs the device sysfs directory (--sysfs-dir)");
            }
            for attr in session.description().attrs() {
                println!(
                    "{:>2} {} {}{} {:<8} {}",
                    attr.index,
                    if attr.is_extended { 'e' } else { 's' },
                    if attr.is_readable { 'r' } else { '-' },
                    if attr.is_writable { 'w' } else { '-' },
                    match attr.owner() {
                        AttrOwner::Channel => "channel",
                        AttrOwner::Trigger => "trigger",
                    },
                    attr.fullpath
                );
            }
        }
        Command::Triggers => {
            for name in available_triggers(&conf.device.available_triggers)? {
                println!("{name}");
            }
        }
        Command::Monitor { count, seconds } => {
            let path = control
                .clone()
                .ok_or_else(|| anyhow!("no control file given"))?;
            let mut monitor = Monitor::new(path);
            monitor.max_blocks = count;
            monitor.duration = seconds.map(Duration::from_secs);
            let counter = monitor.run(|ctrl, _| println!("{ctrl}"))?;
            info!(
                "{} blocks in {:.1} s, {} lost",
                counter.n_blocks,
                counter.t_begin.elapsed().as_secs_f64(),
                counter.lost
            );
        }
        Command::Template => print!("{}", Conf::template()),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let conf = Conf::load(&cli.config)
        .with_context(|| format!("loading configuration {}", cli.config.display()))?;
    init_logging(&conf.log)?;

    run(cli, conf).map_err(|e| {
        error!("{e:#}");
        e
    })
}
