use chrono::Local;
use clap::{ArgAction, Args, Parser, Subcommand};
use clocklink::port::MemoryPort;
use clocklink::sim::SimulatedClock;
use clocklink::state::format_host_time;
use clocklink::timer::Recurring;
use clocklink::tty::{available_ports, most_recent_port, PATTERNS};
use clocklink::{BridgeConfig, ClockBridge};
use clocklink_common::{AlarmIntent, ClockTime};
use console::{style, Term};
use eyre::{Result, WrapErr};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::filter::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Serial device the clock is on; autodetected if not specified
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Baud rate; the clock speaks 9600
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// TOML file with bridge settings; flags take precedence
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase message verbosity
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Task,
}

#[derive(Debug, Clone, Subcommand)]
enum Task {
    /// List serial ports that could be the clock
    ListPorts,
    /// Print the clock's time as it reports it
    Monitor(MonitorTask),
    /// Set the clock's date and time
    SetClock(SetClockTask),
    /// Set the clock's alarm
    SetAlarm(SetAlarmTask),
}
impl Task {
    fn run(self, config: BridgeConfig) -> Result<()> {
        match self {
            Task::ListPorts => list_ports(),
            Task::Monitor(task) => task.run(config),
            Task::SetClock(task) => task.run(config),
            Task::SetAlarm(task) => task.run(config),
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = available_ports();
    if ports.is_empty() {
        tracing::warn!(
            "no serial ports found; expected something in /dev like one of: {}",
            PATTERNS.map(|p| format!("{p}*")).join(", ")
        );
    }
    for port in ports {
        println!("{}", port.display());
    }
    Ok(())
}

#[derive(Debug, Clone, Args)]
struct MonitorTask {
    /// Stop after this many seconds instead of running until killed
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Talk to a simulated clock instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// Also print the host's time once a second
    #[arg(long)]
    show_host_time: bool,
}
impl MonitorTask {
    fn run(self, config: BridgeConfig) -> Result<()> {
        let mut bridge = ClockBridge::new(config);
        let mut sim = None;
        if self.simulate {
            let (port, device) = MemoryPort::pair();
            bridge.open_with(Box::new(port))?;
            let clock = SimulatedClock::new(device, Local::now().naive_local()).with_garbage_every(7);
            sim = Some(clock.spawn(Duration::from_secs(1))?);
            tracing::info!("monitoring simulated clock");
        } else {
            bridge.open().wrap_err("failed to connect to the clock")?;
        }
        println!("{}", style(bridge.status_text()).green());

        let mut host_clock = None;
        if self.show_host_time {
            host_clock = Some(Recurring::spawn(
                "clocklink-host-time",
                Duration::from_secs(1),
                || {
                    let now = format_host_time(&Local::now());
                    println!(
                        "{} {}  {}",
                        style("host ").dim(),
                        now.date_text,
                        now.time_text
                    );
                    ControlFlow::Continue(())
                },
            )?);
        }

        let stop = match self.duration_secs {
            Some(secs) => crossbeam_channel::after(Duration::from_secs(secs)),
            None => crossbeam_channel::never(),
        };
        let term = Term::stdout();
        bridge.run_until(&stop, |bridge| {
            let f = bridge.formatted();
            let line = format!("{} {}  {}", style("clock").cyan(), f.date_text, f.time_text);
            if let Err(e) = term.write_line(&line) {
                tracing::error!("failed to write to stdout: {e}");
            }
        });

        if let Some(mut task) = host_clock {
            task.stop();
        }
        if let Some((mut task, _)) = sim {
            task.stop();
        }
        bridge.close();
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
struct SetClockTask {
    /// Use the host's local time
    #[arg(long, conflicts_with_all = ["month", "day", "hour", "minute", "second"])]
    sync: bool,
    #[arg(long, required_unless_present = "sync")]
    month: Option<u8>,
    #[arg(long, required_unless_present = "sync")]
    day: Option<u8>,
    #[arg(long, required_unless_present = "sync")]
    hour: Option<u8>,
    #[arg(long, required_unless_present = "sync")]
    minute: Option<u8>,
    #[arg(long, required_unless_present = "sync")]
    second: Option<u8>,
}
impl SetClockTask {
    fn time(&self) -> Option<ClockTime> {
        Some(ClockTime {
            month: self.month?,
            day: self.day?,
            hour: self.hour?,
            minute: self.minute?,
            second: self.second?,
        })
    }

    fn run(self, config: BridgeConfig) -> Result<()> {
        let mut bridge = ClockBridge::new(config);
        bridge.open().wrap_err("failed to connect to the clock")?;
        let result = match self.time() {
            Some(time) if !self.sync => bridge.request_set_clock(time),
            _ => bridge.sync_host_time().map(|_| ()),
        };
        report(&bridge, result)
    }
}

#[derive(Debug, Clone, Args)]
struct SetAlarmTask {
    #[arg(long)]
    hour: u8,
    #[arg(long)]
    minute: u8,
    /// Only shown in the status line; the clock has no enable bit on the wire
    #[arg(long)]
    enabled: bool,
}
impl SetAlarmTask {
    fn run(self, config: BridgeConfig) -> Result<()> {
        let mut bridge = ClockBridge::new(config);
        bridge.open().wrap_err("failed to connect to the clock")?;
        let result = bridge.request_set_alarm(AlarmIntent {
            hour: self.hour,
            minute: self.minute,
            enabled: self.enabled,
        });
        report(&bridge, result)
    }
}

fn report(bridge: &ClockBridge, result: Result<(), clocklink::BridgeError>) -> Result<()> {
    match result {
        Ok(()) => {
            println!("{}", style(bridge.status_text()).green());
            Ok(())
        }
        Err(e) => Err(e).wrap_err("command was not sent"),
    }
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .wrap_err_with(|| format!("failed to load {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    match &cli.device {
        Some(device) => config.port = device.clone(),
        // a config file that names a port wins over guessing
        None if cli.config.is_none() => {
            if let Some(port) = most_recent_port() {
                tracing::info!("no device specified, using {}", port.display());
                config.port = port.display().to_string();
            }
        }
        None => {}
    }
    if let Some(baud) = cli.baud {
        config.baud = baud;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    color_eyre::install().expect("failed to install color-eyre");
    let cli = Cli::parse();

    let default_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clocklink={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .map_event_format(|f| f.without_time())
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    cli.command.run(config)
}
