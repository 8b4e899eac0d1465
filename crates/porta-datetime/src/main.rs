use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, warn};
use porta_datetime::prelude::*;
use porta_datetime::prepare_timezone;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_PATH: &str = "~/.config/porta-time/config.json";
const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Parser, Debug)]
#[clap(author = "Red", version, about)]
struct Args {
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Timezone name or offset, remembered for later runs
    #[arg(short = 'z', long = "timezone", global = true)]
    timezone: Option<String>,

    /// Print results as JSON
    #[arg(long = "json", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Convert a local date/time expression into a billing string
    Format { datetime: String },

    /// Show a billing (UTC) string in local time
    Local { datetime: String },

    /// Day and month boundaries around a local date/time
    Moments {
        #[arg(default_value = "now")]
        datetime: String,
    },

    /// Share of a fee covering the rest of the month
    #[command(allow_negative_numbers = true)]
    Prorate {
        fee: f64,

        #[arg(long = "at", default_value = "now")]
        at: String,
    },

    /// Compare a local date/time with now and an optional billing range
    Check {
        datetime: String,

        #[arg(long = "from")]
        from: Option<String>,

        #[arg(long = "to")]
        to: Option<String>,
    },
}

#[derive(Serialize, Deserialize, Debug)]
struct PortaConfig {
    #[serde(default = "default_timezone")]
    timezone: Value,
}

impl Default for PortaConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> Value {
    Value::String(DEFAULT_TIMEZONE.to_string())
}

fn get_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(CONFIG_PATH).as_ref())
}

fn load_config(path: &Path) -> Result<PortaConfig> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: PortaConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    } else {
        // Return default config
        Ok(PortaConfig::default())
    }
}

fn save_config(path: &Path, config: &PortaConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(())
}

type Report = Vec<(&'static str, Value)>;

fn parse_local(datetime: &str, timezone: &TimezoneArg) -> Result<PortaDateTime> {
    PortaDateTime::new(datetime, timezone.clone())
        .with_context(|| format!("Invalid date/time '{}'", datetime))
}

fn parse_bound(bound: Option<&String>) -> Result<Option<DateTime<Utc>>> {
    bound
        .map(|value| {
            PortaDateTime::from_porta_string(value, PortaZone::UTC)
                .map(|datetime| datetime.to_utc())
                .with_context(|| format!("Invalid billing date/time '{}'", value))
        })
        .transpose()
}

fn run(command: &Command, timezone: &TimezoneArg) -> Result<Report> {
    debug!("Running {:?} with timezone {:?}", command, timezone);

    let report = match command {
        Command::Format { datetime } => {
            let datetime = parse_local(datetime, timezone)?;
            vec![
                ("porta", datetime.format_porta().into()),
                ("local", datetime.format(PortaDateTime::PORTA_DATETIME).into()),
                ("timezone", datetime.timezone().name().into()),
            ]
        }
        Command::Local { datetime: porta } => {
            let datetime = PortaDateTime::from_porta_string(porta, timezone.clone())
                .with_context(|| format!("Invalid billing date/time '{}'", porta))?;
            vec![
                ("local", datetime.format(PortaDateTime::PORTA_DATETIME).into()),
                ("timezone", datetime.timezone().name().into()),
                ("porta", datetime.format_porta().into()),
            ]
        }
        Command::Moments { datetime } => {
            let datetime = parse_local(datetime, timezone)?;
            vec![
                ("first_moment", datetime.first_moment_string().into()),
                ("last_moment", datetime.last_moment_string().into()),
                ("first_moment_next_day", datetime.first_moment_next_day_string().into()),
                (
                    "first_moment_next_month",
                    datetime.first_moment_of_next_month().format_porta().into(),
                ),
            ]
        }
        Command::Prorate { fee, at } => {
            let at = parse_local(at, timezone)?;
            vec![
                ("at", at.format_porta().into()),
                ("fee", (*fee).into()),
                ("prorated", at.prorate_till_end_of_month(*fee).into()),
            ]
        }
        Command::Check { datetime, from, to } => {
            let datetime = parse_local(datetime, timezone)?;
            let from = parse_bound(from.as_ref())?;
            let to = parse_bound(to.as_ref())?;
            vec![
                ("porta", datetime.format_porta().into()),
                ("in_future", datetime.in_future().into()),
                ("in_past", datetime.in_past().into()),
                ("between", datetime.between(from, to).into()),
            ]
        }
    };

    Ok(report)
}

fn render(report: &Report, json: bool) -> Result<String> {
    if json {
        let map: Map<String, Value> = report
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        return Ok(serde_json::to_string_pretty(&Value::Object(map))?);
    }

    let lines: Vec<String> = report
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}: {}", key, s),
            other => format!("{}: {}", key, other),
        })
        .collect();
    Ok(lines.join("\n"))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(level));

    let config_path = get_config_path();
    let mut config = load_config(&config_path).unwrap_or_else(|e| {
        warn!("{:#}, using defaults", e);
        PortaConfig::default()
    });

    // If a timezone was given on the command line, use it and save it
    let timezone = if let Some(name) = &args.timezone {
        prepare_timezone(name.as_str())
            .with_context(|| format!("Invalid timezone '{}'", name))?;
        config.timezone = Value::String(name.clone());
        if let Err(e) = save_config(&config_path, &config) {
            warn!("Could not save config: {:#}", e);
        }
        TimezoneArg::from(name.as_str())
    } else {
        TimezoneArg::from(&config.timezone)
    };

    let report = run(&args.command, &timezone)?;
    println!("{}", render(&report, args.json)?);

    Ok(())
}
