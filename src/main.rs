use certalert::config::{Config, Settings};
use certalert::metrics::prom::prometheus_metrics;
use certalert::monitor::{Monitor, RunOptions, RunOutcome};
use certalert::notify::EmailNotifier;
use certalert::registry::Registry;
use certalert::report::{render_json, render_summary, render_table};
use certalert::TlsInspector;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "TLS certificate monitor: quiet by default, emails only")]
struct Args {
    /// Configuration file (defaults to ./certalert.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Site registry JSON file
    #[arg(long, value_name = "FILE")]
    sites: Option<String>,

    /// Certificate retrieval timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Do not send ANY emails (alerts or reminders)
    #[arg(long)]
    no_mail: bool,

    /// Print per-site table and summary block
    #[arg(short = 'S', long)]
    summary: bool,

    /// Print only the summary counts as JSON
    #[arg(short = 'J', long)]
    json: bool,

    /// Send an ICS reminder 5 days before expiry, once per certificate cycle
    #[arg(short = 'R', long)]
    reminder: bool,

    /// Push metrics to a Prometheus push gateway
    #[arg(long)]
    prometheus: bool,

    /// Prometheus push gateway address
    #[arg(long, value_name = "URL")]
    prometheus_address: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    example_config: bool,

    /// Log decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_settings(args: &Args) -> Result<Settings, certalert::config::ConfigError> {
    let file_config = Config::discover(args.config.as_deref())?;
    let cli_config = Config::from_cli_args(
        args.sites.clone(),
        args.timeout,
        args.prometheus.then_some(true),
        args.prometheus_address.clone(),
    );
    Config::default()
        .merge_with(file_config)
        .merge_with(cli_config)
        .settings()
}

fn print_outcome(outcome: &RunOutcome, summary: bool, json: bool) {
    if json {
        match render_json(&outcome.summary()) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else if summary {
        println!("{}", render_table(&outcome.reports));
        println!();
        print!("{}", render_summary(&outcome.summary()));
    }
}

fn run(args: Args) -> i32 {
    if args.example_config {
        print!("{}", Config::example_toml());
        return 0;
    }

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let (mut registry, warnings) = match Registry::load(&settings.sites_file) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };
    for warning in &warnings {
        warn!("{}", warning);
    }
    if registry.is_empty() {
        error!(
            "No valid sites in '{}'",
            settings.sites_file.display()
        );
        return 1;
    }

    // --no-mail on its own still shows what was found.
    let show_summary = args.summary || (args.no_mail && !args.json);
    let options = RunOptions::from_flags(args.no_mail, args.reminder);
    info!(?options, "checking sites from {}", settings.sites_file.display());

    let monitor = Monitor::new(
        TlsInspector::new(settings.timeout),
        EmailNotifier::new(settings.smtp.clone()),
        options,
    );
    let outcome = monitor.run(&mut registry, Utc::now());

    print_outcome(&outcome, show_summary, args.json);

    if let Some(address) = &settings.prometheus_address {
        prometheus_metrics(&outcome.reports, address);
    }

    outcome.exit_code()
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let started = std::time::Instant::now();
    let code = run(args);
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "finished with exit code {}", code
    );
    exit(code);
}
