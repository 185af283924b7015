use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;
use oscheck_engine::{
    CheckKind, Driver, HttpOrchestratorFactory, OpenStackFactory, RunOptions, render_report,
};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oscheck")]
#[command(about = "Audit OpenStack testbeds against their declared desired state")]
struct Cli {
    /// Testbed credentials file
    #[arg(
        long,
        env = "OSCHECK_CREDENTIALS",
        default_value = "/etc/oscheck/credentials.json"
    )]
    credentials: PathBuf,

    /// Desired-state file
    #[arg(long, env = "OSCHECK_CONFIG", default_value = "/etc/oscheck/desired.json")]
    config: PathBuf,

    /// Check (and upload) required images
    #[arg(long)]
    images: bool,

    /// Check required security groups (detection only)
    #[arg(long)]
    security_groups: bool,

    /// Check required networks (detection only)
    #[arg(long)]
    networks: bool,

    /// Release floating IPs that are neither ignored nor in use
    #[arg(long)]
    floating_ips: bool,

    /// Garbage-collect orchestration records and zombie servers
    #[arg(long)]
    workloads: bool,

    /// Run every check
    #[arg(long)]
    all: bool,

    /// Compute and report corrective actions without performing them
    #[arg(long)]
    dry_run: bool,

    /// Restrict the run to a single testbed
    #[arg(long)]
    testbed: Option<String>,

    /// Restrict the run to the projects of a single experimenter
    #[arg(long)]
    experimenter: Option<String>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn checks(&self) -> BTreeSet<CheckKind> {
        let mut checks = BTreeSet::new();
        if self.images || self.all {
            checks.insert(CheckKind::Images);
        }
        if self.security_groups || self.all {
            checks.insert(CheckKind::SecurityGroups);
        }
        if self.networks || self.all {
            checks.insert(CheckKind::Networks);
        }
        if self.floating_ips || self.all {
            checks.insert(CheckKind::FloatingIps);
        }
        if self.workloads || self.all {
            checks.insert(CheckKind::Workloads);
        }
        checks
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let checks = cli.checks();
    if checks.is_empty() {
        bail!(
            "select at least one check (--images, --security-groups, --networks, \
             --floating-ips, --workloads or --all)"
        );
    }

    let testbeds = oscheck_config::load_credentials(&cli.credentials)
        .with_context(|| format!("loading credentials from {}", cli.credentials.display()))?;
    let testbed_names = testbeds.keys().cloned().collect();
    let desired = oscheck_config::load_desired_state(&cli.config, &testbed_names)
        .with_context(|| format!("loading desired state from {}", cli.config.display()))?;

    if let Some(testbed) = &cli.testbed {
        if !testbeds.contains_key(testbed) {
            bail!("unknown testbed '{}'", testbed);
        }
    }
    if cli.dry_run {
        tracing::info!("Dry run: corrective actions are reported, not executed");
    }

    let options = RunOptions {
        checks,
        dry_run: cli.dry_run,
        testbed: cli.testbed.clone(),
        experimenter: cli.experimenter.clone(),
    };

    let clients = OpenStackFactory;
    let orchestrators = HttpOrchestratorFactory;
    let driver = Driver::new(&clients, &orchestrators);
    let report = driver.run(&testbeds, &desired, &options).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }

    if report.succeeded() {
        println!("{}", "All checks passed.".green());
        Ok(())
    } else {
        println!("{}", "Failures recorded, see report above.".red());
        std::process::exit(1);
    }
}
