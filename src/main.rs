// src/main.rs

//! The entry point of the temboard-agent autoconfiguration tool.

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use temboard_autoconf::config::Settings;
use temboard_autoconf::core::tls::RcgenGenerator;
use temboard_autoconf::diagnostics::{self, DiagnosticLog};
use temboard_autoconf::host::{
    HostInstaller, ProcNetTcp, Psql, Systemd, hostname::resolve_hostname, users,
};
use temboard_autoconf::plan::{Collaborators, ProvisioningOutcome, ProvisioningPlan};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "temboard-agent-autoconf",
    about = "Configure a temboard-agent instance for a running PostgreSQL cluster",
    version = env!("TEMBOARD_AUTOCONF_BUILD_VERSION")
)]
struct Cli {
    /// Settings file (default: /etc/temboard-agent/autoconf.toml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Unix user running the cluster [env: SYSUSER]
    #[arg(short = 'u', long)]
    sysuser: Option<String>,
    /// Fully qualified hostname of this host [env: TEMBOARD_HOSTNAME]
    #[arg(long)]
    hostname: Option<String>,
    /// Diagnostic log, kept only on failure [env: LOGFILE]
    #[arg(long)]
    logfile: Option<PathBuf>,
    /// Accept a port without trying to bind it first
    #[arg(long)]
    no_bind_check: bool,
}

impl Cli {
    fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(sysuser) = &self.sysuser {
            overrides.push(("sysuser", sysuser.clone()));
        }
        if let Some(hostname) = &self.hostname {
            overrides.push(("hostname", hostname.clone()));
        }
        if let Some(logfile) = &self.logfile {
            overrides.push(("logfile", logfile.display().to_string()));
        }
        if self.no_bind_check {
            overrides.push(("ports.bind_check", "false".to_string()));
        }
        overrides
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Settings are needed before logging can start, errors go to stderr.
    let settings = match Settings::from_env(cli.config.as_deref(), &cli.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let log = match DiagnosticLog::create(&settings.logfile) {
        Ok(log) => Some(log),
        Err(e) => {
            eprintln!(
                "Failed to open log file '{}': {}. Continuing without it.",
                settings.logfile.display(),
                e
            );
            None
        }
    };
    if let Err(e) = diagnostics::init_tracing(&settings.log_level, log.as_ref()) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(&settings) {
        Ok(outcome) => {
            report(&outcome);
            if let Some(log) = log {
                log.finish(true);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            if let Some(path) = log.and_then(|log| log.finish(false)) {
                eprintln!("Failure. See {} for details.", path.display());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<ProvisioningOutcome> {
    let sysuser = users::lookup(&settings.sysuser)?;
    let hostname = resolve_hostname(settings.hostname.as_deref())?;
    let search_path = env::var_os("PATH").unwrap_or_default();

    let query = Psql::new(&sysuser, search_path.clone());
    let ports = ProcNetTcp::default();
    let installer = HostInstaller;
    let certs = RcgenGenerator;
    let supervisor = Systemd::new(&settings.service.unit_dir);

    let hosts = Collaborators {
        query: &query,
        ports: &ports,
        installer: &installer,
        certs: &certs,
        supervisor: &supervisor,
    };
    let mut plan = ProvisioningPlan::new(settings, hosts, search_path);
    let result = plan.run(&sysuser, &hostname);
    result.with_context(|| match plan.failed_at() {
        Some(step) => format!("Provisioning stopped at {step} ({})", plan.step()),
        None => "Provisioning failed".to_string(),
    })
}

fn report(outcome: &ProvisioningOutcome) {
    info!(
        "temboard-agent for {} listens on port {}.",
        outcome.cluster.name, outcome.port
    );
    println!("Success. You can now start temboard-agent using:");
    println!();
    println!("    {}", outcome.start_command);
    println!();
    println!("For registration, use secret key {}.", outcome.secret);
}
