// src/plan/mod.rs

//! The provisioning plan: a linear state machine running the decision
//! pipeline and materializing its result on the host.
//!
//! `Start → VerifyNoExistingConfig → CreateDirectories → InstallDefaults →
//! ResolvePortAndTls → GenerateAndWriteOverlay → RegisterService → Success`
//!
//! Any error ends the run in `Aborted` (existing configuration) or `Failed`.
//! Nothing is rolled back: directories created so far are reused by the next
//! run, and only the main configuration file blocks a rerun.

pub mod templates;

use crate::config::Settings;
use crate::core::discovery::{AdminQuery, ClusterDiscovery};
use crate::core::generator::{GeneratorInput, generate};
use crate::core::install::{Installer, Ownership};
use crate::core::layout::ClusterLayout;
use crate::core::ports::{ListeningPorts, PortAllocator};
use crate::core::service::{RunAs, ServiceSupervisor, unit_name};
use crate::core::tls::{CertGenerator, TlsProvisioner};
use crate::core::{
    AutoconfError, ClusterContext, ConfigurationDocument, ErrorKind, PortAssignment,
    SharedSecret, SystemUser, TlsMaterial, validate_fqdn,
};
use chrono::Local;
use std::ffi::OsString;
use strum_macros::{Display, IntoStaticStr};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Step {
    Start,
    VerifyNoExistingConfig,
    CreateDirectories,
    InstallDefaults,
    ResolvePortAndTls,
    GenerateAndWriteOverlay,
    RegisterService,
    Success,
    Aborted,
    Failed,
}

/// The external collaborators a plan drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub query: &'a dyn AdminQuery,
    pub ports: &'a dyn ListeningPorts,
    pub installer: &'a dyn Installer,
    pub certs: &'a dyn CertGenerator,
    pub supervisor: &'a dyn ServiceSupervisor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRegistration {
    /// The unit was enabled with the supervisor.
    Enabled { unit: String },
    /// No supervisor: the operator starts the agent by hand.
    Manual,
}

/// The durable result of a successful run.
#[derive(Debug, Clone)]
pub struct ProvisioningOutcome {
    pub cluster: ClusterContext,
    pub layout: ClusterLayout,
    pub port: PortAssignment,
    pub tls: TlsMaterial,
    pub secret: SharedSecret,
    pub document: ConfigurationDocument,
    pub registration: ServiceRegistration,
    pub start_command: String,
}

pub struct ProvisioningPlan<'a> {
    settings: &'a Settings,
    hosts: Collaborators<'a>,
    search_path: OsString,
    step: Step,
    failed_at: Option<Step>,
}

impl<'a> ProvisioningPlan<'a> {
    /// `search_path` is the executable search path used to find `pg_ctl`.
    pub fn new(settings: &'a Settings, hosts: Collaborators<'a>, search_path: OsString) -> Self {
        Self {
            settings,
            hosts,
            search_path,
            step: Step::Start,
            failed_at: None,
        }
    }

    /// The current state. After `run`, one of `Success`, `Aborted` or `Failed`.
    pub fn step(&self) -> Step {
        self.step
    }

    /// The step that was running when the plan stopped on an error.
    pub fn failed_at(&self) -> Option<Step> {
        self.failed_at
    }

    pub fn run(
        &mut self,
        sysuser: &SystemUser,
        hostname: &str,
    ) -> Result<ProvisioningOutcome, AutoconfError> {
        match self.execute(sysuser, hostname) {
            Ok(outcome) => {
                self.enter(Step::Success);
                Ok(outcome)
            }
            Err(e) => {
                self.failed_at = Some(self.step);
                self.step = match e.kind() {
                    ErrorKind::Conflict => Step::Aborted,
                    _ => Step::Failed,
                };
                Err(e)
            }
        }
    }

    fn enter(&mut self, step: Step) {
        debug!("Entering step {}.", step);
        self.step = step;
    }

    fn execute(
        &mut self,
        sysuser: &SystemUser,
        hostname: &str,
    ) -> Result<ProvisioningOutcome, AutoconfError> {
        let installer = self.hosts.installer;

        self.enter(Step::Start);
        validate_fqdn(hostname)?;
        let cluster = ClusterDiscovery::new(
            self.hosts.query,
            &self.settings.postgres,
            self.search_path.clone(),
        )
        .discover(sysuser)?;
        let layout = ClusterLayout::new(self.settings, &cluster.name)?;
        let owner = Some(Ownership::from(&cluster.sysuser));
        let tls = TlsProvisioner::new(
            self.hosts.certs,
            installer,
            self.settings,
            &cluster.name,
            owner,
        );

        self.enter(Step::VerifyNoExistingConfig);
        if layout.config_file.exists() {
            return Err(AutoconfError::ExistingConfig(layout.config_file.clone()));
        }
        let pki = tls.select_pki_dir()?;
        debug!("Using PKI directory {}.", pki.display());

        self.enter(Step::CreateDirectories);
        for dir in [
            &layout.conf_dir,
            &layout.fragment_dir,
            &layout.home,
            &layout.logdir,
        ] {
            installer.create_dir(dir, owner, 0o750)?;
        }

        self.enter(Step::InstallDefaults);
        installer.write_file(&layout.users_file, b"", owner, 0o600)?;
        self.install_logrotate()?;

        self.enter(Step::ResolvePortAndTls);
        let port = PortAllocator::new(self.hosts.ports)
            .with_bind_check(self.settings.ports.bind_check)
            .allocate()?;
        let material = tls.resolve_in(&pki)?;
        let secret = SharedSecret::generate()?;

        self.enter(Step::GenerateAndWriteOverlay);
        let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string();
        let document = generate(&GeneratorInput {
            cluster: &cluster,
            port,
            tls: &material,
            secret: &secret,
            home: &layout.home,
            logfile: &layout.agent_log,
            hostname,
            generated_at: &generated_at,
        });
        installer.write_file(
            &layout.overlay_file,
            document.render().as_bytes(),
            owner,
            0o640,
        )?;
        info!("Configuration written to {}.", layout.overlay_file.display());
        let main = templates::main_config(&layout);
        if !installer.create_if_absent(&layout.config_file, main.as_bytes(), owner, 0o640)? {
            return Err(AutoconfError::ExistingConfig(layout.config_file.clone()));
        }

        self.enter(Step::RegisterService);
        let (registration, start_command) = self.register(&cluster, &layout)?;

        Ok(ProvisioningOutcome {
            cluster,
            layout,
            port,
            tls: material,
            secret,
            document,
            registration,
            start_command,
        })
    }

    /// Installs the shared log rotation policy unless some run already did.
    fn install_logrotate(&self) -> Result<(), AutoconfError> {
        let path = &self.settings.logrotate_path;
        if let Some(parent) = path.parent()
            && !parent.is_dir()
        {
            warn!(
                "{} does not exist, skipping log rotation setup.",
                parent.display()
            );
            return Ok(());
        }
        let policy = templates::logrotate(&self.settings.logdir);
        if self
            .hosts
            .installer
            .create_if_absent(path, policy.as_bytes(), None, 0o644)?
        {
            info!("Installed log rotation policy {}.", path.display());
        } else {
            debug!("Log rotation policy {} already present.", path.display());
        }
        Ok(())
    }

    fn register(
        &self,
        cluster: &ClusterContext,
        layout: &ClusterLayout,
    ) -> Result<(ServiceRegistration, String), AutoconfError> {
        let service = &self.settings.service;
        let supervisor = self.hosts.supervisor;

        if !supervisor.is_available() {
            warn!("No service supervisor found. The agent must be started manually.");
            let command = format!(
                "sudo -u {} {} -c {}",
                cluster.sysuser.name,
                service.agent_command,
                layout.config_file.display()
            );
            return Ok((ServiceRegistration::Manual, command));
        }

        let unit = unit_name(&service.unit_template, &cluster.name);
        let run_as = (cluster.sysuser.name != service.default_user).then(|| RunAs {
            user: cluster.sysuser.name.clone(),
            group: cluster.sysuser.group.clone(),
        });
        supervisor.enable(&unit, run_as.as_ref())?;
        let command = format!("systemctl start {unit}");
        Ok((ServiceRegistration::Enabled { unit }, command))
    }
}
