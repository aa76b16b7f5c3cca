// tests/integration/test_helpers.rs

//! Test helpers: in-memory collaborators and a throwaway host layout.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::fs;
use std::ops::RangeInclusive;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use temboard_autoconf::config::Settings;
use temboard_autoconf::core::discovery::{AdminQuery, PROBE_QUERY};
use temboard_autoconf::core::ports::ListeningPorts;
use temboard_autoconf::core::service::{RunAs, ServiceSupervisor};
use temboard_autoconf::core::tls::RcgenGenerator;
use temboard_autoconf::core::{AutoconfError, ConnParams, SystemUser};
use temboard_autoconf::host::{HostInstaller, users};
use temboard_autoconf::plan::{Collaborators, ProvisioningOutcome, ProvisioningPlan, Step};

pub const HOSTNAME: &str = "db1.example.com";
pub const VERSION: &str = "14";

/// Answers `pg_settings` lookups from a map. Unknown settings are empty.
pub struct StaticQuery {
    pub settings: HashMap<String, String>,
    pub reachable: bool,
    pub queries: RefCell<Vec<String>>,
}

impl StaticQuery {
    pub fn new(settings: &[(&str, &str)]) -> Self {
        Self {
            settings: settings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            reachable: true,
            queries: RefCell::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        let mut query = Self::new(&[]);
        query.reachable = false;
        query
    }
}

impl AdminQuery for StaticQuery {
    fn scalar(&self, _conn: &ConnParams, sql: &str) -> Result<Option<String>, AutoconfError> {
        self.queries.borrow_mut().push(sql.to_string());
        if !self.reachable {
            return Err(AutoconfError::Query(
                "could not connect to server: Connection refused".to_string(),
            ));
        }
        if sql == PROBE_QUERY {
            return Ok(Some("Postgres connection working.".to_string()));
        }
        let name = sql
            .strip_prefix("SELECT setting FROM pg_settings WHERE name = '")
            .and_then(|rest| rest.strip_suffix("';"))
            .expect("unexpected query");
        Ok(Some(self.settings.get(name).cloned().unwrap_or_default()))
    }
}

/// A fixed set of listening ports.
pub struct FixedPorts(pub BTreeSet<u16>);

impl FixedPorts {
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }
}

impl ListeningPorts for FixedPorts {
    fn listening_in(&self, range: RangeInclusive<u16>) -> Result<BTreeSet<u16>, AutoconfError> {
        Ok(self.0.iter().copied().filter(|p| range.contains(p)).collect())
    }
}

/// Records enabled units instead of talking to systemd.
pub struct RecordingSupervisor {
    pub available: bool,
    pub enabled: RefCell<Vec<(String, Option<RunAs>)>>,
}

impl RecordingSupervisor {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            enabled: RefCell::new(Vec::new()),
        }
    }
}

impl ServiceSupervisor for RecordingSupervisor {
    fn is_available(&self) -> bool {
        self.available
    }

    fn enable(&self, unit: &str, run_as: Option<&RunAs>) -> Result<(), AutoconfError> {
        self.enabled
            .borrow_mut()
            .push((unit.to_string(), run_as.cloned()));
        Ok(())
    }
}

/// A fake host rooted in a temporary directory.
///
/// The system user is the current user, with its home moved under the root.
/// The cluster lives in `home/14/main`, `pg_ctl` in `pg/14/bin` and the only
/// existing PKI directory is `ssl`.
pub struct TestHost {
    pub dir: TempDir,
    pub settings: Settings,
    pub sysuser: SystemUser,
    pub data_dir: PathBuf,
}

impl TestHost {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        let mut sysuser = users::current().expect("current user");
        sysuser.home = root.join("home");

        let data_dir = sysuser.home.join(VERSION).join("main");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join("PG_VERSION"), format!("{VERSION}\n")).unwrap();

        let bindir = root.join("pg").join(VERSION).join("bin");
        fs::create_dir_all(&bindir).unwrap();
        write_executable(&bindir.join("pg_ctl"));

        fs::create_dir_all(root.join("ssl")).unwrap();
        fs::create_dir_all(root.join("logrotate.d")).unwrap();

        let mut settings = Settings::default();
        settings.sysuser = sysuser.name.clone();
        settings.etcdir = root.join("etc");
        settings.vardir = root.join("var");
        settings.logdir = root.join("log");
        settings.logfile = root.join("autoconf.log");
        settings.logrotate_path = root.join("logrotate.d").join("temboard-agent");
        settings.hostname = Some(HOSTNAME.to_string());
        settings.postgres.bindirs = vec![format!("{}/pg/{{version}}/bin", root.display())];
        settings.tls.pki_dirs = vec![
            format!("{}/pki", root.display()),
            format!("{}/ssl", root.display()),
            "{etcdir}/{name}".to_string(),
        ];
        settings.ports.bind_check = false;
        settings.service.default_user = sysuser.name.clone();

        Self {
            dir,
            settings,
            sysuser,
            data_dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn pg_ctl(&self) -> PathBuf {
        self.root().join("pg").join(VERSION).join("bin").join("pg_ctl")
    }

    /// A query collaborator describing the cluster of this host.
    pub fn query(&self) -> StaticQuery {
        let data_dir = self.data_dir.display().to_string();
        StaticQuery::new(&[
            ("unix_socket_directories", "/var/run/postgresql, /tmp"),
            ("data_directory", data_dir.as_str()),
            ("cluster_name", ""),
        ])
    }

    /// Runs a whole plan with the given collaborators.
    pub fn run(
        &self,
        query: &dyn AdminQuery,
        ports: &dyn ListeningPorts,
        supervisor: &dyn ServiceSupervisor,
    ) -> (Result<ProvisioningOutcome, AutoconfError>, Step, Option<Step>) {
        let installer = HostInstaller;
        let certs = RcgenGenerator;
        let hosts = Collaborators {
            query,
            ports,
            installer: &installer,
            certs: &certs,
            supervisor,
        };
        let mut plan = ProvisioningPlan::new(&self.settings, hosts, OsString::new());
        let result = plan.run(&self.sysuser, HOSTNAME);
        (result, plan.step(), plan.failed_at())
    }
}

pub fn write_executable(path: &Path) {
    fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode() & 0o7777
}
