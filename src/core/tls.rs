// src/core/tls.rs

//! TLS material for the agent: reuse the host's snake-oil pair when there is
//! one, otherwise generate a self-signed pair scoped to the cluster.

use super::errors::AutoconfError;
use super::install::{Installer, Ownership};
use super::layout::normalize_name;
use crate::config::Settings;
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, date_time_ymd};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const SNAKEOIL_CERT: &str = "certs/ssl-cert-snakeoil.pem";
pub const SNAKEOIL_KEY: &str = "private/ssl-cert-snakeoil.key";

/// Last year an X.509 GeneralizedTime can encode.
pub const MAX_NOT_AFTER_YEAR: i32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsOrigin {
    /// The host's default snake-oil pair.
    Reused,
    /// A self-signed pair generated for this cluster.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub origin: TlsOrigin,
}

/// Subject fields of a generated certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSubject {
    pub country: String,
    pub locality: String,
    pub organization: String,
}

impl CertSubject {
    pub fn placeholder() -> Self {
        Self {
            country: "XX".to_string(),
            locality: "Default".to_string(),
            organization: "Default".to_string(),
        }
    }
}

/// A generated certificate and private key pair.
#[derive(Debug, Clone)]
pub struct CertKeyPair {
    /// PEM-encoded certificate.
    pub cert_pem: String,
    /// PEM-encoded private key.
    pub key_pem: String,
}

/// The certificate-generation collaborator.
pub trait CertGenerator {
    fn self_signed(
        &self,
        subject: &CertSubject,
        validity: Duration,
    ) -> Result<CertKeyPair, AutoconfError>;
}

/// Generates certificates in-process with `rcgen`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RcgenGenerator;

impl CertGenerator for RcgenGenerator {
    fn self_signed(
        &self,
        subject: &CertSubject,
        validity: Duration,
    ) -> Result<CertKeyPair, AutoconfError> {
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CountryName, subject.country.as_str());
        dn.push(DnType::LocalityName, subject.locality.as_str());
        dn.push(DnType::OrganizationName, subject.organization.as_str());
        params.distinguished_name = dn;

        let now = Utc::now();
        let until = not_after(now, validity)?;
        params.not_before = date_time_ymd(now.year(), now.month() as u8, now.day() as u8);
        params.not_after = date_time_ymd(until.year(), until.month() as u8, until.day() as u8);

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;

        Ok(CertKeyPair {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }
}

/// Expiry of a certificate issued at `now` and valid for `validity`.
pub fn not_after(now: DateTime<Utc>, validity: Duration) -> Result<DateTime<Utc>, AutoconfError> {
    let too_long = || {
        AutoconfError::Certificate(format!(
            "Validity of {}s ends after year {MAX_NOT_AFTER_YEAR}",
            validity.as_secs()
        ))
    };
    let lifetime = TimeDelta::from_std(validity).map_err(|_| too_long())?;
    let until = now.checked_add_signed(lifetime).ok_or_else(too_long)?;
    if until.year() > MAX_NOT_AFTER_YEAR {
        return Err(too_long());
    }
    Ok(until)
}

/// Expands the PKI directory templates for one cluster.
pub fn candidate_dirs(templates: &[String], etcdir: &Path, token: &str) -> Vec<PathBuf> {
    let etcdir = etcdir.to_string_lossy();
    templates
        .iter()
        .map(|t| PathBuf::from(t.replace("{etcdir}", &etcdir).replace("{name}", token)))
        .collect()
}

pub struct TlsProvisioner<'a> {
    generator: &'a dyn CertGenerator,
    installer: &'a dyn Installer,
    token: String,
    candidates: Vec<PathBuf>,
    validity: Duration,
    owner: Option<Ownership>,
}

impl<'a> TlsProvisioner<'a> {
    /// `owner` receives generated files, usually the cluster's system user.
    pub fn new(
        generator: &'a dyn CertGenerator,
        installer: &'a dyn Installer,
        settings: &Settings,
        cluster_name: &str,
        owner: Option<Ownership>,
    ) -> Self {
        let token = normalize_name(cluster_name);
        Self {
            candidates: candidate_dirs(&settings.tls.pki_dirs, &settings.etcdir, &token),
            validity: settings.tls.validity,
            generator,
            installer,
            token,
            owner,
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Returns the first existing candidate PKI directory.
    pub fn select_pki_dir(&self) -> Result<PathBuf, AutoconfError> {
        self.candidates
            .iter()
            .find(|dir| dir.is_dir())
            .cloned()
            .ok_or_else(|| {
                AutoconfError::NoPkiDirectory(
                    self.candidates
                        .iter()
                        .map(|d| d.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                )
            })
    }

    pub fn resolve(&self) -> Result<TlsMaterial, AutoconfError> {
        let pki = self.select_pki_dir()?;
        self.resolve_in(&pki)
    }

    /// Resolves material inside an already selected PKI directory.
    pub fn resolve_in(&self, pki: &Path) -> Result<TlsMaterial, AutoconfError> {
        let snakeoil_cert = pki.join(SNAKEOIL_CERT);
        let snakeoil_key = pki.join(SNAKEOIL_KEY);
        if snakeoil_cert.is_file() && snakeoil_key.is_file() {
            check_loadable(&snakeoil_cert, &snakeoil_key)?;
            info!("Using snake-oil SSL certificate {}.", snakeoil_cert.display());
            return Ok(TlsMaterial {
                cert: snakeoil_cert,
                key: snakeoil_key,
                origin: TlsOrigin::Reused,
            });
        }

        let cert = pki
            .join("certs")
            .join(format!("temboard-agent-{}.pem", self.token));
        let key = pki
            .join("private")
            .join(format!("temboard-agent-{}.key", self.token));
        for dir in [cert.parent(), key.parent()].into_iter().flatten() {
            if !dir.is_dir() {
                self.installer.create_dir(dir, self.owner, 0o750)?;
            }
        }
        if cert.exists() || key.exists() {
            warn!(
                "Replacing existing certificate {} left by a previous run.",
                cert.display()
            );
        }

        let pair = self
            .generator
            .self_signed(&CertSubject::placeholder(), self.validity)?;
        self.installer
            .write_file(&cert, pair.cert_pem.as_bytes(), self.owner, 0o644)?;
        self.installer
            .write_file(&key, pair.key_pem.as_bytes(), self.owner, 0o600)?;
        info!("Generated self-signed SSL certificate {}.", cert.display());

        Ok(TlsMaterial {
            cert,
            key,
            origin: TlsOrigin::Generated,
        })
    }
}

/// Makes sure a reused pair holds at least one certificate and a private key.
fn check_loadable(cert: &Path, key: &Path) -> Result<(), AutoconfError> {
    let cert_file = File::open(cert).map_err(|e| {
        AutoconfError::Certificate(format!(
            "Failed to open certificate file '{}': {}",
            cert.display(),
            e
        ))
    })?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            AutoconfError::Certificate(format!("Invalid PEM in '{}': {}", cert.display(), e))
        })?;
    if certs.is_empty() {
        return Err(AutoconfError::Certificate(format!(
            "No certificates found in '{}'",
            cert.display()
        )));
    }

    let key_file = File::open(key).map_err(|e| {
        AutoconfError::Certificate(format!(
            "Failed to open private key file '{}': {}",
            key.display(),
            e
        ))
    })?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| {
            AutoconfError::Certificate(format!("Invalid PEM in '{}': {}", key.display(), e))
        })?
        .ok_or_else(|| {
            AutoconfError::Certificate(format!(
                "No private key found in key file '{}'",
                key.display()
            ))
        })?;
    Ok(())
}
