// src/core/generator.rs

//! Composes discovery, port and TLS results into the agent configuration.

use super::context::ClusterContext;
use super::document::ConfigurationDocument;
use super::ports::PortAssignment;
use super::secret::SharedSecret;
use super::tls::TlsMaterial;
use std::path::Path;

/// Everything the generated document depends on.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorInput<'a> {
    pub cluster: &'a ClusterContext,
    pub port: PortAssignment,
    pub tls: &'a TlsMaterial,
    pub secret: &'a SharedSecret,
    pub home: &'a Path,
    pub logfile: &'a Path,
    pub hostname: &'a str,
    /// Informational timestamp written in the header comment.
    pub generated_at: &'a str,
}

/// Builds the document. Same input, same bytes.
pub fn generate(input: &GeneratorInput<'_>) -> ConfigurationDocument {
    let cluster = input.cluster;
    let mut doc = ConfigurationDocument::new();

    doc.push_comment(format!(
        "Configuration initiated by temboard-agent-autoconf on {}",
        input.generated_at
    ));
    doc.push_comment("");
    doc.push_comment("See temboard-agent.sample.conf for details on configuration.");

    doc.set("temboard", "home", input.home.display().to_string());
    doc.set("temboard", "hostname", input.hostname);
    doc.set("temboard", "port", input.port.to_string());
    doc.set("temboard", "ssl_cert_file", input.tls.cert.display().to_string());
    doc.set("temboard", "ssl_key_file", input.tls.key.display().to_string());
    doc.set("temboard", "key", input.secret.as_str());

    doc.set("logging", "method", "file");
    doc.set("logging", "destination", input.logfile.display().to_string());

    doc.set("postgresql", "host", cluster.conn.host.as_str());
    doc.set("postgresql", "port", cluster.conn.port.to_string());
    doc.set("postgresql", "user", cluster.conn.user.as_str());
    doc.set("postgresql", "dbname", cluster.conn.dbname.as_str());
    doc.set("postgresql", "instance", cluster.name.as_str());

    doc.set(
        "administration",
        "pg_ctl",
        format!(
            "'{} %s -D {}'",
            cluster.pg_ctl.display(),
            cluster.data_dir.display()
        ),
    );

    doc
}
