// tests/property/generator_test.rs

//! Property-based tests for configuration synthesis and naming
//! Generation is a pure function of its input and names map to safe tokens.

use proptest::prelude::*;
use std::path::{Path, PathBuf};
use temboard_autoconf::core::discovery::derive_cluster_name;
use temboard_autoconf::core::generator::{GeneratorInput, generate};
use temboard_autoconf::core::layout::normalize_name;
use temboard_autoconf::core::service::systemd_escape;
use temboard_autoconf::core::tls::{TlsMaterial, TlsOrigin};
use temboard_autoconf::core::ports::PortAllocator;
use temboard_autoconf::core::{ClusterContext, ConnParams, SharedSecret, SystemUser};

use crate::test_helpers::FixedPorts;

fn cluster(name: &str, port: u16) -> ClusterContext {
    ClusterContext {
        sysuser: SystemUser {
            name: "postgres".to_string(),
            uid: 26,
            gid: 26,
            group: "postgres".to_string(),
            home: PathBuf::from("/var/lib/pgsql"),
        },
        conn: ConnParams {
            host: "/var/run/postgresql".to_string(),
            port,
            user: "postgres".to_string(),
            dbname: "postgres".to_string(),
        },
        data_dir: PathBuf::from("/var/lib/pgsql/data"),
        version: "16".to_string(),
        pg_ctl: PathBuf::from("/usr/pgsql-16/bin/pg_ctl"),
        name: name.to_string(),
    }
}

proptest! {
    #[test]
    fn test_generation_is_deterministic(
        name in "[a-z0-9]{1,8}(/[a-z0-9]{1,8})?",
        pg_port in 1u16..,
        busy in prop::collection::btree_set(2345u16..2400, 0..20),
        secret in "[0-9a-f]{32}",
        hostname in "[a-z]{1,10}\\.[a-z]{2,6}",
    ) {
        let cluster = cluster(&name, pg_port);
        let probe = FixedPorts(busy);
        let port = PortAllocator::new(&probe).allocate().unwrap();
        let tls = TlsMaterial {
            cert: PathBuf::from("/etc/pki/tls/certs/a.pem"),
            key: PathBuf::from("/etc/pki/tls/private/a.key"),
            origin: TlsOrigin::Generated,
        };
        let secret = SharedSecret::from_hex(secret);
        let input = GeneratorInput {
            cluster: &cluster,
            port,
            tls: &tls,
            secret: &secret,
            home: Path::new("/var/lib/temboard-agent/x"),
            logfile: Path::new("/var/log/temboard-agent/x.log"),
            hostname: &hostname,
            generated_at: "2024-01-01 00:00:00 +0000",
        };

        let first = generate(&input);
        let second = generate(&input);
        prop_assert_eq!(first.render(), second.render());

        let port_text = port.to_string();
        prop_assert_eq!(first.get("temboard", "port"), Some(port_text.as_str()));
        prop_assert_eq!(first.get("temboard", "key"), Some(secret.as_str()));
        prop_assert_eq!(first.get("postgresql", "instance"), Some(name.as_str()));
        let pg_port_text = pg_port.to_string();
        prop_assert_eq!(first.get("postgresql", "port"), Some(pg_port_text.as_str()));
    }

    #[test]
    fn test_name_tokens_have_no_slash(name in "[a-zA-Z0-9._/-]{1,30}") {
        prop_assert!(!normalize_name(&name).contains('/'));
        let escaped = systemd_escape(&name);
        prop_assert!(!escaped.contains('/'));
        prop_assert!(escaped.bytes().all(|b| b.is_ascii_graphic()));
    }

    #[test]
    fn test_home_relative_names(
        parts in prop::collection::vec("[a-z0-9][a-z0-9.]{0,7}", 1..4),
        port in 1u16..,
    ) {
        let relative = parts.join("/");
        let home = Path::new("/var/lib/postgresql");
        let name = derive_cluster_name(None, &home.join(&relative), home, "15", port);
        prop_assert_eq!(name, relative);

        let outside = derive_cluster_name(None, Path::new("/srv/data"), home, "15", port);
        prop_assert_eq!(outside, format!("15/pg{port}"));
    }
}
