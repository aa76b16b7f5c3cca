// build.rs

//! Stamps the version reported by `--version`.
//!
//! Packagers set `TEMBOARD_AUTOCONF_VERSION` to embed their own version
//! string, such as `1.2-3.el9`. Blank values fall back to the crate version.

use std::env;

const OVERRIDE: &str = "TEMBOARD_AUTOCONF_VERSION";

fn main() {
    let package = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "dev".to_string());
    let version = match env::var(OVERRIDE) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => package,
    };

    println!("cargo:rustc-env=TEMBOARD_AUTOCONF_BUILD_VERSION={version}");
    println!("cargo:rerun-if-env-changed={OVERRIDE}");
    println!("cargo:rerun-if-changed=build.rs");
}
