// src/plan/templates.rs

//! Static files installed next to the generated overlay.

use crate::core::layout::{ClusterLayout, FRAGMENT_DIR};
use std::path::Path;

/// The user-owned main configuration file, written once and never again.
pub fn main_config(layout: &ClusterLayout) -> String {
    format!(
        "# temboard-agent configuration for PostgreSQL cluster {name}.\n\
         #\n\
         # Generated settings live in {fragments}/, loaded after this file.\n\
         # This file is yours: autoconf refuses to run again while it exists.\n",
        name = layout.name,
        fragments = FRAGMENT_DIR,
    )
}

/// Log rotation policy shared by every agent on the host.
pub fn logrotate(logdir: &Path) -> String {
    format!(
        "{}/*.log {{\n    \
         weekly\n    \
         rotate 52\n    \
         missingok\n    \
         notifempty\n    \
         compress\n    \
         delaycompress\n    \
         copytruncate\n\
         }}\n",
        logdir.display()
    )
}
