//! Command implementations for the pyguard CLI
//!
//! `scan` drives the hybrid engine over files or directory trees and is the
//! command CI pipelines call. `rules` documents what the deterministic pass
//! looks for, and `init-config` bootstraps a configuration file.

pub mod init;
pub mod rules;
pub mod scan;
