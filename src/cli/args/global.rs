//! Global CLI options shared across all commands

use std::path::PathBuf;

use crate::cli::{Cli, OutputFormat};

/// Flags every handler receives, detached from the clap struct.
///
/// Only the flag/env layer lives here. `CommandContext` layers these over
/// the config file, so a flag always wins over the file.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Output format, if given on the command line
    pub format: Option<OutputFormat>,

    /// Custom config file path (defaults to ~/.avalab/config.yaml)
    pub config: Option<String>,

    /// Custom data directory for the preference store and sealing key
    pub data_dir: Option<PathBuf>,

    /// Custom API host for development/testing
    pub api_host: Option<String>,

    /// API key override
    pub api_key: Option<String>,
}

impl GlobalOptions {
    /// Collect the global flags after parsing
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            config: cli.config.clone(),
            data_dir: cli.data_dir.clone(),
            api_host: cli.api_host.clone(),
            api_key: cli.api_key.clone(),
        }
    }

    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn api_host_ref(&self) -> Option<&str> {
        self.api_host.as_deref()
    }

    pub fn api_key_ref(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}
