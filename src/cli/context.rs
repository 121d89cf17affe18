//! Command execution context
//!
//! Loads the configuration, applies command-line overrides and opens the
//! local stores, so handlers only deal with their own logic.

use std::path::PathBuf;

use crate::auth::{AesGcmSealer, PlaintextSealer, SecretSealer, TokenStore};
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::client::AvalabClient;
use crate::config::Config;
use crate::error::Result;
use crate::store::PreferenceStore;

/// Sealing key file inside the data directory
const KEY_FILE: &str = "token.key";

/// Context for command execution
#[derive(Debug)]
pub struct CommandContext {
    /// Loaded configuration with overrides applied
    pub config: Config,
    /// Where the configuration was (or would be) read from
    pub config_path: PathBuf,
    /// Directory holding the preference database and sealing key
    pub data_dir: PathBuf,
    /// Effective output format
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load config and resolve paths. Touches no network and opens no store.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if an override makes it invalid.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config_path = Config::resolve_path(opts.config_ref())?;
        let mut config = Config::load_at(opts.config_ref())?;

        if let Some(host) = opts.api_host_ref() {
            config.api_host = host.to_string();
        }
        if let Some(key) = opts.api_key_ref() {
            config.api_key = Some(key.to_string());
        }
        config.validate()?;

        let data_dir = match &opts.data_dir {
            Some(dir) => dir.clone(),
            None => Config::default_dir()?,
        };

        let format = opts
            .format
            .or_else(|| {
                config
                    .preferences
                    .format
                    .as_deref()
                    .and_then(OutputFormat::from_preference)
            })
            .unwrap_or_default();

        log::debug!(
            "Using config {} and data dir {}",
            config_path.display(),
            data_dir.display()
        );

        Ok(Self {
            config,
            config_path,
            data_dir,
            format,
        })
    }

    /// Open the token store, sealing tokens when the config asks for it.
    ///
    /// A sealing key that cannot be loaded or created downgrades the store
    /// to plaintext with a warning instead of failing the command.
    pub fn token_store(&self) -> Result<TokenStore> {
        let prefs = PreferenceStore::open_at(&self.data_dir)?;

        let sealer: Box<dyn SecretSealer> = if self.config.seal_tokens {
            match AesGcmSealer::from_key_file(&self.data_dir.join(KEY_FILE)) {
                Ok(sealer) => Box::new(sealer),
                Err(e) => {
                    log::warn!("Token encryption unavailable ({}); storing tokens unencrypted", e);
                    Box::new(PlaintextSealer)
                }
            }
        } else {
            Box::new(PlaintextSealer)
        };

        Ok(TokenStore::new(prefs, sealer))
    }

    /// Build the API client. Requires an API key.
    pub fn client(&self) -> Result<AvalabClient> {
        AvalabClient::new(&self.config)
    }
}
