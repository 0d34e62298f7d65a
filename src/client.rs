//! The client facade.
//!
//! [`OpenWebUi`] owns one transport and hands out the folder, chat, and
//! knowledge operation groups that share it.
//!
//! ```rust,no_run
//! # async fn demo() -> openwebui::Result<()> {
//! use openwebui::{ClientOverrides, OpenWebUi};
//!
//! let client = OpenWebUi::connect(&ClientOverrides::default())?;
//! let folders = client.folders.list().await?;
//! # let _ = folders;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::chats::Chats;
use crate::config::{ClientOptions, ClientOverrides, ConfigSources, EffectiveConfig};
use crate::error::Result;
use crate::folders::Folders;
use crate::knowledge::Knowledge;
use crate::transport::{ReqwestTransport, Transport};

pub struct OpenWebUi {
    pub folders: Folders,
    pub chats: Chats,
    pub knowledge: Knowledge,
    options: ClientOptions,
}

impl OpenWebUi {
    /// Resolves configuration from files, environment, and `overrides`,
    /// then builds an HTTP client.
    pub fn connect(overrides: &ClientOverrides) -> Result<Self> {
        let sources = ConfigSources::discover()?;
        let config = sources.resolve(overrides)?;
        Self::from_config(&config, sources.client_options())
    }

    pub fn from_config(config: &EffectiveConfig, options: ClientOptions) -> Result<Self> {
        tracing::debug!(url = %config.server_url, "creating client");
        let transport = ReqwestTransport::new(config, &options)?;
        Ok(Self::with_transport(Arc::new(transport), options))
    }

    /// Builds the facade over any [`Transport`].
    pub fn with_transport(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        let knowledge = Knowledge::new(transport.clone(), options.upload_concurrency);
        Self {
            folders: Folders::new(transport.clone()),
            chats: Chats::new(transport, knowledge.clone()),
            knowledge,
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}
