use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

use crate::config::env_u64;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Process-wide blocking client shared by the feed fetchers and the KV store.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        let timeout = env_u64("HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS).clamp(2, 60);
        Client::builder()
            .timeout(Duration::from_secs(timeout))
            .user_agent(concat!("courtside/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")
    })
}
