use std::sync::{Arc, RwLock};

use domain_wrap_core::{types::short_address, IdentityProvider};
use metrics::counter;
use serde::Serialize;
use tracing::info;

/// Mock wallet that connects to a fixed, configured address.
#[derive(Clone)]
pub struct WalletSession {
    address: String,
    connected: Arc<RwLock<bool>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_address: Option<String>,
}

impl WalletSession {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connected: Arc::new(RwLock::new(false)),
        }
    }

    pub fn connect(&self) -> WalletStatus {
        let mut connected = self.connected.write().unwrap_or_else(|e| e.into_inner());
        if !*connected {
            *connected = true;
            counter!("wallet_connections_total").increment(1);
            info!(stage = "wallet", address = %short_address(&self.address), "wallet connected");
        }
        drop(connected);
        self.status()
    }

    pub fn disconnect(&self) {
        let mut connected = self.connected.write().unwrap_or_else(|e| e.into_inner());
        if *connected {
            *connected = false;
            info!(stage = "wallet", "wallet disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> WalletStatus {
        if self.is_connected() {
            WalletStatus {
                connected: true,
                address: Some(self.address.clone()),
                short_address: Some(short_address(&self.address)),
            }
        } else {
            WalletStatus {
                connected: false,
                address: None,
                short_address: None,
            }
        }
    }
}

impl IdentityProvider for WalletSession {
    fn actor_identity(&self) -> Option<String> {
        self.is_connected().then(|| self.address.clone())
    }
}
