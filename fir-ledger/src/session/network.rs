//! Displayed network state.

use serde::{Deserialize, Serialize};

use crate::types::ChainId;

/// What the user is told about the wallet's network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct NetworkStatus {
    /// A wallet provider is available
    pub provider_present: bool,
    /// Last chain reported by the wallet
    #[cfg_attr(feature = "typescript", ts(type = "number | null"))]
    pub chain_id: Option<ChainId>,
    pub chain_name: String,
    /// The wallet is on the registry's chain
    pub is_correct: bool,
}

impl NetworkStatus {
    /// Status before the wallet has been asked anything
    pub fn unknown(provider_present: bool) -> Self {
        Self {
            provider_present,
            chain_id: None,
            chain_name: "Unknown".to_string(),
            is_correct: false,
        }
    }

    /// Status for a reported chain against the target
    pub fn evaluate(chain: ChainId, target: ChainId) -> Self {
        Self {
            provider_present: true,
            chain_id: Some(chain),
            chain_name: chain.name().to_string(),
            is_correct: chain == target,
        }
    }

    /// One-line summary for status bars
    pub fn summary(&self, target: ChainId) -> String {
        if !self.provider_present {
            "No wallet provider detected".to_string()
        } else if self.is_correct {
            format!("Connected to {}", self.chain_name)
        } else {
            format!(
                "Wrong network: {} (switch to {})",
                self.chain_name,
                target.name()
            )
        }
    }
}
