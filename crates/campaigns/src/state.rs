use serde::{Deserialize, Serialize};

use mailcamp_core::{DomainError, DomainResult};

/// Delivery lifecycle shared by campaign lines and mailbox entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Not yet prepared for sending.
    #[default]
    New,
    ToSend,
    Sent,
    Error,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::New => "new",
            DeliveryState::ToSend => "to_send",
            DeliveryState::Sent => "sent",
            DeliveryState::Error => "error",
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryState::Sent)
    }

    /// Validate a transition. Nothing leaves `Sent`.
    pub fn transition(self, next: DeliveryState) -> DomainResult<DeliveryState> {
        if self.is_sent() && !next.is_sent() {
            return Err(DomainError::invariant(format!(
                "delivery state cannot regress from sent to {}",
                next.as_str()
            )));
        }
        Ok(next)
    }
}

impl core::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
