//! Campaign progress metrics.
//!
//! Derived on every read from the campaign's lines; never stored.

use serde::{Deserialize, Serialize};

use crate::state::DeliveryState;

/// What progress needs to know about one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineProgress {
    pub has_mail: bool,
    pub effective_state: DeliveryState,
}

/// Line counts of one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub created: usize,
    pub sent: usize,
}

impl Progress {
    pub fn tally(lines: impl IntoIterator<Item = LineProgress>) -> Self {
        lines.into_iter().fold(Self::default(), |mut acc, line| {
            acc.total += 1;
            if line.has_mail {
                acc.created += 1;
            }
            if line.effective_state.is_sent() {
                acc.sent += 1;
            }
            acc
        })
    }

    /// Percentage of lines with a mail; 0 for a campaign without lines.
    pub fn created_percent(&self) -> f64 {
        percent(self.created, self.total)
    }

    /// Percentage of lines whose effective state is `sent`; 0 without lines.
    pub fn sent_percent(&self) -> f64 {
        percent(self.sent, self.total)
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * part as f64 / total as f64
}
