//! Lifecycle events delivered by the telephony provider.

use serde::{Deserialize, Serialize};

use crate::models::{DisconnectReason, Speaker};

/// One provider callback for a call.
///
/// Delivery is at-least-once and unordered; applying an event that is not
/// valid from the call's current state is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProviderEvent {
    /// The destination is being alerted.
    Ringing,
    /// Media established; the conversation is live.
    Answered,
    /// One utterance was transcribed.
    Speech { speaker: Speaker, text: String },
    /// The call ended.
    Hangup { reason: DisconnectReason },
    /// The provider hit an error mid-call.
    Error { message: String },
}
