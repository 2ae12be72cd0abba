//! Call models for the per-call lifecycle.
//!
//! A call moves through `initiated -> ringing -> in_progress` and ends in
//! exactly one terminal state. Transitions are monotonic and the transcript
//! is append-only; once terminal, only post-call analysis fields may still
//! be attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Lifecycle status of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Failed,
    Voicemail,
    NoAnswer,
    Busy,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Voicemail => "voicemail",
            Self::NoAnswer => "no_answer",
            Self::Busy => "busy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "initiated" => Some(Self::Initiated),
            "ringing" => Some(Self::Ringing),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "voicemail" => Some(Self::Voicemail),
            "no_answer" => Some(Self::NoAnswer),
            "busy" => Some(Self::Busy),
            _ => None,
        }
    }

    /// Whether no further transition can occur from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Voicemail | Self::NoAnswer | Self::Busy
        )
    }

    /// Whether a transition to `next` is valid.
    ///
    /// The machine only moves forward: a call may skip `ringing` (some
    /// providers answer without an alert callback) and may drop to a terminal
    /// state from any live state, but never moves backwards or out of a
    /// terminal state.
    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self {
            Self::Initiated => next != Self::Initiated,
            Self::Ringing => next != Self::Initiated && next != Self::Ringing,
            Self::InProgress => next.is_terminal(),
            _ => false,
        }
    }
}

/// Why the call ended, as reported by the provider or the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Normal hangup after a conversation.
    Hangup,
    /// No media was ever established; the lead never picked up.
    NoMedia,
    /// An answering machine tone was detected.
    VoicemailTone,
    BusySignal,
    ProviderError,
    /// The max-duration watchdog fired before the provider reported an end.
    Timeout,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hangup => "hangup",
            Self::NoMedia => "no_media",
            Self::VoicemailTone => "voicemail_tone",
            Self::BusySignal => "busy_signal",
            Self::ProviderError => "provider_error",
            Self::Timeout => "timeout",
        }
    }

    /// The terminal status implied by this disconnect reason.
    pub fn terminal_status(&self) -> CallStatus {
        match self {
            Self::Hangup => CallStatus::Completed,
            Self::NoMedia => CallStatus::NoAnswer,
            Self::VoicemailTone => CallStatus::Voicemail,
            Self::BusySignal => CallStatus::Busy,
            Self::ProviderError | Self::Timeout => CallStatus::Failed,
        }
    }
}

/// Who spoke a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    Lead,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Lead => "lead",
        }
    }
}

/// One utterance in a call transcript.
///
/// Timestamps are server-assigned at append time; ordering is append order,
/// not client-claimed time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// How interested the lead sounded, per post-call analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestLevel {
    Hot,
    Warm,
    Cold,
    None,
}

impl InterestLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "hot" => Some(Self::Hot),
            "warm" => Some(Self::Warm),
            "cold" => Some(Self::Cold),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Business outcome of a call, per post-call analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    MeetingBooked,
    CallbackRequested,
    NotInterested,
    NoContact,
}

impl CallOutcome {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "meeting_booked" => Some(Self::MeetingBooked),
            "callback_requested" => Some(Self::CallbackRequested),
            "not_interested" => Some(Self::NotInterested),
            "no_contact" => Some(Self::NoContact),
            _ => None,
        }
    }
}

/// Live lifecycle record of one outbound call.
///
/// Owned exclusively by the call state machine until a terminal state is
/// reached; ownership then transfers to durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Unique identifier for this call.
    pub id: String,
    /// Identifier assigned by the telephony provider once placed.
    pub provider_call_id: Option<String>,
    /// The lead being called.
    pub lead_id: String,
    /// The script driving the conversation.
    pub script_id: String,
    /// Current lifecycle status.
    pub status: CallStatus,
    /// Ordered utterances, oldest first.
    pub transcript: Vec<TranscriptEntry>,
    /// Talk time in seconds, computed at finalize.
    pub duration_seconds: Option<u64>,
    /// Why the call ended.
    pub disconnect_reason: Option<DisconnectReason>,
    /// Post-call analysis fields, attached asynchronously after terminal.
    pub ai_summary: Option<String>,
    pub interest_level: Option<InterestLevel>,
    pub outcome: Option<CallOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When media was established, for duration computation.
    pub answered_at: Option<DateTime<Utc>>,
}

impl CallRecord {
    /// Create a new call record in the `initiated` state.
    pub fn new(lead_id: &str, script_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_call_id: None,
            lead_id: lead_id.to_string(),
            script_id: script_id.to_string(),
            status: CallStatus::Initiated,
            transcript: Vec::new(),
            duration_seconds: None,
            disconnect_reason: None,
            ai_summary: None,
            interest_level: None,
            outcome: None,
            created_at: now,
            updated_at: now,
            answered_at: None,
        }
    }

    /// Apply a status transition if valid.
    ///
    /// Returns true if the transition was applied. Invalid transitions are
    /// no-ops, which makes duplicate and out-of-order provider events safe
    /// to replay.
    pub fn transition_to(&mut self, next: CallStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        if next == CallStatus::InProgress {
            self.answered_at = Some(Utc::now());
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Append an utterance with a server-assigned timestamp.
    ///
    /// Only permitted while the call is `in_progress`.
    pub fn append_utterance(&mut self, speaker: Speaker, text: &str) -> OrchestratorResult<()> {
        if self.status != CallStatus::InProgress {
            return Err(OrchestratorError::InvalidTransition(format!(
                "cannot append transcript to call {} in state {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.transcript.push(TranscriptEntry {
            speaker,
            text: text.to_string(),
            timestamp: Utc::now(),
        });
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Talk time from answer until now, zero if never answered.
    pub fn elapsed_talk_seconds(&self) -> u64 {
        self.answered_at
            .map(|t| (Utc::now() - t).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
