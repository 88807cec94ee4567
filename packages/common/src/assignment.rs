use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::MatchOutcome;

/// Version of the worker-facing payload shapes in this module.
///
/// These types are a wire contract with external arena clients. Adding a
/// required field, removing a field, or changing a field's meaning is a
/// breaking change and must bump this number; optional additions are not.
pub const WIRE_VERSION: u16 = 1;

/// The caller identity attached to a `request_match` call.
///
/// Workers are authenticated by an outer layer; the engine only sees the
/// resolved identity and trust flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerContext {
    pub id: Uuid,
    pub name: String,
    /// Trusted workers may run matches whose participants require it.
    pub trusted: bool,
}

/// Location and content hash of an artifact held by the blob store.
/// The engine never inspects artifact content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Opaque download handle understood by the blob store.
    pub location: String,
    /// Content hash the worker verifies after download.
    pub content_hash: String,
}

/// The map a match is played on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapDescriptor {
    pub id: i32,
    pub name: String,
    /// Opaque download handle for the map file.
    pub location: String,
}

/// One side of an assigned match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignedAgent {
    /// 1 or 2; outcome values are phrased in terms of this number.
    pub participant_number: i32,
    pub agent_id: i32,
    pub name: String,
    pub package: ArtifactDescriptor,
    /// The agent's mutable data blob, if it has one and it is enabled.
    pub data: Option<ArtifactDescriptor>,
    /// Whether the worker should upload the data blob back after the match.
    pub update_data: bool,
}

/// Everything a worker needs to run one match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchAssignment {
    pub match_id: i32,
    pub map: MapDescriptor,
    /// Exactly two entries, ordered by participant number.
    pub agents: Vec<AssignedAgent>,
}

/// Why no match was handed out. Informational, never an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoWorkReason {
    /// Dispatch is switched off in the configuration.
    LadderDisabled,
    /// Every competition was scanned and nothing was startable.
    NoMatchesAvailable,
}

/// Reply to a `request_match` call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextMatchReply {
    Match(MatchAssignment),
    NoWork { reason: NoWorkReason },
}

/// A worker's report of a finished match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultSubmission {
    pub match_id: i32,
    pub outcome: MatchOutcome,
    /// Opaque handle of the uploaded replay, if any.
    pub replay_blob: Option<String>,
    /// Opaque handle of the uploaded match log, if any.
    pub log_blob: Option<String>,
}

/// Rating movement of one participant, echoed back after a rated result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedParticipant {
    pub agent_id: i32,
    pub starting_elo: i32,
    pub elo_delta: i32,
    pub resultant_elo: i32,
}

/// Acknowledgement of a recorded result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultRecord {
    pub result_id: i32,
    pub match_id: i32,
    pub outcome: MatchOutcome,
    pub winner_agent_id: Option<i32>,
    /// Empty for outcomes that do not count for rating and for ad hoc matches.
    pub ratings: Vec<RatedParticipant>,
    /// Whether this result was the one that completed its round.
    pub round_completed: bool,
    pub created_at: DateTime<Utc>,
}
