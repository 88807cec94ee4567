use ladder_common::MatchOutcome;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The one-and-only result of a match. Immutable once created, except for the
/// administrative cancel path which rewrites the outcome to MatchCancelled.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "match_result")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub match_id: i32,
    #[sea_orm(belongs_to, from = "match_id", to = "id")]
    pub arena_match: HasOne<super::arena_match::Entity>,

    pub outcome: MatchOutcome,
    pub winner_agent_id: Option<i32>,

    /// Opaque blob-store handles; content is never inspected here.
    pub replay_blob: Option<String>,
    pub log_blob: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
