use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single head-to-head match.
///
/// `round_id` is NULL for ad hoc requested matches. `competition_id` is
/// denormalized for round matches and optional for requested ones; rating
/// updates apply only to round matches.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "arena_match")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub round_id: Option<i32>,
    #[sea_orm(belongs_to, from = "round_id", to = "id")]
    pub round: BelongsTo<Option<super::round::Entity>>,

    pub competition_id: Option<i32>,
    #[sea_orm(belongs_to, from = "competition_id", to = "id")]
    pub competition: BelongsTo<Option<super::competition::Entity>>,

    pub map_id: i32,
    /// Snapshot of the map name at creation time, for logs and listings.
    pub map_name: String,

    pub created_at: DateTimeUtc,
    /// Stamped by the start guard; a started match is running until it has a result.
    #[sea_orm(indexed)]
    pub started: Option<DateTimeUtc>,
    /// Set once, on the first successful start.
    pub first_started: Option<DateTimeUtc>,
    pub assigned_worker_id: Option<Uuid>,

    /// Opaque identity of whoever requested an ad hoc match.
    pub requested_by: Option<String>,
    /// True if either participant's artifact may only run on trusted workers.
    #[sea_orm(default_value = false)]
    pub require_trusted: bool,

    #[sea_orm(has_many)]
    pub participants: HasMany<super::match_participant::Entity>,

    #[sea_orm(has_one)]
    pub result: HasOne<super::match_result::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
