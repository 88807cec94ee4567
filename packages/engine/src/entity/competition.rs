use ladder_common::CompetitionStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    pub status: CompetitionStatus,

    /// Current division count, ≥ 1. Changed only by the division balancer.
    pub n_divisions: i32,
    pub target_n_divisions: i32,
    pub target_division_size: i32,
    /// Rated matches required before a participant leaves placement.
    pub n_placements: i32,
    /// Upper bound on concurrently incomplete rounds.
    pub max_active_rounds: i32,
    /// Rating every participant starts from; also the baseline for recomputes.
    pub starting_elo: i32,

    #[sea_orm(has_many)]
    pub rounds: HasMany<super::round::Entity>,

    #[sea_orm(has_many)]
    pub participants: HasMany<super::competition_participant::Entity>,

    pub created_at: DateTimeUtc,
    pub closed_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
