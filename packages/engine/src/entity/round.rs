use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One generation of round-robin pairings within a competition.
/// Created by the round generator; completion state is maintained solely by
/// the progression tracker.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "round")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub competition_id: i32,
    #[sea_orm(belongs_to, from = "competition_id", to = "id")]
    pub competition: HasOne<super::competition::Entity>,

    /// Per-competition sequence number, starting at 1.
    pub number: i32,

    pub started: DateTimeUtc,
    pub finished: Option<DateTimeUtc>,
    /// True iff every child match has a result.
    #[sea_orm(default_value = false, indexed)]
    pub complete: bool,

    #[sea_orm(has_many)]
    pub matches: HasMany<super::arena_match::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
