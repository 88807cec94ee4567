use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One agent's standing in one competition. Created on enrollment, mutated on
/// every counted result, deactivated when the competition closes or the agent
/// is removed.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition_participant")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub competition_id: i32,
    #[sea_orm(primary_key)]
    pub agent_id: i32,
    #[sea_orm(belongs_to, from = "competition_id", to = "id")]
    pub competition: HasOne<super::competition::Entity>,

    pub elo: i32,
    /// 0 (`DEFAULT_DIVISION`) while unassigned or in placement; ranked
    /// divisions start at 1.
    #[sea_orm(default_value = 0, indexed)]
    pub division_num: i32,
    /// Counted (rated) matches played.
    pub match_count: i32,
    pub in_placement: bool,
    pub active: bool,

    pub joined_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
