use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One side of a match.
///
/// The rating columns are NULL until a counted result is processed, and stay
/// NULL forever for ad hoc matches.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "match_participant")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub match_id: i32,
    #[sea_orm(belongs_to, from = "match_id", to = "id")]
    pub arena_match: HasOne<super::arena_match::Entity>,

    #[sea_orm(indexed)]
    pub agent_id: i32,
    /// 1 or 2.
    pub participant_number: i32,

    pub starting_elo: Option<i32>,
    pub elo_delta: Option<i32>,
    pub resultant_elo: Option<i32>,

    /// Whether the agent's data blob is shipped to the worker at all.
    pub use_data: bool,
    /// Whether the worker uploads the data blob back afterwards. At most one
    /// running match may hold this per agent.
    pub update_data: bool,
}

impl ActiveModelBehavior for ActiveModel {}
