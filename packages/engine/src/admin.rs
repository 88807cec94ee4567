//! Administrative operations: competition lifecycle, enrollment, ad hoc
//! match requests, and the administrative result cancel.

use chrono::Utc;
use ladder_common::{AdminCommand, CompetitionStatus, MatchOutcome, status};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{info, instrument, warn};

use crate::entity::{
    DEFAULT_DIVISION, arena_match, competition, competition_participant, match_participant,
    match_result, round,
};
use crate::error::LadderError;
use crate::progression;
use crate::state::LadderState;

/// Parameters for a new competition. Unset tunables fall back to the
/// configuration snapshot and are stamped onto the row, so later config edits
/// never change a competition already in flight.
#[derive(Clone, Debug, Default)]
pub struct NewCompetition {
    pub name: String,
    pub target_n_divisions: Option<i32>,
    pub target_division_size: Option<i32>,
    pub n_placements: Option<i32>,
    pub max_active_rounds: Option<i32>,
    pub starting_elo: Option<i32>,
}

/// An ad hoc match request, served by the dispatcher ahead of round matches.
#[derive(Clone, Debug)]
pub struct AdHocMatchRequest {
    pub agent_1_id: i32,
    pub agent_2_id: i32,
    pub map_id: i32,
    /// Scope the request to a competition: it is then only dispatched while
    /// that competition accepts dispatch. Unscoped requests dispatch always.
    pub competition_id: Option<i32>,
    pub requested_by: Option<String>,
}

pub async fn create_competition(
    state: &LadderState,
    new: NewCompetition,
) -> Result<competition::Model, LadderError> {
    let s = &state.settings;
    let comp = competition::ActiveModel {
        name: Set(new.name),
        status: Set(CompetitionStatus::Created),
        n_divisions: Set(1),
        target_n_divisions: Set(new.target_n_divisions.unwrap_or(s.target_n_divisions)),
        target_division_size: Set(new.target_division_size.unwrap_or(s.target_division_size)),
        n_placements: Set(new.n_placements.unwrap_or(s.n_placements)),
        max_active_rounds: Set(new.max_active_rounds.unwrap_or(s.max_active_rounds)),
        starting_elo: Set(new.starting_elo.unwrap_or(s.starting_elo)),
        created_at: Set(Utc::now()),
        closed_at: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    info!(competition_id = comp.id, name = %comp.name, "competition created");
    Ok(comp)
}

/// Drive the competition lifecycle through the fixed state table.
///
/// `Close` puts an open competition into Closing; if nothing is left to
/// drain it is closed on the spot.
#[instrument(skip(state))]
pub async fn apply_command(
    state: &LadderState,
    competition_id: i32,
    command: AdminCommand,
) -> Result<CompetitionStatus, LadderError> {
    let txn = state.db.begin().await?;

    let comp = competition::Entity::find_by_id(competition_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(LadderError::CompetitionNotFound(competition_id))?;

    let next = status::apply_command(comp.status, command)?;

    let mut active: competition::ActiveModel = comp.clone().into();
    active.status = Set(next);
    let updated = active.update(&txn).await?;

    let mut final_status = next;
    if next == CompetitionStatus::Closing {
        let incomplete = round::Entity::find()
            .filter(round::Column::CompetitionId.eq(competition_id))
            .filter(round::Column::Complete.eq(false))
            .count(&txn)
            .await?;
        if incomplete == 0 {
            progression::close_competition(&txn, &updated).await?;
            final_status = CompetitionStatus::Closed;
        }
    }

    txn.commit().await?;
    info!(competition_id, from = %comp.status, to = %final_status, "lifecycle command applied");
    Ok(final_status)
}

/// Enroll an agent. Re-joining a competition it previously left reactivates
/// the old participation, rating and history intact.
#[instrument(skip(state))]
pub async fn join_competition(
    state: &LadderState,
    competition_id: i32,
    agent_id: i32,
) -> Result<(), LadderError> {
    let txn = state.db.begin().await?;

    // Locked so an enrollment cannot slip in under a concurrent close.
    let comp = competition::Entity::find_by_id(competition_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(LadderError::CompetitionNotFound(competition_id))?;
    if matches!(
        comp.status,
        CompetitionStatus::Closing | CompetitionStatus::Closed | CompetitionStatus::Frozen
    ) {
        return Err(LadderError::EnrollmentClosed(competition_id, comp.status));
    }

    state
        .agents
        .agent(agent_id)
        .await?
        .ok_or(LadderError::AgentNotFound(agent_id))?;

    let existing = competition_participant::Entity::find_by_id((competition_id, agent_id))
        .one(&txn)
        .await?;
    match existing {
        Some(p) if p.active => {}
        Some(p) => {
            let mut active: competition_participant::ActiveModel = p.into();
            active.active = Set(true);
            active.update(&txn).await?;
        }
        None => {
            competition_participant::ActiveModel {
                competition_id: Set(competition_id),
                agent_id: Set(agent_id),
                elo: Set(comp.starting_elo),
                division_num: Set(DEFAULT_DIVISION),
                match_count: Set(0),
                in_placement: Set(true),
                active: Set(true),
                joined_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;
    info!(competition_id, agent_id, "agent enrolled");
    Ok(())
}

/// Deactivate a participant. Its history and rating stay in place; the next
/// rebalance redistributes its division slot.
pub async fn remove_participant(
    state: &LadderState,
    competition_id: i32,
    agent_id: i32,
) -> Result<(), LadderError> {
    let p = competition_participant::Entity::find_by_id((competition_id, agent_id))
        .one(&state.db)
        .await?
        .ok_or(LadderError::ParticipantNotFound {
            competition_id,
            agent_id,
        })?;
    if p.active {
        let mut active: competition_participant::ActiveModel = p.into();
        active.active = Set(false);
        active.update(&state.db).await?;
        info!(competition_id, agent_id, "participant deactivated");
    }
    Ok(())
}

/// Create a round-less "requested" match.
#[instrument(skip(state, request), fields(agent_1 = request.agent_1_id, agent_2 = request.agent_2_id))]
pub async fn request_adhoc_match(
    state: &LadderState,
    request: AdHocMatchRequest,
) -> Result<arena_match::Model, LadderError> {
    if request.agent_1_id == request.agent_2_id {
        return Err(LadderError::InvariantViolation(
            "an agent cannot play itself".into(),
        ));
    }

    let rec_1 = state
        .agents
        .agent(request.agent_1_id)
        .await?
        .ok_or(LadderError::AgentNotFound(request.agent_1_id))?;
    let rec_2 = state
        .agents
        .agent(request.agent_2_id)
        .await?
        .ok_or(LadderError::AgentNotFound(request.agent_2_id))?;
    let map = state
        .maps
        .map(request.map_id)
        .await?
        .ok_or(LadderError::MapNotFound(request.map_id))?;

    let txn = state.db.begin().await?;

    if let Some(competition_id) = request.competition_id {
        competition::Entity::find_by_id(competition_id)
            .one(&txn)
            .await?
            .ok_or(LadderError::CompetitionNotFound(competition_id))?;
    }

    let new_match = arena_match::ActiveModel {
        round_id: Set(None),
        competition_id: Set(request.competition_id),
        map_id: Set(map.id),
        map_name: Set(map.name),
        created_at: Set(Utc::now()),
        started: Set(None),
        first_started: Set(None),
        assigned_worker_id: Set(None),
        requested_by: Set(request.requested_by),
        require_trusted: Set(rec_1.requires_trusted_worker || rec_2.requires_trusted_worker),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    // Requested matches read the data blob but never write it back, so they
    // are exempt from the update-exclusivity hold and run freely in parallel.
    for (number, record) in [(1, &rec_1), (2, &rec_2)] {
        match_participant::ActiveModel {
            match_id: Set(new_match.id),
            agent_id: Set(record.id),
            participant_number: Set(number),
            starting_elo: Set(None),
            elo_delta: Set(None),
            resultant_elo: Set(None),
            use_data: Set(record.data_enabled),
            update_data: Set(false),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    info!(match_id = new_match.id, "ad hoc match requested");
    Ok(new_match)
}

/// The administrative exception to result immutability: rewrite an existing
/// result to MatchCancelled. Ratings already applied are not reverted here;
/// run `recalculate_ratings` afterwards to repair the history.
#[instrument(skip(state))]
pub async fn cancel_result(state: &LadderState, match_id: i32) -> Result<(), LadderError> {
    let txn = state.db.begin().await?;

    arena_match::Entity::find_by_id(match_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(LadderError::MatchNotFound(match_id))?;

    let result = match_result::Entity::find()
        .filter(match_result::Column::MatchId.eq(match_id))
        .one(&txn)
        .await?
        .ok_or(LadderError::ResultNotFound(match_id))?;

    if result.outcome == MatchOutcome::MatchCancelled {
        txn.rollback().await?;
        return Ok(());
    }

    let counted = result.outcome.counts_for_rating();
    let mut active: match_result::ActiveModel = result.into();
    active.outcome = Set(MatchOutcome::MatchCancelled);
    active.winner_agent_id = Set(None);
    active.update(&txn).await?;

    txn.commit().await?;
    if counted {
        warn!(
            match_id,
            "cancelled a counted result; ratings need a recompute"
        );
    }
    info!(match_id, "result administratively cancelled");
    Ok(())
}
