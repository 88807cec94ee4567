//! Reacting to results: ratings, round completion, competition closing.

use chrono::Utc;
use ladder_common::{
    CompetitionStatus, MatchOutcome, RatedParticipant, ResultRecord, ResultSubmission,
};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::*;
use tracing::{info, instrument};

use crate::divisions;
use crate::entity::{
    arena_match, competition, competition_participant, match_participant, match_result, round,
};
use crate::error::LadderError;
use crate::rating;
use crate::state::LadderState;

/// Record a worker's outcome report for a match.
///
/// One transaction covers the result row, both rating updates and any round
/// completion they trigger: it either all lands or none of it does. The match
/// row lock makes a duplicate report a clean `ResultAlreadyRecorded` instead
/// of a double rating update.
#[instrument(skip(state, submission), fields(match_id = submission.match_id, outcome = %submission.outcome))]
pub async fn submit_result(
    state: &LadderState,
    submission: ResultSubmission,
) -> Result<ResultRecord, LadderError> {
    let match_id = submission.match_id;
    let txn = state.db.begin().await?;

    let m = arena_match::Entity::find_by_id(match_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(LadderError::MatchNotFound(match_id))?;
    if m.started.is_none() {
        return Err(LadderError::MatchNotStarted(match_id));
    }

    // Rated updates and round completion both reach competition-scoped state
    // (participation rows, the division layout). Taking the competition lock
    // here gives every writer the same order (match, competition,
    // participants, round), so two results landing together cannot deadlock
    // against a rebalance.
    if let Some(competition_id) = m.competition_id {
        competition::Entity::find_by_id(competition_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(LadderError::CompetitionNotFound(competition_id))?;
    }

    let existing = match_result::Entity::find()
        .filter(match_result::Column::MatchId.eq(match_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(LadderError::ResultAlreadyRecorded(match_id));
    }

    let participants = match_participant::Entity::find()
        .filter(match_participant::Column::MatchId.eq(match_id))
        .order_by_asc(match_participant::Column::ParticipantNumber)
        .all(&txn)
        .await?;
    if participants.len() != 2 || participants[0].agent_id == participants[1].agent_id {
        return Err(LadderError::InvariantViolation(format!(
            "match {match_id} does not have two distinct participants"
        )));
    }

    let outcome = submission.outcome;
    let winner_agent_id = outcome
        .winner_participant()
        .map(|number| participants[(number - 1) as usize].agent_id);

    let now = Utc::now();
    let result = match_result::ActiveModel {
        match_id: Set(match_id),
        outcome: Set(outcome),
        winner_agent_id: Set(winner_agent_id),
        replay_blob: Set(submission.replay_blob),
        log_blob: Set(submission.log_blob),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    // Ad hoc matches (no round) are never rated; their participants' rating
    // columns stay NULL.
    let mut ratings = Vec::new();
    if outcome.counts_for_rating() && m.round_id.is_some() {
        let competition_id = m.competition_id.ok_or_else(|| {
            LadderError::InvariantViolation(format!("round match {match_id} has no competition"))
        })?;
        ratings = apply_rating(&txn, state, competition_id, &participants, outcome).await?;
    }

    let mut round_completed = false;
    if let Some(round_id) = m.round_id {
        round_completed = complete_round_if_drained(&txn, round_id).await?;
    }

    txn.commit().await?;
    info!(
        match_id,
        result_id = result.id,
        round_completed,
        "result recorded"
    );

    Ok(ResultRecord {
        result_id: result.id,
        match_id,
        outcome,
        winner_agent_id,
        ratings,
        round_completed,
        created_at: now,
    })
}

/// Apply the zero-sum rating update and bump both participants' progress.
async fn apply_rating(
    txn: &DatabaseTransaction,
    state: &LadderState,
    competition_id: i32,
    participants: &[match_participant::Model],
    outcome: MatchOutcome,
) -> Result<Vec<RatedParticipant>, LadderError> {
    let comp = competition::Entity::find_by_id(competition_id)
        .one(txn)
        .await?
        .ok_or(LadderError::CompetitionNotFound(competition_id))?;

    // Lock the two participation rows in agent order so concurrent results
    // for overlapping agent pairs cannot deadlock.
    let mut agent_ids = [participants[0].agent_id, participants[1].agent_id];
    agent_ids.sort_unstable();
    let mut locked = Vec::with_capacity(2);
    for agent_id in agent_ids {
        let row = competition_participant::Entity::find_by_id((competition_id, agent_id))
            .lock(LockType::Update)
            .one(txn)
            .await?
            .ok_or(LadderError::ParticipantNotFound {
                competition_id,
                agent_id,
            })?;
        locked.push(row);
    }
    let (standing_1, standing_2) = if locked[0].agent_id == participants[0].agent_id {
        (locked[0].clone(), locked[1].clone())
    } else {
        (locked[1].clone(), locked[0].clone())
    };

    let delta_1 =
        rating::delta_for_participant_one(standing_1.elo, standing_2.elo, outcome, state.settings.elo_k)?;

    let mut rated = Vec::with_capacity(2);
    for (mp, standing, delta) in [
        (&participants[0], standing_1, delta_1),
        (&participants[1], standing_2, -delta_1),
    ] {
        let starting = standing.elo;
        let resultant = starting + delta;
        let match_count = standing.match_count + 1;

        let mut participation: competition_participant::ActiveModel = standing.into();
        participation.elo = Set(resultant);
        participation.match_count = Set(match_count);
        participation.in_placement = Set(match_count < comp.n_placements);
        participation.update(txn).await?;

        let mut mp_active: match_participant::ActiveModel = mp.clone().into();
        mp_active.starting_elo = Set(Some(starting));
        mp_active.elo_delta = Set(Some(delta));
        mp_active.resultant_elo = Set(Some(resultant));
        mp_active.update(txn).await?;

        rated.push(RatedParticipant {
            agent_id: mp.agent_id,
            starting_elo: starting,
            elo_delta: delta,
            resultant_elo: resultant,
        });
    }
    Ok(rated)
}

/// Flip the round to complete if its last result just landed, then react at
/// the competition level: close a draining competition, or rebalance
/// divisions. Returns whether the round completed in this call.
async fn complete_round_if_drained(
    txn: &DatabaseTransaction,
    round_id: i32,
) -> Result<bool, LadderError> {
    let r = round::Entity::find_by_id(round_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| {
            LadderError::InvariantViolation(format!("round {round_id} missing for its match"))
        })?;
    if r.complete {
        return Ok(false);
    }

    let match_ids: Vec<i32> = arena_match::Entity::find()
        .filter(arena_match::Column::RoundId.eq(Some(round_id)))
        .select_only()
        .column(arena_match::Column::Id)
        .into_tuple()
        .all(txn)
        .await?;
    let resulted = match_result::Entity::find()
        .filter(match_result::Column::MatchId.is_in(match_ids.clone()))
        .count(txn)
        .await?;
    if resulted < match_ids.len() as u64 {
        return Ok(false);
    }

    let mut active: round::ActiveModel = r.clone().into();
    active.complete = Set(true);
    active.finished = Set(Some(Utc::now()));
    active.update(txn).await?;
    info!(round_id, competition_id = r.competition_id, "round complete");

    let comp = competition::Entity::find_by_id(r.competition_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(LadderError::CompetitionNotFound(r.competition_id))?;

    match comp.status {
        CompetitionStatus::Closing => {
            let remaining = round::Entity::find()
                .filter(round::Column::CompetitionId.eq(comp.id))
                .filter(round::Column::Complete.eq(false))
                .count(txn)
                .await?;
            if remaining == 0 {
                close_competition(txn, &comp).await?;
            }
        }
        CompetitionStatus::Open | CompetitionStatus::Paused => {
            divisions::rebalance(txn, &comp).await?;
        }
        _ => {}
    }

    Ok(true)
}

/// Mark a competition closed and deactivate every participant.
pub(crate) async fn close_competition<C: ConnectionTrait>(
    txn: &C,
    comp: &competition::Model,
) -> Result<(), LadderError> {
    let mut active: competition::ActiveModel = comp.clone().into();
    active.status = Set(CompetitionStatus::Closed);
    active.closed_at = Set(Some(Utc::now()));
    active.update(txn).await?;

    competition_participant::Entity::update_many()
        .col_expr(
            competition_participant::Column::Active,
            Expr::value(false),
        )
        .filter(competition_participant::Column::CompetitionId.eq(comp.id))
        .exec(txn)
        .await?;

    info!(competition_id = comp.id, "competition closed");
    Ok(())
}
