//! The "what should I play next?" orchestrator.

use std::collections::HashSet;

use ladder_common::{
    AssignedAgent, CompetitionStatus, MapDescriptor, MatchAssignment, NextMatchReply,
    NoWorkReason, WorkerContext,
};
use sea_orm::*;
use tracing::{debug, info, instrument};

use crate::entity::{arena_match, competition, match_participant, match_result, round};
use crate::error::{GenerateRoundError, LadderError};
use crate::guard;
use crate::rounds;
use crate::state::LadderState;

/// Hand the worker a safe-to-run match, or a soft "no work right now".
///
/// Per-competition failures (no maps, not enough agents, round limit, not
/// open) are logged and skipped; only database/registry faults surface as
/// errors. Losing a start race to another worker is silent; the scan simply
/// moves to the next candidate.
#[instrument(skip(state, worker), fields(worker_id = %worker.id, worker_name = %worker.name))]
pub async fn next_match(
    state: &LadderState,
    worker: &WorkerContext,
) -> Result<NextMatchReply, LadderError> {
    let settings = &state.settings;

    if !settings.enabled {
        info!("ladder is disabled, nothing dispatched");
        return Ok(NextMatchReply::NoWork {
            reason: NoWorkReason::LadderDisabled,
        });
    }

    if settings.reissue_unfinished
        && let Some(unfinished) = find_unfinished_assignment(state, worker).await?
    {
        info!(match_id = unfinished.id, "reissuing unfinished match");
        return Ok(NextMatchReply::Match(
            build_assignment(state, &unfinished).await?,
        ));
    }

    // Globally requested matches are not tied to any competition's lifecycle.
    let global_requests = requested_candidates(&state.db, None).await?;
    if let Some(started) = try_candidates(state, worker, global_requests).await? {
        return Ok(NextMatchReply::Match(build_assignment(state, &started).await?));
    }

    let competitions = competition::Entity::find()
        .filter(competition::Column::Status.is_in([
            CompetitionStatus::Open,
            CompetitionStatus::Closing,
        ]))
        .order_by_asc(competition::Column::Id)
        .all(&state.db)
        .await?;

    for comp in competitions {
        if let Some(started) = dispatch_for_competition(state, worker, &comp).await? {
            return Ok(NextMatchReply::Match(build_assignment(state, &started).await?));
        }
    }

    debug!("all competitions exhausted");
    Ok(NextMatchReply::NoWork {
        reason: NoWorkReason::NoMatchesAvailable,
    })
}

/// Try everything one competition has to offer: its requested matches first,
/// then round matches, then a freshly generated round.
async fn dispatch_for_competition(
    state: &LadderState,
    worker: &WorkerContext,
    comp: &competition::Model,
) -> Result<Option<arena_match::Model>, LadderError> {
    let requests = requested_candidates(&state.db, Some(comp.id)).await?;
    if let Some(started) = try_candidates(state, worker, requests).await? {
        return Ok(Some(started));
    }

    if let Some(started) = try_round_matches(state, worker, comp).await? {
        return Ok(Some(started));
    }

    match rounds::generate_round(state, comp.id).await {
        // A racing dispatcher may have generated the round this caller should
        // now serve, so the limit being reached still warrants one retry.
        Ok(_) | Err(GenerateRoundError::RoundLimitReached { .. }) => {
            try_round_matches(state, worker, comp).await
        }
        Err(GenerateRoundError::Hard(err)) => Err(err),
        Err(soft) => {
            debug!(competition_id = comp.id, reason = %soft, "skipping competition");
            Ok(None)
        }
    }
}

/// Unstarted matches of incomplete rounds, oldest round first, shuffled
/// within a round, each tried through the start guard.
async fn try_round_matches(
    state: &LadderState,
    worker: &WorkerContext,
    comp: &competition::Model,
) -> Result<Option<arena_match::Model>, LadderError> {
    let incomplete_rounds = round::Entity::find()
        .filter(round::Column::CompetitionId.eq(comp.id))
        .filter(round::Column::Complete.eq(false))
        .order_by_asc(round::Column::Number)
        .all(&state.db)
        .await?;

    for r in incomplete_rounds {
        let mut candidates = arena_match::Entity::find()
            .filter(arena_match::Column::RoundId.eq(Some(r.id)))
            .filter(arena_match::Column::Started.is_null())
            .all(&state.db)
            .await?;
        {
            use rand::seq::SliceRandom;
            candidates.shuffle(&mut rand::rng());
        }
        if let Some(started) = try_candidates(state, worker, candidates).await? {
            return Ok(Some(started));
        }
    }
    Ok(None)
}

/// Run candidates through the start guard until one sticks.
async fn try_candidates(
    state: &LadderState,
    worker: &WorkerContext,
    candidates: Vec<arena_match::Model>,
) -> Result<Option<arena_match::Model>, LadderError> {
    for candidate in candidates {
        if let Some(started) = guard::try_start(state, candidate.id, worker).await? {
            return Ok(Some(started));
        }
    }
    Ok(None)
}

/// Ad hoc requested matches waiting to start, oldest first. `competition_id`
/// of `None` selects the competition-less ones.
async fn requested_candidates(
    db: &DatabaseConnection,
    competition_id: Option<i32>,
) -> Result<Vec<arena_match::Model>, LadderError> {
    let mut select = arena_match::Entity::find()
        .filter(arena_match::Column::RoundId.is_null())
        .filter(arena_match::Column::Started.is_null())
        .order_by_asc(arena_match::Column::CreatedAt);
    select = match competition_id {
        Some(id) => select.filter(arena_match::Column::CompetitionId.eq(Some(id))),
        None => select.filter(arena_match::Column::CompetitionId.is_null()),
    };
    Ok(select.all(db).await?)
}

/// A match this worker already started but never reported.
async fn find_unfinished_assignment(
    state: &LadderState,
    worker: &WorkerContext,
) -> Result<Option<arena_match::Model>, LadderError> {
    let assigned = arena_match::Entity::find()
        .filter(arena_match::Column::AssignedWorkerId.eq(Some(worker.id)))
        .filter(arena_match::Column::Started.is_not_null())
        .order_by_asc(arena_match::Column::Started)
        .all(&state.db)
        .await?;
    if assigned.is_empty() {
        return Ok(None);
    }

    let ids: Vec<i32> = assigned.iter().map(|m| m.id).collect();
    let resulted: HashSet<i32> = match_result::Entity::find()
        .filter(match_result::Column::MatchId.is_in(ids))
        .select_only()
        .column(match_result::Column::MatchId)
        .into_tuple::<i32>()
        .all(&state.db)
        .await?
        .into_iter()
        .collect();

    Ok(assigned.into_iter().find(|m| !resulted.contains(&m.id)))
}

/// Build the worker-facing payload for a started match.
async fn build_assignment(
    state: &LadderState,
    started: &arena_match::Model,
) -> Result<MatchAssignment, LadderError> {
    let participants = match_participant::Entity::find()
        .filter(match_participant::Column::MatchId.eq(started.id))
        .order_by_asc(match_participant::Column::ParticipantNumber)
        .all(&state.db)
        .await?;
    if participants.len() != 2 {
        return Err(LadderError::InvariantViolation(format!(
            "match {} has {} participants",
            started.id,
            participants.len()
        )));
    }

    let map = state
        .maps
        .map(started.map_id)
        .await?
        .ok_or(LadderError::MapNotFound(started.map_id))?;

    let mut agents = Vec::with_capacity(2);
    for p in participants {
        let record = state
            .agents
            .agent(p.agent_id)
            .await?
            .ok_or(LadderError::AgentNotFound(p.agent_id))?;
        agents.push(AssignedAgent {
            participant_number: p.participant_number,
            agent_id: p.agent_id,
            name: record.name,
            package: record.package,
            data: if p.use_data { record.data } else { None },
            update_data: p.update_data,
        });
    }

    Ok(MatchAssignment {
        match_id: started.id,
        map: MapDescriptor {
            id: map.id,
            name: map.name,
            location: map.location,
        },
        agents,
    })
}
