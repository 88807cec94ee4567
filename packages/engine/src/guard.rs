//! Atomic check-then-commit transition of a match into "started".

use std::collections::HashSet;

use chrono::Utc;
use ladder_common::WorkerContext;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{debug, info, instrument};

use crate::entity::{arena_match, match_participant, match_result};
use crate::error::LadderError;
use crate::state::LadderState;

/// Try to start a match on behalf of a worker.
///
/// Returns the updated match on success, `None` when the candidate cannot be
/// started (already started, trust mismatch, or a data-blob exclusivity
/// hold); the caller silently tries the next candidate. All checks and the
/// commit happen under one exclusive lock on the match row; releasing it
/// before the commit would let two workers pass the availability check and
/// double-book an agent.
#[instrument(skip(state, worker), fields(worker_id = %worker.id))]
pub async fn try_start(
    state: &LadderState,
    match_id: i32,
    worker: &WorkerContext,
) -> Result<Option<arena_match::Model>, LadderError> {
    let txn = state.db.begin().await?;

    let Some(candidate) = arena_match::Entity::find_by_id(match_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
    else {
        txn.rollback().await?;
        return Ok(None);
    };

    if candidate.started.is_some() {
        txn.rollback().await?;
        return Ok(None);
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

    if !worker.trusted {
        let mut requires_trusted = candidate.require_trusted;
        for p in &participants {
            if requires_trusted {
                break;
            }
            if let Some(record) = state.agents.agent(p.agent_id).await? {
                requires_trusted |= record.requires_trusted_worker;
            }
        }
        if requires_trusted {
            debug!(match_id, "untrusted worker refused a trusted-only match");
            txn.rollback().await?;
            return Ok(None);
        }
    }

    for p in &participants {
        // Only participants that will write the blob back contend; read-only
        // and blob-disabled participants run freely in parallel.
        if !(p.use_data && p.update_data) {
            continue;
        }
        if data_blob_held_elsewhere(&txn, p.agent_id, match_id).await? {
            debug!(
                match_id,
                agent_id = p.agent_id,
                "agent data blob held by another running match"
            );
            txn.rollback().await?;
            return Ok(None);
        }
    }

    let now = Utc::now();
    let mut active: arena_match::ActiveModel = candidate.clone().into();
    active.started = Set(Some(now));
    if candidate.first_started.is_none() {
        active.first_started = Set(Some(now));
    }
    active.assigned_worker_id = Set(Some(worker.id));
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    info!(match_id, "match started");
    Ok(Some(updated))
}

/// Whether some other started, result-less match holds `update_data` for the
/// given agent.
async fn data_blob_held_elsewhere<C: ConnectionTrait>(
    txn: &C,
    agent_id: i32,
    match_id: i32,
) -> Result<bool, LadderError> {
    let holder_ids: Vec<i32> = match_participant::Entity::find()
        .filter(match_participant::Column::AgentId.eq(agent_id))
        .filter(match_participant::Column::UpdateData.eq(true))
        .filter(match_participant::Column::MatchId.ne(match_id))
        .select_only()
        .column(match_participant::Column::MatchId)
        .into_tuple()
        .all(txn)
        .await?;
    if holder_ids.is_empty() {
        return Ok(false);
    }

    let running_ids: Vec<i32> = arena_match::Entity::find()
        .filter(arena_match::Column::Id.is_in(holder_ids))
        .filter(arena_match::Column::Started.is_not_null())
        .select_only()
        .column(arena_match::Column::Id)
        .into_tuple()
        .all(txn)
        .await?;
    if running_ids.is_empty() {
        return Ok(false);
    }

    let resulted: HashSet<i32> = match_result::Entity::find()
        .filter(match_result::Column::MatchId.is_in(running_ids.clone()))
        .select_only()
        .column(match_result::Column::MatchId)
        .into_tuple::<i32>()
        .all(txn)
        .await?
        .into_iter()
        .collect();

    Ok(running_ids.iter().any(|id| !resulted.contains(id)))
}
