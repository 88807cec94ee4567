//! Round generation: one full round robin per division, atomically.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rand::Rng;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{arena_match, competition, competition_participant, match_participant, round};
use crate::error::{GenerateRoundError, LadderError};
use crate::registry::{AgentRecord, MapRecord};
use crate::state::LadderState;

/// Every distinct unordered pair, in stable order.
pub fn round_robin_pairs<T: Copy>(items: &[T]) -> Vec<(T, T)> {
    let mut pairs = Vec::with_capacity(items.len() * items.len().saturating_sub(1) / 2);
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            pairs.push((items[i], items[j]));
        }
    }
    pairs
}

/// Generate the next round for a competition.
///
/// The competition row is locked for the whole operation: two dispatch calls
/// racing to generate serialize here, and the loser sees the winner's round in
/// the incomplete-round count. The round, its matches and their participants
/// are inserted in one transaction.
#[instrument(skip(state))]
pub async fn generate_round(
    state: &LadderState,
    competition_id: i32,
) -> Result<round::Model, GenerateRoundError> {
    let txn = state.db.begin().await.map_err(LadderError::Db)?;

    let comp = competition::Entity::find_by_id(competition_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(GenerateRoundError::Hard(LadderError::CompetitionNotFound(
            competition_id,
        )))?;

    if !comp.status.is_open() {
        return Err(GenerateRoundError::CompetitionNotOpen(comp.status));
    }

    let incomplete = round::Entity::find()
        .filter(round::Column::CompetitionId.eq(comp.id))
        .filter(round::Column::Complete.eq(false))
        .count(&txn)
        .await?;
    if incomplete >= comp.max_active_rounds as u64 {
        return Err(GenerateRoundError::RoundLimitReached {
            limit: comp.max_active_rounds,
        });
    }

    let maps = state
        .maps
        .enabled_maps(comp.id)
        .await
        .map_err(|e| GenerateRoundError::Hard(LadderError::Registry(e)))?;
    if maps.is_empty() {
        return Err(GenerateRoundError::NoEnabledMaps);
    }

    let agents = state
        .agents
        .competition_agents(comp.id)
        .await
        .map_err(|e| GenerateRoundError::Hard(LadderError::Registry(e)))?;
    let agents_by_id: HashMap<i32, &AgentRecord> = agents.iter().map(|a| (a.id, a)).collect();

    let participants = competition_participant::Entity::find()
        .filter(competition_participant::Column::CompetitionId.eq(comp.id))
        .filter(competition_participant::Column::Active.eq(true))
        .all(&txn)
        .await?;

    // Pairing pool: active participants the registry can actually hand out.
    let pool: Vec<(&competition_participant::Model, &AgentRecord)> = participants
        .iter()
        .filter_map(|p| agents_by_id.get(&p.agent_id).map(|rec| (p, *rec)))
        .collect();
    if pool.len() < 2 {
        return Err(GenerateRoundError::NotEnoughAgents {
            available: pool.len(),
        });
    }

    // Matches only happen within a division group. The sentinel division
    // (placement pool) is a group of its own, so placement agents accumulate
    // the counted matches they need to graduate.
    let mut by_division: BTreeMap<i32, Vec<(&competition_participant::Model, &AgentRecord)>> =
        BTreeMap::new();
    for entry in &pool {
        by_division
            .entry(entry.0.division_num)
            .or_default()
            .push(*entry);
    }

    let mut pairings: Vec<(
        (&competition_participant::Model, &AgentRecord),
        (&competition_participant::Model, &AgentRecord),
        MapRecord,
    )> = Vec::new();
    {
        let mut rng = rand::rng();
        for members in by_division.values() {
            let indices: Vec<usize> = (0..members.len()).collect();
            for (i, j) in round_robin_pairs(&indices) {
                let map = maps[rng.random_range(0..maps.len())].clone();
                pairings.push((members[i], members[j], map));
            }
        }
    }
    if pairings.is_empty() {
        return Err(GenerateRoundError::NotEnoughAgents {
            available: pool.len(),
        });
    }

    let number = round::Entity::find()
        .filter(round::Column::CompetitionId.eq(comp.id))
        .count(&txn)
        .await? as i32
        + 1;

    let now = Utc::now();
    let new_round = round::ActiveModel {
        competition_id: Set(comp.id),
        number: Set(number),
        started: Set(now),
        finished: Set(None),
        complete: Set(false),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let match_count = pairings.len();
    for ((p1, rec1), (p2, rec2), map) in pairings {
        let new_match = arena_match::ActiveModel {
            round_id: Set(Some(new_round.id)),
            competition_id: Set(Some(comp.id)),
            map_id: Set(map.id),
            map_name: Set(map.name),
            created_at: Set(now),
            started: Set(None),
            first_started: Set(None),
            assigned_worker_id: Set(None),
            requested_by: Set(None),
            require_trusted: Set(rec1.requires_trusted_worker || rec2.requires_trusted_worker),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (side, participant, record) in [(1, p1, rec1), (2, p2, rec2)] {
            match_participant::ActiveModel {
                match_id: Set(new_match.id),
                agent_id: Set(participant.agent_id),
                participant_number: Set(side),
                starting_elo: Set(None),
                elo_delta: Set(None),
                resultant_elo: Set(None),
                use_data: Set(record.data_enabled),
                update_data: Set(record.data_enabled),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await.map_err(LadderError::Db)?;
    info!(
        competition_id = comp.id,
        round = new_round.number,
        matches = match_count,
        "round generated"
    );
    Ok(new_round)
}
