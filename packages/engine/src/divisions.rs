//! Division split/merge decisions and rank-based division assignment.

use sea_orm::*;
use tracing::{debug, info};

use crate::entity::{DEFAULT_DIVISION, competition, competition_participant};
use crate::error::LadderError;

/// Whether the population has outgrown the current division count.
pub fn should_split(n: i32, d: i32, target_d: i32, target_size: i32) -> bool {
    d < target_d && n >= target_size * (d + 1)
}

/// Whether the population has shrunk enough to drop a division.
///
/// The threshold sits half a division below the corresponding split point, so
/// a population hovering at a boundary does not oscillate between layouts.
pub fn should_merge(n: i32, d: i32, target_size: i32) -> bool {
    d > 1 && n < target_size * d - target_size / 2
}

/// The stable division count for `n` ranked participants, stepping from
/// `current_d` one split or merge at a time.
pub fn balanced_division_count(n: i32, current_d: i32, target_d: i32, target_size: i32) -> i32 {
    let mut d = Ord::max(current_d, 1);
    loop {
        if should_split(n, d, target_d, target_size) {
            d += 1;
        } else if should_merge(n, d, target_size) {
            d -= 1;
        } else {
            return d;
        }
    }
}

/// Near-equal contiguous chunk sizes: the first `n % d` chunks take the
/// extra participant.
pub fn chunk_sizes(n: usize, d: usize) -> Vec<usize> {
    let base = n / d;
    let extra = n % d;
    (0..d).map(|i| base + usize::from(i < extra)).collect()
}

/// Split the active pool into the ranked pool (sorted best-first) and the
/// placement pool (sorted by progress).
///
/// Ranked order is sticky: previous division first (unassigned last), then
/// match count capped at the placement requirement, then rating. The cap
/// keeps a participant that slipped under a raised placement requirement from
/// outranking peers purely on volume.
pub fn split_pools(
    participants: Vec<competition_participant::Model>,
    n_placements: i32,
) -> (
    Vec<competition_participant::Model>,
    Vec<competition_participant::Model>,
) {
    let (mut ranked, mut placement): (Vec<_>, Vec<_>) = participants
        .into_iter()
        .partition(|p| p.match_count >= n_placements);

    ranked.sort_by(|a, b| {
        let div_a = if a.division_num == DEFAULT_DIVISION {
            i32::MAX
        } else {
            a.division_num
        };
        let div_b = if b.division_num == DEFAULT_DIVISION {
            i32::MAX
        } else {
            b.division_num
        };
        let cap_a = Ord::min(a.match_count, n_placements);
        let cap_b = Ord::min(b.match_count, n_placements);
        div_a
            .cmp(&div_b)
            .then_with(|| cap_b.cmp(&cap_a))
            .then_with(|| b.elo.cmp(&a.elo))
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });

    placement.sort_by(|a, b| {
        a.match_count
            .cmp(&b.match_count)
            .then_with(|| a.elo.cmp(&b.elo))
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });

    (ranked, placement)
}

/// Re-evaluate the division layout for a competition and reassign ranked
/// participants. Runs only at round-completion boundaries so in-flight
/// pairings stay coherent. Returns the resulting division count.
pub async fn rebalance<C: ConnectionTrait>(
    txn: &C,
    comp: &competition::Model,
) -> Result<i32, LadderError> {
    let participants = competition_participant::Entity::find()
        .filter(competition_participant::Column::CompetitionId.eq(comp.id))
        .filter(competition_participant::Column::Active.eq(true))
        .all(txn)
        .await?;

    let (ranked, placement) = split_pools(participants, comp.n_placements);
    let n = ranked.len() as i32;
    let d = balanced_division_count(
        n,
        comp.n_divisions,
        comp.target_n_divisions,
        comp.target_division_size,
    );

    if d != comp.n_divisions {
        info!(
            competition_id = comp.id,
            from = comp.n_divisions,
            to = d,
            ranked = n,
            "division count changed"
        );
        let mut active: competition::ActiveModel = comp.clone().into();
        active.n_divisions = Set(d);
        active.update(txn).await?;
    }

    let mut ranked_iter = ranked.into_iter();
    for (index, size) in chunk_sizes(n as usize, d as usize).into_iter().enumerate() {
        let division = index as i32 + 1;
        for _ in 0..size {
            let p = ranked_iter.next().ok_or_else(|| {
                LadderError::InvariantViolation("division chunks exceeded pool".into())
            })?;
            if p.division_num != division {
                debug!(
                    competition_id = comp.id,
                    agent_id = p.agent_id,
                    from = p.division_num,
                    to = division,
                    "participant reassigned"
                );
                let mut active: competition_participant::ActiveModel = p.into();
                active.division_num = Set(division);
                active.update(txn).await?;
            }
        }
    }

    // Placement participants keep (or regain) the sentinel until they clear
    // the requirement; they join the ranked pool at the next rebalance.
    for p in placement {
        if p.division_num != DEFAULT_DIVISION {
            let mut active: competition_participant::ActiveModel = p.into();
            active.division_num = Set(DEFAULT_DIVISION);
            active.update(txn).await?;
        }
    }

    Ok(d)
}
