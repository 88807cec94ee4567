pub mod arena_match;
pub mod competition;
pub mod competition_participant;
pub mod match_participant;
pub mod match_result;
pub mod round;

/// `division_num` value meaning "unassigned / still in placement".
/// Ranked divisions start at 1.
pub const DEFAULT_DIVISION: i32 = 0;
