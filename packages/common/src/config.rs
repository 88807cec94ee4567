use serde::Deserialize;

/// Ladder engine tunables.
///
/// A snapshot of this struct is passed explicitly into every dispatcher call;
/// nothing in the engine reads configuration from process-global state. The
/// per-competition tunables (`max_active_rounds`, `n_placements`, the division
/// targets, `starting_elo`) act as defaults that are stamped onto the
/// competition row at creation, so editing the configuration never changes the
/// rules of a competition already in flight.
#[derive(Debug, Deserialize, Clone)]
pub struct LadderSettings {
    /// Whether match dispatch is enabled at all. Default: true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Hand a worker back its own started-but-unreported match instead of a
    /// new one. Recovers from worker restarts without duplicate work. Default: true.
    #[serde(default = "default_reissue_unfinished")]
    pub reissue_unfinished: bool,
    /// Seconds a started match may go without a result before the sweep
    /// force-cancels it. Default: 3600.
    #[serde(default = "default_match_timeout_secs")]
    pub match_timeout_secs: u64,
    /// Seconds between timeout sweep scans. Default: 300.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Maximum number of incomplete rounds a competition may have at once. Default: 2.
    #[serde(default = "default_max_active_rounds")]
    pub max_active_rounds: i32,
    /// Rated matches an agent must play before it receives a ranked division. Default: 10.
    #[serde(default = "default_n_placements")]
    pub n_placements: i32,
    /// Division count a competition grows toward. Default: 1.
    #[serde(default = "default_target_n_divisions")]
    pub target_n_divisions: i32,
    /// Intended agents per division; drives the split/merge thresholds. Default: 15.
    #[serde(default = "default_target_division_size")]
    pub target_division_size: i32,
    /// ELO K-factor. Default: 16.
    #[serde(default = "default_elo_k")]
    pub elo_k: i32,
    /// Rating every participant starts from. Default: 1600.
    #[serde(default = "default_starting_elo")]
    pub starting_elo: i32,
}

fn default_enabled() -> bool {
    true
}
fn default_reissue_unfinished() -> bool {
    true
}
fn default_match_timeout_secs() -> u64 {
    3600
}
fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_max_active_rounds() -> i32 {
    2
}
fn default_n_placements() -> i32 {
    10
}
fn default_target_n_divisions() -> i32 {
    1
}
fn default_target_division_size() -> i32 {
    15
}
fn default_elo_k() -> i32 {
    16
}
fn default_starting_elo() -> i32 {
    1600
}

impl Default for LadderSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            reissue_unfinished: default_reissue_unfinished(),
            match_timeout_secs: default_match_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_active_rounds: default_max_active_rounds(),
            n_placements: default_n_placements(),
            target_n_divisions: default_target_n_divisions(),
            target_division_size: default_target_division_size(),
            elo_k: default_elo_k(),
            starting_elo: default_starting_elo(),
        }
    }
}
