mod profile;
mod stage;
mod stats;

pub use self::{
    profile::Profile,
    stage::{Schedule, Stage, parse_stage_list},
    stats::{TrendStat, TrendStatSelection, TrendSummary, parse_trend_stats},
};
