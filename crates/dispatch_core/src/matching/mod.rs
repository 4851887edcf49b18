pub mod scorer;
pub mod types;

pub use scorer::{new_ride_match, DeviationScorer, MatchScorer, ScoringParams};
pub use types::{Candidate, Match, MatchKind, MatchOutcome, Rejection};
