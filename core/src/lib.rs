//! Game core for the Kidoo family learning app: quiz session state machine,
//! behavioral telemetry, fun-time reward ledger and the bubble reward game.

pub mod bubbles;
pub mod content;
pub mod ledger;
pub mod problem;
pub mod profile;
pub mod provider;
pub mod quiz;
pub mod telemetry;
