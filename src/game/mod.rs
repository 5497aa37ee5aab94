//! Game Logic Module
//!
//! The rules engine. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `state`: session, roster, roles, phases
//! - `roles`: role pool and fair assignment
//! - `night`: night-target recording and resolution
//! - `vote`: day-vote tally and resolution
//! - `win`: win-condition evaluation
//! - `phase`: the phase state machine driving it all
//! - `events`: incremental events with visibility scoping
//! - `snapshot`: full public views and the sink abstraction

pub mod state;
pub mod roles;
pub mod night;
pub mod vote;
pub mod win;
pub mod phase;
pub mod events;
pub mod snapshot;

// Re-export key types
pub use state::{GameSession, Player, PlayerId, Role, GamePhase, Winner};
pub use phase::{PhaseMachine, MatchRules, StepResult};
pub use events::{GameEvent, GameEventData, EventVisibility};
pub use snapshot::{Snapshot, SnapshotSink};
