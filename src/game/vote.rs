//! Day Vote Tally
//!
//! Vote recording during the day vote and the once-per-cycle resolution
//! that eliminates the tally leader.
//!
//! The tally keeps first-vote order: when two targets tie, the one whose
//! first vote was recorded earlier wins the tie. This makes resolution
//! deterministic regardless of how the roster is stored or iterated.

use crate::game::events::GameEvent;
use crate::game::state::{GamePhase, GameSession, PlayerId, VoteEntry};

/// Record a day vote.
///
/// Silently ignored unless all of the following hold:
/// - the session is in the day-vote phase,
/// - the voter is on the roster, alive, and has not voted this cycle,
/// - the target is on the roster and alive.
///
/// A recorded vote is final: there is no un-vote.
pub fn record_vote(session: &mut GameSession, voter: &PlayerId, target: &PlayerId) {
    if session.phase != GamePhase::DayVoting {
        return;
    }
    if !session.is_living_player(target) {
        return;
    }
    match session.player_mut(voter) {
        Some(p) if p.alive && !p.has_voted => {
            p.vote_target = Some(*target);
            p.has_voted = true;
        }
        _ => return,
    }

    match session.vote_counts.iter_mut().find(|e| e.target == *target) {
        Some(entry) => entry.votes += 1,
        None => session.vote_counts.push(VoteEntry {
            target: *target,
            votes: 1,
        }),
    }
}

/// Resolve the day vote.
///
/// The target with the strictly highest count dies; among tied maxima the
/// first-recorded one wins. An empty tally eliminates nobody. Vote state is
/// reset afterwards in every case.
pub fn resolve_votes(session: &mut GameSession) {
    let leader = session
        .vote_counts
        .iter()
        .fold(None::<VoteEntry>, |best, entry| match best {
            // Strictly-greater keeps the first-recorded maximum on ties
            Some(b) if entry.votes > b.votes => Some(*entry),
            Some(b) => Some(b),
            None => Some(*entry),
        });

    if let Some(VoteEntry { target, votes }) = leader {
        if let Some(player) = session.player_mut(&target) {
            player.alive = false;
        }
        let tick = session.tick;
        session.push_event(GameEvent::player_eliminated(tick, target, votes));
    }

    reset_votes(session);
}

/// Clear all per-cycle vote state.
///
/// Runs after every resolution, including cycles with no elimination.
pub fn reset_votes(session: &mut GameSession) {
    for player in session.players_mut() {
        player.vote_target = None;
        player.has_voted = false;
    }
    session.vote_counts.clear();
}

// =============================================================================
// TESTS
// =============================================================================
