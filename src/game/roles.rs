//! Role Pool and Assignment
//!
//! Builds the role pool for a roster and deals it out with a fair shuffle.

use crate::game::events::GameEvent;
use crate::game::state::{GameSession, PlayerId, Role};

/// Build the role pool for a roster of `count` players.
///
/// The first three entries are Mafia, Doctor, Detective in that fixed order;
/// the remainder are Civilian. For rosters smaller than three the pool is
/// truncated to the first `count` entries, so Mafia is dealt first, then
/// Doctor. The session layer enforces a playable minimum; this function
/// never fails.
pub fn role_pool(count: usize) -> Vec<Role> {
    const SPECIALS: [Role; 3] = [Role::Mafia, Role::Doctor, Role::Detective];

    let mut pool = Vec::with_capacity(count);
    pool.extend(SPECIALS.iter().copied().take(count));
    while pool.len() < count {
        pool.push(Role::Civilian);
    }
    pool
}

/// Assign roles to the roster.
///
/// Produces a uniformly random permutation of the roster (Fisher-Yates over
/// the session RNG) and deals pool entry `i` to the `i`-th player of the
/// permutation. Also resets every player's per-match state: alive, vote
/// target, voted flag.
///
/// Emits one private `RoleAssigned` event per player.
pub fn assign_roles(session: &mut GameSession) {
    let count = session.player_count();
    let pool = role_pool(count);

    // Shuffle roster positions, not the players themselves: join order is
    // part of the deterministic state and must survive assignment.
    let mut order: Vec<usize> = (0..count).collect();
    session.rng.shuffle(&mut order);

    for (pool_idx, &player_idx) in order.iter().enumerate() {
        let player = &mut session.players_mut()[player_idx];
        player.role = pool[pool_idx];
        player.alive = true;
        player.vote_target = None;
        player.has_voted = false;
    }

    let tick = session.tick;
    let assigned: Vec<(PlayerId, Role)> = session
        .players()
        .iter()
        .map(|p| (p.id, p.role))
        .collect();
    for (id, role) in assigned {
        session.push_event(GameEvent::role_assigned(tick, id, role));
    }
}

// =============================================================================
// TESTS
// =============================================================================
