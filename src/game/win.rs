//! Win Condition Evaluation
//!
//! Runs after every night resolution and after every vote resolution, so a
//! match can end straight off a mafia kill or a day elimination.

use crate::game::state::{GameSession, Role, Winner};

/// Evaluate the win condition.
///
/// - No living mafia: civilians win.
/// - Living mafia count has reached the living non-mafia count: mafia wins.
/// - Otherwise the match continues (`None`).
pub fn check_win(session: &GameSession) -> Option<Winner> {
    let alive_mafia = session.living_with_role(Role::Mafia);
    let alive_others = session.living_count() - alive_mafia;

    if alive_mafia == 0 {
        Some(Winner::Civilians)
    } else if alive_mafia >= alive_others {
        Some(Winner::Mafia)
    } else {
        None
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerId;

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    /// Roster from (role, alive) pairs.
    fn session_of(players: &[(Role, bool)]) -> GameSession {
        let mut session = GameSession::new([0; 16], 1);
        for (i, (role, alive)) in players.iter().enumerate() {
            let id = pid(i as u8 + 1);
            session.add_player(id, format!("player{}", i + 1));
            let player = session.player_mut(&id).unwrap();
            player.role = *role;
            player.alive = *alive;
        }
        session
    }

    #[test]
    fn test_ongoing_match() {
        let session = session_of(&[
            (Role::Mafia, true),
            (Role::Doctor, true),
            (Role::Detective, true),
            (Role::Civilian, true),
        ]);
        assert_eq!(check_win(&session), None);
    }

    #[test]
    fn test_civilians_win_when_mafia_dead() {
        let session = session_of(&[
            (Role::Mafia, false),
            (Role::Doctor, true),
            (Role::Civilian, true),
        ]);
        assert_eq!(check_win(&session), Some(Winner::Civilians));
    }

    #[test]
    fn test_mafia_wins_at_parity() {
        // Mafia alive, one civilian alive, one civilian dead: 1 >= 1
        let session = session_of(&[
            (Role::Mafia, true),
            (Role::Civilian, true),
            (Role::Civilian, false),
        ]);
        assert_eq!(check_win(&session), Some(Winner::Mafia));
    }

    #[test]
    fn test_mafia_outnumbered_continues() {
        let session = session_of(&[
            (Role::Mafia, true),
            (Role::Civilian, true),
            (Role::Civilian, true),
        ]);
        assert_eq!(check_win(&session), None);
    }

    #[test]
    fn test_dead_players_do_not_count() {
        // Three civilians dead; the living are 1 mafia vs 2 others
        let session = session_of(&[
            (Role::Mafia, true),
            (Role::Doctor, true),
            (Role::Detective, true),
            (Role::Civilian, false),
            (Role::Civilian, false),
            (Role::Civilian, false),
        ]);
        assert_eq!(check_win(&session), None);
    }

    #[test]
    fn test_empty_roster_is_civilian_win() {
        // Degenerate but well-defined: zero mafia means civilians
        let session = session_of(&[]);
        assert_eq!(check_win(&session), Some(Winner::Civilians));
    }
}
