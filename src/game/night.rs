//! Night Actions
//!
//! Target recording during the night sub-phases and the once-per-cycle
//! resolution of the kill/save pair.
//!
//! Everything here follows the engine's no-op error taxonomy: commands from
//! untrusted remotes either change state or are silently dropped, they never
//! surface an error.

use crate::game::events::GameEvent;
use crate::game::state::{GameSession, PlayerId, Role};

/// Record a night target for a role.
///
/// Silently ignored unless all of the following hold:
/// - the session is in the role's own night phase,
/// - the actor is on the roster, alive, and holds that role,
/// - the target is on the roster and alive.
///
/// Re-submitting before resolution overwrites the previous target
/// (last writer wins).
pub fn set_night_target(
    session: &mut GameSession,
    role: Role,
    actor: &PlayerId,
    target: &PlayerId,
) {
    if role.night_phase() != Some(session.phase) {
        return;
    }
    if session.role_of(actor) != Some(role) || !session.is_living_player(actor) {
        return;
    }
    if !session.is_living_player(target) {
        return;
    }

    match role {
        Role::Mafia => session.mafia_target = Some(*target),
        Role::Doctor => session.doctor_target = Some(*target),
        Role::Detective => session.detective_target = Some(*target),
        Role::Civilian => {}
    }
}

/// Whether the role acting in the current night phase has submitted its
/// target, or cannot act at all (dead, or absent from a truncated pool).
///
/// The session layer uses this to auto-advance night phases.
pub fn acting_role_done(session: &GameSession) -> bool {
    let Some(role) = session.phase.acting_role() else {
        return false;
    };

    let actor_can_act = session
        .players()
        .iter()
        .any(|p| p.role == role && p.alive);
    if !actor_can_act {
        return true;
    }

    match role {
        Role::Mafia => session.mafia_target.is_some(),
        Role::Doctor => session.doctor_target.is_some(),
        Role::Detective => session.detective_target.is_some(),
        Role::Civilian => false,
    }
}

/// Resolve the night's actions. Invoked exactly once per night cycle, on
/// the transition out of the detective's phase.
///
/// Kill rule: a set mafia target dies unless the doctor picked the same
/// player; no mafia target means no death. The detective's result is
/// computed here but only ever reaches the detective (private event) -
/// it is not a roster mutation.
///
/// All three targets are cleared afterwards.
pub fn resolve_night(session: &mut GameSession) {
    let tick = session.tick;

    // Investigation first: the result reflects the target's role as the
    // night stood, even if the same player dies to the mafia tonight.
    if let Some(target) = session.detective_target {
        let detective = session
            .players()
            .iter()
            .find(|p| p.role == Role::Detective && p.alive)
            .map(|p| p.id);
        if let (Some(detective), Some(role)) = (detective, session.role_of(&target)) {
            session.push_event(GameEvent::investigation(tick, detective, target, role));
        }
    }

    let victim = match (session.mafia_target, session.doctor_target) {
        (Some(kill), Some(save)) if kill == save => None,
        (Some(kill), _) => Some(kill),
        (None, _) => None,
    };

    if let Some(victim_id) = victim {
        if let Some(player) = session.player_mut(&victim_id) {
            player.alive = false;
        }
    }

    session.push_event(GameEvent::night_resolved(tick, victim));
    session.clear_night_targets();
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;
    use crate::game::state::GamePhase;

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    /// 4 players with fixed roles: 1=Mafia, 2=Doctor, 3=Detective, 4=Civilian.
    fn night_session() -> GameSession {
        let mut session = GameSession::new([0; 16], 1);
        let roles = [Role::Mafia, Role::Doctor, Role::Detective, Role::Civilian];
        for (i, role) in roles.iter().enumerate() {
            let id = pid(i as u8 + 1);
            session.add_player(id, format!("player{}", i + 1));
            session.player_mut(&id).unwrap().role = *role;
        }
        session.phase = GamePhase::NightMafia;
        session
    }

    #[test]
    fn test_kill_without_save() {
        let mut session = night_session();
        session.mafia_target = Some(pid(4));
        session.doctor_target = Some(pid(2));
        session.phase = GamePhase::NightDetective;

        resolve_night(&mut session);

        assert!(!session.player(&pid(4)).unwrap().alive);
    }

    #[test]
    fn test_save_blocks_kill() {
        let mut session = night_session();
        session.mafia_target = Some(pid(4));
        session.doctor_target = Some(pid(4));
        session.phase = GamePhase::NightDetective;

        resolve_night(&mut session);

        assert!(session.player(&pid(4)).unwrap().alive);
        let events = session.take_events();
        assert!(events.iter().any(|e| matches!(
            e.data,
            GameEventData::NightResolved { victim: None }
        )));
    }

    #[test]
    fn test_no_target_no_death() {
        let mut session = night_session();
        session.doctor_target = Some(pid(1));
        session.phase = GamePhase::NightDetective;

        resolve_night(&mut session);

        assert_eq!(session.living_count(), 4);
    }

    #[test]
    fn test_targets_cleared_after_resolution() {
        let mut session = night_session();
        session.mafia_target = Some(pid(4));
        session.doctor_target = Some(pid(2));
        session.detective_target = Some(pid(1));
        session.phase = GamePhase::NightDetective;

        resolve_night(&mut session);

        assert!(session.mafia_target.is_none());
        assert!(session.doctor_target.is_none());
        assert!(session.detective_target.is_none());
    }

    #[test]
    fn test_investigation_is_private_to_detective() {
        let mut session = night_session();
        session.detective_target = Some(pid(1));
        session.phase = GamePhase::NightDetective;

        resolve_night(&mut session);

        let events = session.take_events();
        let inv = events
            .iter()
            .find(|e| matches!(e.data, GameEventData::Investigation { .. }))
            .expect("investigation event");

        assert_eq!(inv.recipient(), Some(pid(3)));
        match &inv.data {
            GameEventData::Investigation { target, role, .. } => {
                assert_eq!(*target, pid(1));
                assert_eq!(*role, Role::Mafia);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_set_target_phase_gated() {
        let mut session = night_session(); // phase = NightMafia

        // Doctor cannot act during the mafia phase
        set_night_target(&mut session, Role::Doctor, &pid(2), &pid(4));
        assert!(session.doctor_target.is_none());

        // Mafia can
        set_night_target(&mut session, Role::Mafia, &pid(1), &pid(4));
        assert_eq!(session.mafia_target, Some(pid(4)));
    }

    #[test]
    fn test_set_target_validates_actor() {
        let mut session = night_session();

        // Civilian claiming to be mafia is dropped
        set_night_target(&mut session, Role::Mafia, &pid(4), &pid(2));
        assert!(session.mafia_target.is_none());

        // Unknown actor is dropped
        set_night_target(&mut session, Role::Mafia, &pid(99), &pid(2));
        assert!(session.mafia_target.is_none());

        // Dead mafia is dropped
        session.player_mut(&pid(1)).unwrap().alive = false;
        set_night_target(&mut session, Role::Mafia, &pid(1), &pid(2));
        assert!(session.mafia_target.is_none());
    }

    #[test]
    fn test_set_target_validates_target() {
        let mut session = night_session();

        set_night_target(&mut session, Role::Mafia, &pid(1), &pid(99));
        assert!(session.mafia_target.is_none());

        session.player_mut(&pid(4)).unwrap().alive = false;
        set_night_target(&mut session, Role::Mafia, &pid(1), &pid(4));
        assert!(session.mafia_target.is_none());
    }

    #[test]
    fn test_resubmission_overwrites() {
        let mut session = night_session();

        set_night_target(&mut session, Role::Mafia, &pid(1), &pid(2));
        set_night_target(&mut session, Role::Mafia, &pid(1), &pid(4));

        assert_eq!(session.mafia_target, Some(pid(4)));
    }

    #[test]
    fn test_acting_role_done() {
        let mut session = night_session();

        assert!(!acting_role_done(&session));
        set_night_target(&mut session, Role::Mafia, &pid(1), &pid(4));
        assert!(acting_role_done(&session));

        // Dead actor counts as done so the phase cannot stall
        session.mafia_target = None;
        session.player_mut(&pid(1)).unwrap().alive = false;
        assert!(acting_role_done(&session));

        // Not meaningful outside night phases
        session.phase = GamePhase::DayVoting;
        assert!(!acting_role_done(&session));
    }
}
