//! The static system-state transition table.
//!
//! The table is a `const` slice. A `const` assertion below rejects, at build
//! time, a table with duplicate pairs, self-transitions, a non-terminal state
//! without any allowed exit, or a terminal state with one.

use serde::Serialize;

use crate::types::SystemState;

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    /// Source state.
    pub from: SystemState,
    /// Target state.
    pub to: SystemState,
    /// Whether the transition may be committed.
    pub allowed: bool,
    /// Why the transition exists, or why it is refused.
    pub reason: &'static str,
}

const fn allow(from: SystemState, to: SystemState, reason: &'static str) -> StateTransition {
    StateTransition {
        from,
        to,
        allowed: true,
        reason,
    }
}

const fn deny(from: SystemState, to: SystemState, reason: &'static str) -> StateTransition {
    StateTransition {
        from,
        to,
        allowed: false,
        reason,
    }
}

use SystemState::{
    Calibration, Error, Init, PowerSave, Ready, Running, SafeMode, Shutdown, Update,
};

/// The transition law of the firmware.
pub const TRANSITIONS: &[StateTransition] = &[
    allow(Init, Ready, "initialization complete"),
    allow(Init, Error, "initialization failed"),
    deny(Init, Running, "must pass through READY"),
    allow(Ready, Running, "operation started"),
    allow(Ready, Calibration, "calibration requested"),
    allow(Ready, Error, "fault while ready"),
    allow(Ready, Update, "firmware update requested"),
    allow(Ready, Shutdown, "shutdown requested"),
    deny(Ready, PowerSave, "power save is only entered from RUNNING"),
    allow(Running, Ready, "operation stopped"),
    allow(Running, Error, "fault while running"),
    allow(Running, PowerSave, "entering power save"),
    allow(Running, SafeMode, "safe mode requested"),
    allow(Running, Shutdown, "shutdown requested"),
    deny(Running, Calibration, "stop operation before calibrating"),
    allow(Error, SafeMode, "error escalated to safe mode"),
    allow(Error, Init, "re-initializing after error"),
    allow(Error, Shutdown, "shutdown after error"),
    deny(Error, Running, "errors are cleared through INIT"),
    deny(Error, Ready, "errors are cleared through INIT"),
    allow(PowerSave, Running, "leaving power save"),
    allow(PowerSave, Error, "fault in power save"),
    allow(Update, Init, "update complete"),
    allow(Update, Error, "update failed"),
    allow(Calibration, Ready, "calibration complete"),
    allow(Calibration, Error, "calibration failed"),
    deny(Calibration, Running, "calibration returns to READY"),
    allow(SafeMode, Init, "re-initializing after safe mode"),
    allow(SafeMode, Shutdown, "shutdown from safe mode"),
    deny(SafeMode, Running, "safe mode is left through INIT"),
    deny(Shutdown, Init, "shutdown is terminal"),
];

const fn same(a: SystemState, b: SystemState) -> bool {
    a as u8 == b as u8
}

const fn find(
    table: &'static [StateTransition],
    from: SystemState,
    to: SystemState,
) -> Option<&'static StateTransition> {
    let mut rest = table;
    while let [row, tail @ ..] = rest {
        if same(row.from, from) && same(row.to, to) {
            return Some(row);
        }
        rest = tail;
    }
    None
}

/// Whether `from -> to` is an allowed transition.
///
/// ```
/// use kitepower_state::{transitions::is_allowed, SystemState};
///
/// assert!(is_allowed(SystemState::Ready, SystemState::Shutdown));
/// assert!(!is_allowed(SystemState::Ready, SystemState::PowerSave));
/// assert!(!is_allowed(SystemState::Init, SystemState::Update));
/// ```
#[must_use]
pub const fn is_allowed(from: SystemState, to: SystemState) -> bool {
    match find(TRANSITIONS, from, to) {
        Some(row) => row.allowed,
        None => false,
    }
}

/// The table row for `from -> to`, allowed or not.
#[must_use]
pub const fn rule(from: SystemState, to: SystemState) -> Option<&'static StateTransition> {
    find(TRANSITIONS, from, to)
}

/// Allowed targets from `from`, in table order.
pub fn allowed_targets(from: SystemState) -> impl Iterator<Item = SystemState> {
    TRANSITIONS
        .iter()
        .filter(move |row| row.allowed && row.from == from)
        .map(|row| row.to)
}

const fn has_allowed_exit(table: &[StateTransition], from: SystemState) -> bool {
    let mut rest = table;
    while let [row, tail @ ..] = rest {
        if row.allowed && same(row.from, from) {
            return true;
        }
        rest = tail;
    }
    false
}

const fn count_pair(table: &[StateTransition], from: SystemState, to: SystemState) -> usize {
    let mut count = 0usize;
    let mut rest = table;
    while let [row, tail @ ..] = rest {
        if same(row.from, from) && same(row.to, to) {
            count = count.saturating_add(1);
        }
        rest = tail;
    }
    count
}

/// Structural check of a transition table.
#[must_use]
pub const fn table_is_well_formed(table: &[StateTransition]) -> bool {
    let mut states: &[SystemState] = &SystemState::ALL;
    while let [state, tail @ ..] = states {
        if has_allowed_exit(table, *state) == state.is_terminal() {
            return false;
        }
        states = tail;
    }

    let mut rest = table;
    while let [row, tail @ ..] = rest {
        if same(row.from, row.to) || count_pair(table, row.from, row.to) != 1 {
            return false;
        }
        rest = tail;
    }
    true
}

const _: () = assert!(
    table_is_well_formed(TRANSITIONS),
    "transition table is malformed"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_non_terminal_state_has_an_exit() {
        for state in SystemState::ALL {
            let exits = allowed_targets(state).count();
            if state.is_terminal() {
                assert_eq!(exits, 0, "{state} must be terminal");
            } else {
                assert!(exits > 0, "{state} has no exit");
            }
        }
    }

    #[test]
    fn test_malformed_tables_are_detected() {
        let dead_end = [allow(Init, Ready, "only one row")];
        assert!(!table_is_well_formed(&dead_end));

        let mut duplicated = TRANSITIONS.to_vec();
        duplicated.push(deny(Init, Ready, "duplicate"));
        assert!(!table_is_well_formed(&duplicated));

        let mut self_loop = TRANSITIONS.to_vec();
        self_loop.push(allow(Running, Running, "loop"));
        assert!(!table_is_well_formed(&self_loop));
    }

    #[test]
    fn test_denied_rows_carry_a_reason() {
        let row = rule(SafeMode, Running);
        assert!(matches!(row, Some(r) if !r.allowed && !r.reason.is_empty()));
    }

    #[test]
    fn test_safe_mode_exits() {
        let exits: Vec<_> = allowed_targets(SafeMode).collect();
        assert_eq!(exits, vec![Init, Shutdown]);
    }
}
