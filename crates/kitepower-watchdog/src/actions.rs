//! The breach action handler table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kitepower_component::ComponentDirectory;
use kitepower_state::{RestartRequester, SystemComponent, SystemStateManager};
use serde::Serialize;
use tracing::{error, warn};

use crate::config::WatchdogAction;

/// What a breach handler is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Breach {
    /// Silent subsystem.
    pub component: SystemComponent,
    /// Silence observed by the sweep.
    pub elapsed: Duration,
    /// Configured timeout.
    pub timeout: Duration,
    /// Configured action.
    pub action: WatchdogAction,
    /// Breaches of this component so far, this one included.
    pub error_count: u32,
}

impl Breach {
    /// Human description used for reports and state reasons.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "no heartbeat from {} for {} ms (timeout {} ms)",
            self.component,
            self.elapsed.as_millis(),
            self.timeout.as_millis()
        )
    }
}

/// A breach action. Returns whether it succeeded.
pub type ActionHandler = Arc<dyn Fn(&Breach) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct ActionTargets {
    pub(crate) state: Arc<SystemStateManager>,
    pub(crate) directory: Option<Arc<ComponentDirectory>>,
    pub(crate) restart: Option<Arc<dyn RestartRequester>>,
    pub(crate) restart_delay: Duration,
}

pub(crate) fn builtin_handlers(targets: &ActionTargets) -> HashMap<WatchdogAction, ActionHandler> {
    let mut table: HashMap<WatchdogAction, ActionHandler> = HashMap::new();

    table.insert(WatchdogAction::LogOnly, Arc::new(|_| true));

    let state = Arc::clone(&targets.state);
    let directory = targets.directory.clone();
    table.insert(
        WatchdogAction::ResetComponent,
        Arc::new(move |breach| {
            let Some(directory) = &directory else {
                error!(component = %breach.component, "No component directory to reset from");
                return false;
            };
            directory
                .recover(breach.component, &state, &breach.describe())
                .inspect_err(|e| warn!(component = %breach.component, error = %e, "Watchdog reset failed"))
                .is_ok()
        }),
    );

    let restart = targets.restart.clone();
    let delay = targets.restart_delay;
    table.insert(
        WatchdogAction::ResetSystem,
        Arc::new(move |breach| match &restart {
            Some(requester) => {
                requester.request_system_restart(delay);
                true
            }
            None => {
                error!(component = %breach.component, "No restart path for RESET_SYSTEM");
                false
            }
        }),
    );

    let state = Arc::clone(&targets.state);
    table.insert(
        WatchdogAction::SafeMode,
        Arc::new(move |breach| {
            state
                .escalate_to_safe_mode(&breach.describe())
                .inspect_err(|e| error!(component = %breach.component, error = %e, "Safe mode escalation failed"))
                .is_ok()
        }),
    );

    table
}
