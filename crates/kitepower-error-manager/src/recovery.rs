//! The recovery handler table.
//!
//! Each [`RecoveryStrategy`] maps to one handler. The built-in handlers carry
//! out the mechanisms the error manager owns (`RESET_COMPONENT`,
//! `RESET_SYSTEM`, `SAFE_MODE`); the delegated strategies only log, since the
//! reporting module performs them itself and resolves the error afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kitepower_component::ComponentDirectory;
use kitepower_errors::RecoveryStrategy;
use kitepower_state::{RestartRequester, SystemComponent, SystemStateManager};
use tracing::{error, info, warn};

use crate::details::RecoveryContext;

/// A recovery action. Returns whether the error can be considered resolved.
pub type RecoveryHandler = Arc<dyn Fn(&RecoveryContext<'_>) -> bool + Send + Sync>;

/// Collaborators of the built-in handlers.
#[derive(Debug, Clone)]
pub(crate) struct RecoveryTargets {
    pub(crate) state: Arc<SystemStateManager>,
    pub(crate) directory: Option<Arc<ComponentDirectory>>,
    pub(crate) restart: Option<Arc<dyn RestartRequester>>,
    pub(crate) restart_delay: Duration,
}

pub(crate) fn builtin_handlers(
    targets: &RecoveryTargets,
) -> HashMap<RecoveryStrategy, RecoveryHandler> {
    let mut table: HashMap<RecoveryStrategy, RecoveryHandler> = HashMap::new();

    table.insert(RecoveryStrategy::None, Arc::new(|_| false));
    for strategy in [
        RecoveryStrategy::Retry,
        RecoveryStrategy::Reinitialize,
        RecoveryStrategy::Fallback,
    ] {
        table.insert(strategy, Arc::new(delegate));
    }

    let state = Arc::clone(&targets.state);
    let directory = targets.directory.clone();
    table.insert(
        RecoveryStrategy::ResetComponent,
        Arc::new(move |ctx| reset_component(&state, directory.as_deref(), ctx)),
    );

    let restart = targets.restart.clone();
    let delay = targets.restart_delay;
    table.insert(
        RecoveryStrategy::ResetSystem,
        Arc::new(move |ctx| match &restart {
            Some(requester) => {
                warn!(code = %ctx.code, module = ctx.module, ?delay, "Requesting system restart");
                requester.request_system_restart(delay);
                true
            }
            None => {
                error!(code = %ctx.code, "RESET_SYSTEM requested but no restart path is wired");
                false
            }
        }),
    );

    let state = Arc::clone(&targets.state);
    table.insert(
        RecoveryStrategy::SafeMode,
        Arc::new(move |ctx| {
            let reason = format!("{} from {}", ctx.code.name(), ctx.module);
            match state.escalate_to_safe_mode(&reason) {
                Ok(()) => true,
                Err(e) => {
                    error!(code = %ctx.code, error = %e, "Safe mode escalation failed");
                    false
                }
            }
        }),
    );

    table
}

fn delegate(ctx: &RecoveryContext<'_>) -> bool {
    info!(
        code = %ctx.code,
        module = ctx.module,
        strategy = %ctx.strategy,
        "Recovery delegated to reporting module"
    );
    false
}

fn reset_component(
    state: &SystemStateManager,
    directory: Option<&ComponentDirectory>,
    ctx: &RecoveryContext<'_>,
) -> bool {
    let Some(id) = SystemComponent::from_name(ctx.module) else {
        warn!(code = %ctx.code, module = ctx.module, "RESET_COMPONENT for a module that is not a subsystem");
        return false;
    };
    let Some(directory) = directory else {
        error!(component = %id, "RESET_COMPONENT requested but no component directory is wired");
        return false;
    };
    directory
        .recover(id, state, ctx.description)
        .inspect_err(|e| warn!(component = %id, error = %e, "Component recovery failed"))
        .is_ok()
}
