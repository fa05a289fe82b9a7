use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::identity::{IdentityProvider, SessionPrincipal};
use super::navigation::{Navigator, RedirectTarget};
use crate::errors::IdentityError;

/// Privilege a view requires before it may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewAccess {
    Member,
    Admin,
}

/// Why a gate refused a view. Each reason has its own redirect target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The identity query failed or returned an anonymous principal.
    Unauthenticated,
    /// Signed in, but the view needs an administrator.
    Forbidden,
}

impl DenialReason {
    pub fn redirect_target(&self) -> RedirectTarget {
        match self {
            Self::Unauthenticated => RedirectTarget::Login,
            Self::Forbidden => RedirectTarget::Home,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Checking,
    Granted(SessionPrincipal),
    Denied(DenialReason),
}

impl GateState {
    /// Protected content may only render once access is granted.
    pub fn is_renderable(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Checking)
    }
}

/// Decides whether a view may render for the current session.
///
/// A gate is cheap and carries no state of its own; every mount issues a
/// fresh identity query and owns its result.
#[derive(Debug, Clone, Copy)]
pub struct SessionGate {
    access: ViewAccess,
}

impl SessionGate {
    pub fn new(access: ViewAccess) -> Self {
        Self { access }
    }

    pub fn member() -> Self {
        Self::new(ViewAccess::Member)
    }

    pub fn admin() -> Self {
        Self::new(ViewAccess::Admin)
    }

    pub fn access(&self) -> ViewAccess {
        self.access
    }

    /// Map the outcome of an identity query to a settled state.
    pub fn decide(&self, outcome: Result<SessionPrincipal, IdentityError>) -> GateState {
        match outcome {
            Err(err) => {
                debug!(error = %err, "identity query failed");
                GateState::Denied(DenialReason::Unauthenticated)
            }
            Ok(principal) if !principal.is_authenticated => {
                GateState::Denied(DenialReason::Unauthenticated)
            }
            Ok(principal) if self.access == ViewAccess::Admin && !principal.is_admin => {
                GateState::Denied(DenialReason::Forbidden)
            }
            Ok(principal) => GateState::Granted(principal),
        }
    }

    /// Run one check to completion, redirecting on denial.
    ///
    /// Used where the caller owns the whole lifecycle, e.g. a single HTTP
    /// request; dropping the returned future abandons the check.
    pub async fn check(
        &self,
        identity: &dyn IdentityProvider,
        navigator: &dyn Navigator,
    ) -> GateState {
        let state = self.decide(identity.current_principal().await);
        apply_side_effects(self.access, &state, navigator);
        state
    }

    /// Start a check in the background and return a handle the view observes.
    ///
    /// The handle reports `Checking` until the identity query settles. If the
    /// handle is unmounted (or dropped) first, the settled result is thrown
    /// away: the state stays `Checking` and no redirect is issued.
    pub fn mount(
        &self,
        identity: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
    ) -> GateHandle {
        let (state_tx, state_rx) = watch::channel(GateState::Checking);
        let mounted = Arc::new(Mutex::new(true));
        let gate = *self;
        let task_mounted = Arc::clone(&mounted);

        tokio::spawn(async move {
            let outcome = identity.current_principal().await;
            let guard = match task_mounted.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !*guard {
                debug!(access = ?gate.access, "view unmounted before identity settled, discarding");
                return;
            }
            let state = gate.decide(outcome);
            let _ = state_tx.send(state.clone());
            apply_side_effects(gate.access, &state, navigator.as_ref());
        });

        GateHandle {
            state: state_rx,
            mounted,
        }
    }
}

fn apply_side_effects(access: ViewAccess, state: &GateState, navigator: &dyn Navigator) {
    match state {
        GateState::Denied(reason) => {
            let target = reason.redirect_target();
            warn!(?access, ?reason, %target, "access denied, redirecting");
            navigator.redirect(target);
        }
        GateState::Granted(principal) => {
            debug!(?access, customer_id = ?principal.customer_id, "access granted");
        }
        GateState::Checking => {}
    }
}

/// A mounted gate, owned by the view that mounted it.
pub struct GateHandle {
    state: watch::Receiver<GateState>,
    mounted: Arc<Mutex<bool>>,
}

impl GateHandle {
    pub fn state(&self) -> GateState {
        self.state.borrow().clone()
    }

    pub fn is_renderable(&self) -> bool {
        self.state.borrow().is_renderable()
    }

    pub fn is_mounted(&self) -> bool {
        match self.mounted.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Detach the view. A check still in flight will not touch state or
    /// navigate once this returns.
    pub fn unmount(&self) {
        match self.mounted.lock() {
            Ok(mut guard) => *guard = false,
            Err(poisoned) => *poisoned.into_inner() = false,
        }
    }

    /// Wait until the check settles. Returns `Checking` if the check was
    /// discarded because the view unmounted first.
    pub async fn settled(&mut self) -> GateState {
        loop {
            let current = self.state.borrow_and_update().clone();
            if current.is_settled() {
                return current;
            }
            if self.state.changed().await.is_err() {
                return self.state.borrow().clone();
            }
        }
    }

}

impl Drop for GateHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}
