//! Session gating for protected views.
//!
//! A view mounts a [`SessionGate`] for the privilege it needs. The gate asks
//! an [`IdentityProvider`] who the caller is, settles on `Granted` or
//! `Denied`, and on denial tells a [`Navigator`] where to send the user:
//! the login view when the caller is not signed in, the home view when a
//! signed-in customer opens an admin-only view.

pub mod gate;
pub mod identity;
pub mod navigation;

pub use gate::{DenialReason, GateHandle, GateState, SessionGate, ViewAccess};
pub use identity::{IdentityProvider, SessionPrincipal};
pub use navigation::{Navigator, RedirectPaths, RedirectRecorder, RedirectTarget};
