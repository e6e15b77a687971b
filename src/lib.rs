//! Auth core for the community portal.
//!
//! ARCHITECTURE
//! ============
//! The portal's feature pages (events, jobs, directory, marketplace, and so
//! on) delegate validation and persistence to the hosted backend; this crate
//! owns the one piece of client-side state that everything else consults:
//! who is signed in, what their profile looks like, and what role they hold.
//!
//! - [`SessionStore`] holds the single [`AuthState`] snapshot and notifies
//!   subscribers on every change.
//! - [`AuthService`] drives sign-up/sign-in/sign-out against the identity
//!   provider and keeps the store current.
//! - [`services::role`] maps a user id to a [`Role`], failing closed to
//!   `user` on any error.
//! - [`guard`] is the pure decision function consulted before rendering a
//!   protected view.
//!
//! The feature pages only ever read `current_user_id()`/`current_role()`
//! from the store and call [`guard::evaluate`]; everything else here is
//! plumbing between the store and the backend.

pub mod config;
pub mod guard;
pub mod provider;
pub mod services;
pub mod state;
pub mod store;

pub use config::BackendConfig;
pub use guard::{AccessLevel, GuardDecision};
pub use provider::{
    Directory, HttpProvider, IdentityProvider, ProviderError, ProviderSession, SessionChange, SignUpOutcome,
};
pub use services::auth::{AuthError, AuthService};
pub use state::{AuthPhase, AuthState, Role, Session, UserIdentity, UserProfile};
pub use store::{SessionStore, Subscription};
