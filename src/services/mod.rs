//! Auth services driving the session store.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the transitions of the session store so the
//! presentation layer stays focused on rendering and form plumbing.

pub mod auth;
pub mod role;
