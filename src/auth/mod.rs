//! Authentication module
//!
//! This module provides the OIDC login gateway.
//!
//! ## Structure
//!
//! - `client`: `ClientApp`, which builds login redirects and completes callbacks
//! - `discovery`: provider metadata and signing keys, resolved once at startup
//! - `redirect`: validation of post-login destinations (open-redirect guard)
//! - `state`: single-use login state store
//! - `jwt`: ID token validation
//! - `session`: session cookie encoding
//! - `extractors`: Axum extractor for the session user
//! - `helpers`: Pure helper functions (HTTP client, URL builders, cookies)
//! - `handlers`: HTTP handlers for login, callback, logout, and userinfo
//!
//! ## Authentication Flow
//!
//! 1. User visits `/auth/login?return_url=...` → destination validated,
//!    state stored, redirect to the provider
//! 2. Provider authenticates → redirect to `/auth/callback?code=...&state=...`
//! 3. Gateway consumes the state, exchanges the code, validates the ID token,
//!    sets the session cookie → redirect to the destination bound to the state
//! 4. User visits `/auth/logout` → session cookie cleared → provider end-session

pub mod client;
pub mod discovery;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod helpers;
pub mod jwt;
pub mod redirect;
pub mod session;
pub mod state;

pub use client::{
    CallbackOutcome, CallbackParams, ClientApp, ClientAppOptions, LoginRedirect, CALLBACK_PATH,
};
pub use error::{ExchangeFailure, GatewayError};
pub use handlers::{
    callback_handler, login_handler, logout_handler, userinfo_handler, LoginQuery,
};
pub use redirect::RedirectValidator;
pub use session::{Session, SESSION_COOKIE_NAME};
pub use state::{InMemoryStateStore, LoginState, StateStore, DEFAULT_MAX_PENDING_LOGINS};
