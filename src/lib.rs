//! OIDC authentication gateway library
//!
//! Lets a web front-end delegate login to an external identity provider and
//! safely return the user to where they started.

#![deny(dead_code)]

pub mod auth;
pub mod config;
pub mod settings;
pub mod web;

#[cfg(test)]
pub(crate) mod test_support;

use auth::ClientApp;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub client_app: Arc<ClientApp>,
}
