//! # Partner Center SDK Library
//!
//! Core library for authenticating against the Microsoft Partner Center
//! REST API. This library models the partner credential context, selects
//! among the supported Azure AD token-acquisition strategies, and manages
//! the process-wide authentication session.
//!
//! ## Modules
//!
//! - [`auth`] - Credential contexts, the authentication selector, token
//!   acquisition flows, and session management
//! - [`environment`] - The registry of Partner Center cloud environments
//!   and their service endpoints

pub mod auth;
pub mod environment;
