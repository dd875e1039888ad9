//! Admin client for the training platform backend.
//!
//! ARCHITECTURE
//! ============
//! `session` owns the authentication lifecycle: durable token storage, the
//! shared session context, token verification, silent refresh and the
//! periodic keeper that ties them together. `api` is the request dispatcher
//! that every CRUD call goes through; it only depends on the session for the
//! bearer token and for one refresh attempt on a 401.

pub mod api;
pub mod config;
pub mod session;
