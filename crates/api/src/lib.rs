//! Strava NoShoes API server library.
//!
//! Hosts the GPX retention sweeper behind a small HTTP surface. The binary
//! entrypoint and the integration tests share everything in here.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
