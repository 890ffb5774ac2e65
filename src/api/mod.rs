//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /clear` - Remove every key
//! - `GET /stats` - Backend and local store statistics
//! - `GET /health` - Health check endpoint
//! - `POST /snapshot` - Take a snapshot now

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
