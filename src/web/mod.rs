//! HTTP assignment service.
//!
//! This module serves the assignment engine over HTTP using Axum. The
//! database is loaded once at start-up and shared read-only by every request.
//!
//! ## Starting the Server
//!
//! ```text
//! # Start on default port 8080
//! hiercc-assign serve --database db/
//!
//! # Bind to all interfaces with a wider shortlist
//! hiercc-assign serve --database db/ --address 0.0.0.0 -k 200
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /api/assign` - Assign a query record, or an array of records
//! - `GET /api/database` - Scheme, version and size of the loaded database
//! - `GET /health` - Liveness check

pub mod server;
