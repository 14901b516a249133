//! Traffic-report lifecycle and route relevance for the ButterflyNAV route
//! planner: submission with local fallback, TTL expiry, padded-bounding-box
//! relevance filtering, and the `/traffic-reports` endpoint backing it all.

#![warn(missing_docs)]

/// Client for the remote `/traffic-reports` endpoint.
pub mod client;
/// The per-install device identifier.
pub mod device;
/// Client for the third-party routing and geocoding provider.
pub mod directions;
/// Route-relevance filtering and result-set deduplication.
pub mod filter;
/// Coordinate parsing, validation, and bounding-box math.
pub mod geo;
/// Client-side submission and retrieval pipelines.
pub mod pipeline;
/// The traffic report data model.
pub mod report;
/// The `/traffic-reports` HTTP server.
pub mod server;
/// Report persistence: the ephemeral server store and the durable client cache.
pub mod store;
