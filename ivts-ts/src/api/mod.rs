//! HTTP API handlers for ivts-ts

pub mod health;
pub mod interviews;
pub mod sweep;

pub use health::health_routes;
pub use interviews::interview_routes;
pub use sweep::sweep_routes;
