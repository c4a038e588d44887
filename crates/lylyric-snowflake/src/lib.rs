//! Hosted backend: SQL API statements, Cortex Search queries and the Cortex
//! completion endpoint, all over HTTPS with a programmatic access token.

pub mod client;
pub mod search;
pub mod statements;
pub mod warehouse;

pub use client::SnowflakeClient;
pub use search::CortexSearch;
pub use statements::{Binding, StatementResult};
pub use warehouse::SnowflakeWarehouse;
