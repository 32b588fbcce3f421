//! geoharvest - geospatial metadata catalogue harvester.
//!
//! Periodically harvests metadata records from external catalogue endpoints,
//! validates mandatory fields, persists each record to object storage, and
//! announces persisted records on a message queue for downstream enrichment.
//! One invocation performs one run; scheduling is external.

pub mod backup;
pub mod cli;
pub mod clients;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod harvest;
pub mod models;
pub mod orchestrate;
pub mod validation;
pub mod xml;
