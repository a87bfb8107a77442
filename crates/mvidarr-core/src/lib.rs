//! MVidarr Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `CatalogArtist`, `CatalogVideo`, `Conflict`, `SyncResult`, `AggregateResult`
//! - **Port definitions** - Traits for adapters: `IMediaServerAdapter`, `ICatalogRepository`, `IConflictQueue`
//! - **Configuration** - YAML-backed settings for strategies, policies and servers
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement: media server
//! drivers implement `IMediaServerAdapter`, the SQLite cache implements the
//! catalog and conflict queue ports. The sync and conflict crates only ever
//! see the traits.

pub mod config;
pub mod domain;
pub mod ports;
