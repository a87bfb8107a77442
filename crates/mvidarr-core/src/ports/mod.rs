//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IMediaServerAdapter`] - Uniform capability surface of one media server vendor
//! - [`ICatalogRepository`] - Persistent storage for catalog artists and videos
//! - [`IConflictQueue`] - Durable holding area for manually resolved conflicts

pub mod catalog_repository;
pub mod conflict_queue;
pub mod media_server;

pub use catalog_repository::{ArtistInsert, ICatalogRepository};
pub use conflict_queue::IConflictQueue;
pub use media_server::{
    ConnectionStatus, IMediaServerAdapter, Library, MediaItem, MediaType, PlayHistoryEntry,
    RemoteAlbum, RemoteArtist, RemoteTrack, ScanActivity, ScanResult, ServerSyncStatus,
    UserMetadata,
};
