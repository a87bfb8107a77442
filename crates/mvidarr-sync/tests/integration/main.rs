//! Integration tests for mvidarr-sync
//!
//! Drives the sync engine and the orchestrator against scripted in-process
//! media servers and an in-memory SQLite catalog.

mod common;

mod test_engine;
mod test_orchestrator;
