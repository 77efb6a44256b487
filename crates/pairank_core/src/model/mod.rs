//! Domain model for collections, items and the vote ledger.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Validate record-level invariants before persistence.
//!
//! # Invariants
//! - Every collection and item is identified by a stable UUID.
//! - Votes are identified by their ledger sequence number.
//! - Item ratings are a materialized view of the vote ledger.

pub mod collection;
pub mod item;
pub mod vote;
