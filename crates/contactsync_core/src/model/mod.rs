//! Directory domain model shared by every account.
//!
//! # Responsibility
//! - Define explicit value types for groups and contacts.
//! - Provide pure helpers for identity, print-name and marker extraction.
//!
//! # Invariants
//! - Once tagged, an entity's identity is its UID and nothing else.
//! - Model types carry no account handle; they are plain data.

pub mod contact;
pub mod group;
pub mod marker;
pub mod uid;
