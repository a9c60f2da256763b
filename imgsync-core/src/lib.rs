#![doc = "imgsync-core: core logic library for imgsync."]

//! This crate contains the inventories, the sync planner and executor, and the
//! manifest model for imgsync. Service-specific upload clients are not
//! included here; they implement [`contract::ObjectStore`] in their own crate.
//!
//! # Usage
//! Add this as a dependency for shared inventory, planning, config and sync
//! code.

pub mod config;
pub mod contract;
pub mod error;
pub mod flat;
pub mod inventory;
pub mod manifest;
pub mod synchronise;
