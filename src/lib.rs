//! RFID card-scan admin service.
//!
//! A scan resolves the card through a bounded TTL cache in front of the
//! student directory, then the [`hub::EventHub`] pushes a load instruction
//! to every connected dashboard over server-sent events.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod hub;
pub mod infra;
pub mod presentation;
