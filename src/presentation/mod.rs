//! HTML fragments and view models.

pub mod views;
