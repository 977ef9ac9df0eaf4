//! Core payment domain types.

pub mod payment;
