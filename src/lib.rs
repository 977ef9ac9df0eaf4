//! Payment orchestration service.
//!
//! Accepts payment requests, creates transactions on an external gateway,
//! persists payment state in Postgres, and reconciles stored status with
//! gateway-reported status across read-through refresh, force-check, and
//! inbound webhooks.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod service;
pub mod storage;
pub mod webhook;
