//! # Slotwise
//!
//! Vendor scheduling and booking engine.
//!
//! This crate turns a vendor's recurring weekly availability into bookable
//! time slots and manages the reservations made against them: conflict-free
//! capacity accounting per `(slot, date)`, a booking lifecycle state machine,
//! and an optional REST API via Axum.
//!
//! ## Features
//!
//! - **Availability rules**: Recurring weekly schedules with breaks, buffers,
//!   effective-date windows and date-range overrides
//! - **Slot generation**: Pure, deterministic expansion of a rule into
//!   uniformly-spaced slot templates
//! - **Reservations**: An atomic per-date ledger that makes double-booking
//!   impossible up to each slot's capacity
//! - **Bookings**: A pending → confirmed → in_progress → completed lifecycle
//!   with cancellation from any non-terminal state
//! - **HTTP API**: RESTful endpoints for vendor and booking workflows
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Identifier newtypes and outcome types returned by services
//! - [`models`]: Domain types (rules, slots, bookings) and their validation
//! - [`db`]: Repository pattern and persistence layer
//! - [`services`]: High-level business logic
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;

pub mod db;
pub mod models;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
