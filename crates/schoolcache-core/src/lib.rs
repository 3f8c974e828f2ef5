//! Core library for schoolcache.
//!
//! A read-through cache and derivation layer over a school administration
//! store (students, teachers, classes, assignments, attendance, fees,
//! grades and announcements).
//!
//! - [`schema`] describes every entity table and its embeddable relations.
//! - [`api`] talks to the store: the REST backend for production and an
//!   in-memory backend for tests and demos.
//! - [`query`] validates requests, runs them and decodes typed entities.
//! - [`cache`] keeps query results with single-flight fetching,
//!   staleness, subscriptions and eviction.
//! - [`invalidation`] maps each mutation to the cache namespaces it affects.
//! - [`metrics`] and [`dashboard`] derive GPA, fee standing and attendance
//!   from fetched records.
//! - [`queries`] is the catalog of named queries; [`client`] ties it all
//!   together for front ends.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod invalidation;
pub mod metrics;
pub mod models;
pub mod queries;
pub mod query;
pub mod schema;

pub use api::{ApiError, Backend, MemoryBackend, RestBackend};
pub use cache::{CacheEntry, CacheSettings, CacheStore, FetchStatus, Subscription};
pub use client::{Mutation, SchoolClient};
pub use config::Config;
pub use dashboard::{find_student_for_user, StudentDashboard};
pub use invalidation::{InvalidationGraph, MutationKind};
pub use query::{QueryError, QueryKey};
pub use schema::EntityKind;
