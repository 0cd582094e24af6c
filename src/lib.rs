//! Group feed monitor library.
//!
//! A service that ingests social-media posts scraped from group feeds, stores
//! them with stable identity, classifies them by topic and location (AI
//! classifier with a deterministic keyword fallback), and serves them to a
//! dashboard under combinable filters with recency ordering.

pub mod classify;
pub mod config;
pub mod db;
pub mod ingest;
pub mod notify;
pub mod query;
pub mod timestamp;
pub mod web;
