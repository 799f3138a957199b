#![doc = "asset-export-core: core logic library for asset-export."]

//! Event-driven pipeline that exports content assets from a source
//! repository to destination platforms: a cursor-tracked journal consumer,
//! a shared expiring-credential cache and a pluggable destination-connector
//! dispatch layer.
//!
//! # Usage
//! Build a [`pipeline::Pipeline`] from an [`config::ExportConfig`] and call
//! `consume` (journal loop) or `export_one` (single-asset trigger). All
//! seams are traits in [`contract`] so each stage can be mocked in tests.

pub mod config;
pub mod connectors;
pub mod consume;
pub mod contract;
pub mod error;
pub mod journal;
pub mod metadata;
pub mod pipeline;
pub mod position;
pub mod repository;
pub mod state;
pub mod token;
