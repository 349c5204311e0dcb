//! # Exam Ingest
//!
//! Ingestion and validation pipeline for standardized-exam items.
//!
//! Questions from a legacy per-question dump are converted into canonical,
//! content-addressed records, written as a versioned dataset with a
//! checksummed manifest, and imported into a deduplicating store. The
//! manifest is a trust gate: if any checksum fails, nothing is imported.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌───────────┐   ┌──────────┐
//! │ Legacy dump │──▶│  Converter  │──▶│  Dataset  │──▶│ Integrity│
//! │ {year}/...  │   │ + heuristics│   │ +manifest │   │   gate   │
//! └─────────────┘   └─────────────┘   └───────────┘   └────┬─────┘
//!                                                          │
//!                          ┌───────────────────────────────┤
//!                          ▼                               ▼
//!                   ┌────────────┐                  ┌────────────┐
//!                   │  Importer  │─────────────────▶│ ItemStore  │
//!                   │ items.jsonl│  insert-if-absent│ (SQLite)   │
//!                   └────────────┘                  └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! exi init                  # create database
//! exi convert               # legacy dump → canonical dataset
//! exi verify                # check manifest checksums
//! exi import                # gated import + report
//! exi stats                 # items by (year, area)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Canonical item, manifest and result types |
//! | [`hash`] | Content identity and file digests |
//! | [`heuristics`] | Pluggable topic and difficulty inference |
//! | [`legacy`] | Legacy dump converter |
//! | [`manifest`] | Dataset layout, manifest building and writing |
//! | [`integrity`] | Manifest checksum validation |
//! | [`importer`] | Streaming items import |
//! | [`answer_key`] | Answer-key validation |
//! | [`pipeline`] | Conversion and the gated import run |
//! | [`report`] | Run report and store statistics |
//! | [`store`] | Item store trait and backends |
//! | [`progress`] | Progress reporting on stderr |
//! | [`commands`] | CLI command implementations |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer_key;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub mod heuristics;
pub mod importer;
pub mod integrity;
pub mod legacy;
pub mod manifest;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod store;
