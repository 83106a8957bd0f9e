// src/lib.rs

//! Film Crawler Library
//!
//! Collects film metadata from a catalogue site through a browser session:
//! listing pages give detail links, detail pages give raw records, raw
//! records are normalized and fanned out to the enabled storage sinks.

pub mod browser;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
