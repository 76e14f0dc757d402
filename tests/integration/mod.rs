//! Integration tests for genchain

mod config_integration;
mod gallery_persistence;
mod pipeline_chain;
