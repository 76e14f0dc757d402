//! genchain: Prompt-Driven Image Generation with Chained Pipelines
//!
//! One prompt plus reference images becomes one or more generated artifacts, or, when the
//! provider answers with a plan, a multi-step pipeline in which each step's last variation seeds
//! the next. Every artifact lands in a shared gallery; placeholders stand in while work is
//! pending and are always resolved or removed.

pub mod auth;
pub mod cli;
pub mod config;
pub mod credit;
pub mod error;
pub mod gallery;
pub mod generation;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod provider;
pub mod types;
pub mod upload;
