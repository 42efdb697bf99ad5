//! Zenfeed - Feed Intervention Engine
//!
//! Classifies visible feed items, scores their compulsive-engagement risk and
//! decides whether to leave, blur, remove or substitute them with a productive
//! alternative. A short learning period passes before any intervention.

pub mod behavior;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod recommend;
pub mod scoring;
pub mod server;
pub mod store;

pub use error::{Result, ZenfeedError};
