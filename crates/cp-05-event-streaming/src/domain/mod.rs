//! Streaming domain: events, consumers, dead letters and configuration.

pub mod config;
pub mod consumer;
pub mod dead_letter;
pub mod event;
