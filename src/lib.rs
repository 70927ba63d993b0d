pub mod algorithms;
pub mod balancer;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod output;
pub mod pattern;
pub mod schedule;
pub mod server;
