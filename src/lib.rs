//! Client for a marketplace seller analytics backend, with the local
//! stock-status, supply-priority and sales-trend classification every
//! planning report is rendered from.

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod models;
pub mod report;
pub mod session;
