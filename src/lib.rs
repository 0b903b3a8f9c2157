//! Tracks how many minutes a day go to a chosen set of websites.
//! The browser extension reports tab focus to a small native host, which accrues whole minutes
//! against tracked sites and resets the counters every local day.
//!

pub mod cli;
pub mod daemon;
pub mod host;
pub mod utils;
