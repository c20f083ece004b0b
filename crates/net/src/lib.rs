#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Download orchestration for rapt
//!
//! The download coordinator fetches every missing package file into the
//! staging directory with a bounded number of concurrent transfers. Two
//! transport strategies exist: an in-process multiplexed strategy built on
//! the HTTP client, and a delegated strategy that hands the whole batch to
//! one `aria2c` invocation. Both honor the same scheduling and progress
//! contract, so later pipeline stages cannot tell them apart.

mod client;
mod download;

pub use client::{NetClient, NetConfig};
pub use download::Downloader;
