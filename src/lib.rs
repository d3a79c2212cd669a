pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod newsroom;
pub mod report;
pub mod stats;
pub mod storage;
pub mod web;

pub use config::Config;
pub use error::{Error, Result};
pub use newsroom::Newsroom;
