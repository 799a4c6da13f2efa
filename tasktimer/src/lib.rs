//! `TaskTimer`: terminal task timer library.

pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod export;
pub mod storage;
pub mod tasks;
pub mod ticker;
pub mod tracker;
pub mod ui;
