// SYNOID Merge Library Root
// Copyright (c) 2026 Xing_The_Creator | SYNOID

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod state;
pub mod ui;
