pub mod cli;
pub mod config;
pub mod epub;
pub mod logging;
pub mod markdown;
pub mod models;
pub mod settings;
