pub mod cli;
pub mod clock;
pub mod config;
pub mod logging;
pub mod models;
pub mod segmenter;
pub mod session;
pub mod settings;
pub mod source;
pub mod statistics;
pub mod store;
pub mod ui;
pub mod visibility;
