//! Built-in record handlers

mod log;

pub use log::LogHandler;
