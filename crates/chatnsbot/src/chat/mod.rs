//! Interactive chat loop.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;

pub use loop_runner::ChatBot;
