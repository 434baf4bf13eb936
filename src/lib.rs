pub mod config;
pub mod error;
pub mod fetch;
pub mod lookup;
pub mod pipeline;
pub mod preflight;
pub mod render;
pub mod service;
pub mod steps;
pub mod wizard;
