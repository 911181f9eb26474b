pub mod config;
pub mod invoke;
pub mod operations;
pub mod serve;
