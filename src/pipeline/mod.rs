pub mod batcher;
pub mod config;
pub mod generator;
pub mod mixing;
pub mod split;
