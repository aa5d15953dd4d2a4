pub mod engine;
pub mod indicators;
pub mod series;
pub mod strategy;
