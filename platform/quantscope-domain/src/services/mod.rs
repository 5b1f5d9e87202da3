pub mod backtest;
pub mod dataset;
pub mod factors;
pub mod models;
pub mod ohlcv;
pub mod portfolio;
pub mod scoring;
pub mod training;
