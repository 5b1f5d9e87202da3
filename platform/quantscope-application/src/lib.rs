pub mod analysis;
pub mod config;
pub mod meta;
pub mod portfolio;
pub mod reporting;
pub mod research;
mod shared;
pub mod validation;
