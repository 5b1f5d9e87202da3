pub mod commands;
pub mod obs;
