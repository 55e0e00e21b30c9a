#![forbid(unsafe_code)]

pub mod database;
pub mod models;
pub mod repository;
pub mod utils;
