pub mod admin;
pub mod app;
pub mod booking;
pub mod config;
pub mod engine;
pub mod flow;
pub mod limits;
pub mod model;
pub mod observability;
pub mod reaper;
pub mod repository;
pub mod wal;
