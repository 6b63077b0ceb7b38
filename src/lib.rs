pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod errors;
pub mod exchange;
pub mod grading;
pub mod ipc;
pub mod models;
pub mod storage;
pub mod store;
pub mod views;
