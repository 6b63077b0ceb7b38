pub mod activity;
pub mod auth;
pub mod classes;
pub mod core;
pub mod exchange;
pub mod reports;
pub mod scores;
pub mod students;
pub mod subjects;
pub mod users;
pub mod views;
