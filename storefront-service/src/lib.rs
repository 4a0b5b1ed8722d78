pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payment;
pub mod repository;
pub mod services;
