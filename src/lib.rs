// src/lib.rs
pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod greeting;
pub mod memory;
pub mod models;
pub mod purchase;
pub mod screens;
pub mod subscription;
pub mod view;
