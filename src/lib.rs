//! Cohort - a community and learning platform
//!
//! This library provides the core functionality for Cohort: news posts,
//! events with seat reservations, courses with quizzes and certificates,
//! galleries and the JSON API serving them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
