//! Daykeeper: a personal scheduling service, built around a time-ordered
//! event index, a priority-queue event loop, and a daily wake scheduler.

pub mod domain;
pub mod infrastructure;
pub mod services;
