//! TodoLists Server - session-backed to-do lists over HTTP.
//!
//! This crate provides:
//! - A per-session store of named to-do lists and their todos
//! - Signed session cookies backed by an in-memory session store
//! - HTML pages and form handlers for managing lists
//!
//! # Architecture
//!
//! Each browser session owns a [`store::TodoListStore`]. Handlers in
//! [`routes`] resolve the session from its cookie, apply one store operation,
//! and redirect or render. Nothing is persisted: lists live only as long as
//! their session.

pub mod config;
pub mod cookie;
pub mod error;
pub mod flash;
pub mod routes;
pub mod session;
pub mod store;
pub mod views;
