//! # marks-rag core
//!
//! Runtime-free building blocks for the marks-rag answering pipeline:
//! the embedding model catalog, the index / embedding / generation traits,
//! metadata text extraction, marks-scaled prompt construction, and the
//! query statistics tracker. The [`testing`] module holds offline
//! stand-ins for the loader and generation backend.
//!
//! This crate performs no network I/O and pulls in no async runtime. The
//! `marks-rag` application crate supplies the HTTP clients, the model
//! selector, and the query orchestrator on top of these pieces.

pub mod catalog;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod models;
pub mod prompt;
pub mod stats;
pub mod testing;
