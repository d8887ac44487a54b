//! # marks-rag
//!
//! Exam-style answers scaled to a marks value, grounded in documents from
//! a vector index whose embedding model is unknown.
//!
//! At startup the index dimension is discovered, every catalog model of
//! that dimension is benchmarked against the index, and the best scorer
//! becomes the active embedding model. Questions are then embedded,
//! matched against the index, and answered by a chat-completion backend
//! with a prompt sized to the requested marks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Dimension   │──▶│    Model     │──▶│   Pipeline   │
//! │  discovery   │   │  selection   │   │ retrieve+gen │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                         ┌────────────────────┤
//!                         ▼                    ▼
//!                    ┌──────────┐        ┌──────────┐
//!                    │   CLI    │        │   HTTP   │
//!                    │  (mrag)  │        │  server  │
//!                    └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export PINECONE_API_KEY=... GROQ_API_KEY=...
//! mrag models --dimension 768           # what could have built the index
//! mrag ask "Explain the SDLC" --marks 8
//! mrag diagnose --save
//! mrag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`http`] | Shared JSON POST with retry and backoff |
//! | [`embedding`] | Local, OpenAI, and Ollama embedders plus the model cache |
//! | [`pinecone`] | Pinecone index client |
//! | [`groq`] | Groq chat-completion client |
//! | [`selector`] | Benchmark-driven embedding model selection |
//! | [`retrieval`] | Query embedding and index search with retries |
//! | [`synthesize`] | Marks-scaled answer generation |
//! | [`pipeline`] | Query orchestration and statistics |
//! | [`diagnose`] | Health checks, test queries, and reports |
//! | [`stats`] | Statistics printout |
//! | [`server`] | HTTP server |

pub mod config;
pub mod diagnose;
pub mod embedding;
pub mod groq;
pub mod http;
pub mod pinecone;
pub mod pipeline;
pub mod retrieval;
pub mod selector;
pub mod server;
pub mod stats;
pub mod synthesize;
