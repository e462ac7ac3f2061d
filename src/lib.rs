//! Apex AI: a tool-calling chat web app with recipe retrieval, a recipe
//! ingestion job and MCP tool servers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(dead_code)]
#![warn(unused_imports)]
#![warn(unused_variables)]
#![deny(unused_must_use)]
#![deny(nonstandard_style)]
#![deny(overflowing_literals)]
// Clippy
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::redundant_clone)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

/// Chat pipeline, reasoning streams and typewriter replay.
pub mod chat;
/// Environment-driven configuration.
pub mod config;
/// Recipe corpus ingestion into the vector store.
pub mod ingest;
/// OpenAI-compatible chat completion client.
pub mod llm;
/// Model Context Protocol client, server and toolkits.
pub mod mcp;
/// Embeddings, Chroma client and recipe retrieval.
pub mod rag;
/// HTTP server and API routes.
#[allow(clippy::unused_async)]
pub mod server;
/// Entry helpers to start the Apex AI server.
pub mod start_apex_ai;
/// Tools offered to the chat model.
pub mod tools;
