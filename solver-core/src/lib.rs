//! Core logic for the math solver gateway: conversation state, media
//! encoding, the Gemini provider, and the HTTP endpoint handlers. The
//! `gateway` binary wires these into an Axum server.

pub mod config;
pub mod conversation;
pub mod endpoints;
pub mod error;
pub mod gateway_util;
pub mod inference;
pub mod media;
pub mod observability;
pub mod providers;
