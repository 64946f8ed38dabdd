//! Parley - a minimal streaming chat front-end for OpenAI and Google Gemini.

pub mod chat;
pub mod config;
pub mod handlers;
pub mod llm;
pub mod pipeline;
pub mod profile;
pub mod response;
pub mod server;
pub mod session;
