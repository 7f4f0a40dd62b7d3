//! Generation engine clients for Murmur.
//!
//! `OpenAiCompatEngine` drives any OpenAI-compatible chat-completions
//! server (llama.cpp server, vLLM, text-generation-inference) over its
//! streaming interface.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatEngine;
