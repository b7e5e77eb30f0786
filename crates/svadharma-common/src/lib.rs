pub mod error;
pub mod gemini;
pub mod kv;
pub mod redis;
pub mod roadmap;
