//! External opinion APIs (non-exchange)

pub mod llm;
