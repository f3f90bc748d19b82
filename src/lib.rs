pub mod constants;
pub mod extractor;
pub mod github;
pub mod llm;
pub mod preview;
pub mod session;
pub mod web_server;
