pub mod aggregator;
pub mod error;
pub mod fanout;
pub mod injection_guard;
pub mod moderation;
pub mod preprocess;
pub mod retry;
pub mod summary;
pub mod text_stage;
