pub mod generator;
pub mod pdf;
pub mod summarizer;

pub use generator::{MinutesError, MinutesGenerator, MinutesResult, TranscriptSource};
pub use summarizer::{LocalSummarizer, RemoteSummarizer, Summarizer};
