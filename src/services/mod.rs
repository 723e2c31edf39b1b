pub mod codec;
pub mod downloader;
pub mod geometry;
pub mod metadata;
pub mod pipeline;
pub mod queue;
pub mod signature;
pub mod storage;
