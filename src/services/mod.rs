pub mod assets;
pub mod generation;
pub mod ingest;
pub mod media;
pub mod queue;
pub mod storage;
pub mod worker;
