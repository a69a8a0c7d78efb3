pub mod ingest;
pub mod job;
pub mod resource;
