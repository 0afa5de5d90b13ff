pub mod blobs;
pub mod database;
