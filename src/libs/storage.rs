pub mod database;
pub mod feed;
pub mod records;
