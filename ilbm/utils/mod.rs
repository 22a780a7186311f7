pub mod cursor;
pub mod error;
pub mod image;
pub mod info;
pub mod logger;
