pub mod format;
pub mod keys;
