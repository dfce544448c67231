pub mod expander;
pub mod name_resolver;
pub mod pager;
pub mod preview_cache;
pub mod projector;
pub mod storage;
pub mod transfer;
