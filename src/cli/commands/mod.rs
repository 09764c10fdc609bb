pub mod config;
pub mod exclude;
pub mod init;
pub mod module;
pub mod status;
pub mod sync;
