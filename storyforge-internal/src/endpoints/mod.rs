pub mod fallback;
pub mod generate;
pub mod status;
pub mod subscription;
