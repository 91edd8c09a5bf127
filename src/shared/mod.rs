pub mod dirs;
pub mod duration;
pub mod fs_atomic;
pub mod process;
