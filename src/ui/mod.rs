pub mod overlay;
pub mod windows;
