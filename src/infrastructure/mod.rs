pub mod augmentation;
pub mod catalog;
pub mod loader;
