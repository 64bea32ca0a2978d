pub mod app;
pub mod ui;

pub use app::{ChatApp, Flow};
