//! Commands shipped with the framework

pub mod check;

pub use check::CheckCommand;
