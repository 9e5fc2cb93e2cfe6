//! Terminal progress output.

pub mod spinner;

pub use spinner::{Spinner, with_progress};
