//! The `utils` module provides the pieces shared across `chatbus`: the error
//! taxonomy and logging setup.

pub mod error;
pub mod logging;
