//! HTTP collaborators for `trail`.
//!
//! - [`slack::SlackClient`]: the user and emoji lists, and message delivery.
//! - [`ultipro::UltiproClient`]: a logged-in session against the HR org chart.
//! - [`images::ImageSearch`]: image lookup for the manual test command.

pub mod error;
pub mod images;
pub mod slack;
pub mod ultipro;

pub use error::{Error, Result};
