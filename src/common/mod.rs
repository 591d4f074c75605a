pub mod date;
pub mod error;
pub mod media_id;
pub mod sanitize;
pub mod tags;

pub use error::{Error, Result};
pub use sanitize::{sanitize, title_stem};
