pub mod agr;
pub mod animation;
pub mod cam;
pub mod config;
pub mod convert;
pub mod dictionary;
pub mod error;
pub mod sink;
pub mod skeleton;
pub mod stream;
pub mod time;
pub mod tracker;

pub use error::{DecodeError, Result};
