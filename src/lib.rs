#![allow(async_fn_in_trait)]
pub mod config;
pub mod data_api;
pub mod download;
pub mod download_plan;
mod error;
pub mod filter;
pub mod image_selection;
pub mod planet;
pub mod poll;

pub use error::{Error, FailureKind, Result};
