#![doc = include_str!("../README.md")]

mod config;
pub mod html;
pub mod shortcodes;

pub use config::*;
