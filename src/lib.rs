//! Pages to Word conversion with a text-salvage fallback, plus a URL shortener and QR encoder.

pub mod config;
pub mod docx;
pub mod error;
pub mod ffi;
pub mod provider;
pub mod qr;
pub mod salvage;
pub mod shorturl;
pub mod textutil;

pub use error::{Error, Result};
