//! Result combinators shared by image-janitor crates.

pub mod result;

pub use result::ResultExt;
