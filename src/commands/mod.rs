//! Commands Module
//!
//! All CLI subcommand implementations.

pub mod build_vocab;
pub mod evaluate;
pub mod gen_blank;
pub mod info;
pub mod train;
