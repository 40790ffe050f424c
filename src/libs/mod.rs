pub mod apc;
pub mod chunk;
pub mod config;
pub mod error;
pub mod features;
pub mod filter;
pub mod io;
pub mod mi;
pub mod msa;
pub mod pairs;
pub mod pipeline;
pub mod pool;

pub use error::MiError;
