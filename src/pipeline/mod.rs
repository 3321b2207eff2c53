//! Stage runtime: the [`pipe::Pipe`] trait, composition and cancellation.

pub mod adapters;
pub mod cancel;
pub mod chain;
pub mod pipe;
pub mod runtime;
