pub mod lines;

pub use lines::{LineDecoder, LogicalLine};
