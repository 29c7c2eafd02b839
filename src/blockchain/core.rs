// core.rs splits block construction, payload schema and chain verification.
pub mod chain;
pub mod payload;
pub mod validation;

pub use chain::*;
pub use payload::*;
pub use validation::*;
