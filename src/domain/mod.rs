pub mod attestation;
pub mod instrument;
pub mod state;
pub mod trade;

pub use attestation::*;
pub use instrument::*;
pub use state::*;
pub use trade::*;
