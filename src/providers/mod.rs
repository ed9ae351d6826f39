//! Frame providers for the transmit driver

pub mod clock;
pub mod sequence;

pub use clock::ClockProvider;
pub use sequence::SequenceProvider;
