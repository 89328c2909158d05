//! Document store seams (host-owned persistence).

pub mod slip_store;

pub use slip_store::{InMemorySlipStore, SlipStore, SlipStoreError};
