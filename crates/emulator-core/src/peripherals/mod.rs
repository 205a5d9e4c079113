//! Devices that attach to the I/O page.

/// DL11 serial line console.
pub mod dl11;

pub use dl11::{Dl11, DL11_BASE, DL11_LEN};
