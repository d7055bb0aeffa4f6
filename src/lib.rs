//! A RISC-V external debug (draft 0.11) Debug Transport Module driver.
//!
//! This crate is the core of a JTAG-based debugger probe for 32-bit RISC-V
//! targets: it exchanges `dbus` transactions with a hart over JTAG, uses
//! Debug RAM to synthesize every register/memory/control operation out of a
//! small catalog of pre-assembled instruction sequences, and exposes a
//! target control surface (attach, halt, step, reset, register and memory
//! access, hardware breakpoints/watchpoints) for a higher-level debug
//! protocol server to drive.
//!
//! What this crate does *not* do: bit-bang the JTAG TAP itself (see
//! [`jtag::JtagAccess`], the trait the probe-specific transport implements),
//! speak GDB Remote Serial Protocol, or support anything beyond DTM version
//! 0 / debug-module version 1 / single-hart / 32-bit / spec-0.11-style
//! Debug-RAM execution.

pub mod assembly;
pub mod debugram;
pub mod dtm;
pub mod error;
pub mod jtag;
pub mod registers;
pub mod stubs;
pub mod target;
pub mod trigger;

#[cfg(any(test, feature = "fake-probe"))]
pub mod testing;

pub use dtm::{Dtm, DtmOptions};
pub use error::RiscvError;
pub use jtag::{JtagAccess, JtagError};
pub use target::{HaltReason, RiscvTarget};
pub use trigger::{Breakwatch, BreakwatchKind};
