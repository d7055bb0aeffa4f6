//! The downstream collaborator: low-level JTAG TAP access.
//!
//! The TAP bit-banger itself (shift DR/IR, TMS sequencing, run-test/idle
//! cycles) is explicitly out of scope for this driver (§1) — it lives in
//! whatever talks to the actual probe hardware (an FTDI adapter, a CMSIS-DAP
//! probe, etc). This module only defines the narrow trait the DTM link needs
//! from that layer.

/// IR value selecting the `IDCODE` register.
pub const IR_IDCODE: u32 = 0x01;
/// IR value selecting the `dtmcontrol` register.
pub const IR_DTMCONTROL: u32 = 0x10;
/// IR value selecting the `dbus` register.
pub const IR_DBUS: u32 = 0x11;
/// IR value selecting `BYPASS`.
pub const IR_BYPASS: u32 = 0x1F;

/// Low-level access to the JTAG TAP.
///
/// Implemented by the probe-specific bit-banger; this crate only consumes
/// it. A software model, [`crate::testing::FakeJtagProbe`], is provided
/// behind the `fake-probe` feature for driving the rest of this crate
/// without real hardware.
pub trait JtagAccess {
    /// Select the given IR value.
    fn select_ir(&mut self, ir: u32) -> Result<(), JtagError>;

    /// Shift `num_bits` bits through the currently selected DR, sending the
    /// low `num_bits` of `out_bits` and returning what was shifted back.
    fn shift_dr(&mut self, out_bits: u128, num_bits: u32) -> Result<u128, JtagError>;

    /// Clock `cycles` TMS=0 cycles through Run-Test/Idle.
    fn run_test_idle(&mut self, cycles: u32) -> Result<(), JtagError>;
}

/// Failure of the downstream JTAG transport.
///
/// The TAP layer is a collaborator interface (§6), so this is deliberately
/// thin: we don't model USB/adapter-specific failure modes here, only that
/// an I/O operation against the TAP failed.
#[derive(thiserror::Error, Debug)]
pub enum JtagError {
    #[error("JTAG probe I/O failed: {0}")]
    Io(String),
}
