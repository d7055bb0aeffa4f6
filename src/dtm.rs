//! DTM Link (§4.1): `dbus` transaction encoding, status handling, and the
//! sticky-error / status-3 retry discipline.

use bitfield::bitfield;

use crate::jtag::{JtagAccess, JtagError, IR_DBUS, IR_DTMCONTROL};
use crate::error::RiscvError;

/// `dbus` op field: no-op (used as the second half of a read pipeline).
const OP_NOP: u128 = 0;
/// `dbus` op field: arm a read of `addr`.
const OP_READ: u128 = 1;
/// `dbus` op field: write `data34` to `addr`.
const OP_WRITE: u128 = 2;

/// Status: transaction committed, data field is valid.
const STATUS_OK: u128 = 0;
/// Status: failed; the sticky error flag is latched, no retry.
const STATUS_FAILED: u128 = 2;
/// Status: bus busy; recover and resend.
const STATUS_BUSY: u128 = 3;

const DMINFO_ADDRESS: u32 = 0x11;
const DMCONTROL_ADDRESS: u32 = 0x10;

bitfield! {
    /// The `dtmcontrol` JTAG register (draft 0.11 DTM v0 layout, §6):
    /// version, the split `abits` field, `idle`, and the write-one
    /// `dbusreset` bit.
    pub struct Dtmcontrol(u32);
    impl Debug;
    pub version, set_version: 3, 0;
    pub abits_lo, set_abits_lo: 7, 4;
    pub idle, set_idle: 12, 10;
    pub abits_hi, set_abits_hi: 14, 13;
    pub dbusreset, set_dbusreset: 16;
}

bitfield! {
    /// The `dminfo` register (§6): debug-module version, authentication,
    /// and Debug RAM size.
    pub struct Dminfo(u32);
    impl Debug;
    pub dmversion, set_dmversion: 1, 0;
    pub authenticated, set_authenticated: 5;
    pub dramsize, set_dramsize: 15, 10;
}

/// The Debug RAM layout the stub catalog's fixed jump offsets assume (§9).
pub const EXPECTED_DRAMSIZE: u8 = 16;

/// Knobs governing timing/size assumptions the real hart varies (§A.4).
///
/// The `Default` impl matches the draft-0.11 protocol's own behavior: an
/// unbounded busy-wait in the executor and trusting whatever `idle` the
/// hart reports at attach.
#[derive(Debug, Clone, Copy)]
pub struct DtmOptions {
    /// Upper bound on status-3 recovery retries before giving up and
    /// latching the sticky error flag. `None` retries forever, matching
    /// an unbounded-by-design retry policy (§7).
    pub max_busy_retries: Option<u32>,
}

impl Default for DtmOptions {
    fn default() -> Self {
        DtmOptions {
            max_busy_retries: None,
        }
    }
}

/// DTM state for one scanned hart (§3).
pub struct Dtm {
    probe: Box<dyn JtagAccess>,
    abits: u32,
    idle: u32,
    dramsize: u8,
    last_dbus: u128,
    error: bool,
    halt_requested: bool,
    options: DtmOptions,
}

impl Dtm {
    /// Scan the hart at the current IR/DR state, validate it against the
    /// protocol-refusal conditions (§7), and build the DTM state.
    ///
    /// Returns `Err` for transport failures and for the protocol-refusal
    /// conditions this layer is able to detect before a target object
    /// exists: unsupported DTM version, unsupported debug-module version,
    /// not authenticated, and unexpected `dramsize` (§9's Open Question —
    /// the stub catalog's fixed jump offsets assume `dramsize == 16`, so we
    /// refuse to attach rather than silently execute stubs that would jump
    /// to the wrong address).
    pub fn new(mut probe: Box<dyn JtagAccess>, options: DtmOptions) -> Result<Self, RiscvError> {
        probe.select_ir(IR_DTMCONTROL)?;
        let dtmcontrol = Dtmcontrol(probe.shift_dr(0, 32)? as u32);

        let version = dtmcontrol.version() as u8;
        if version != 0 {
            return Err(RiscvError::UnsupportedDtmVersion(version));
        }
        let abits = (dtmcontrol.abits_hi() << 4) | dtmcontrol.abits_lo();
        let idle = dtmcontrol.idle();

        tracing::debug!(abits, idle, "scanned dtmcontrol");

        probe.select_ir(IR_DBUS)?;
        let mut dtm = Dtm {
            probe,
            abits,
            idle,
            dramsize: 0,
            last_dbus: 0,
            error: false,
            halt_requested: false,
            options,
        };

        let dminfo = Dminfo(dtm.read(DMINFO_ADDRESS)? as u32);
        let dmversion = dminfo.dmversion() as u8;
        if dmversion != 1 {
            return Err(RiscvError::UnsupportedDebugModuleVersion(dmversion));
        }
        if !dminfo.authenticated() {
            return Err(RiscvError::NotAuthenticated);
        }
        let dramsize = dminfo.dramsize() as u8;
        if dramsize != EXPECTED_DRAMSIZE {
            return Err(RiscvError::UnexpectedDramSize(dramsize));
        }
        dtm.dramsize = dramsize;

        tracing::debug!(dmversion, dramsize, "attached debug module");
        Ok(dtm)
    }

    /// Words of Debug RAM minus one; index of the completion/return slot.
    pub fn dramsize(&self) -> u8 {
        self.dramsize
    }

    pub fn halt_requested(&self) -> bool {
        self.halt_requested
    }

    pub fn set_halt_requested(&mut self, value: bool) {
        self.halt_requested = value;
    }

    fn encode(&self, addr: u32, data34: u64, op: u128) -> u128 {
        ((addr as u128) << 36) | ((data34 as u128) << 2) | op
    }

    /// Perform a single raw `dbus` shift, applying the sticky-error and
    /// status-3 retry discipline (§4.1).
    ///
    /// Returns `Ok(0)` without touching the TAP while the sticky error flag
    /// is set (§3 invariant).
    fn raw_dbus(&mut self, payload: u128) -> Result<u128, RiscvError> {
        if self.error {
            return Ok(0);
        }

        let num_bits = self.abits + 36;
        let mut attempt = payload;
        let mut retries = 0u32;
        loop {
            let resp = self.probe.shift_dr(attempt, num_bits)?;
            let status = resp & 0x3;
            match status {
                STATUS_OK => {
                    self.last_dbus = attempt;
                    return Ok((resp >> 2) & ((1u128 << 34) - 1));
                }
                STATUS_FAILED => {
                    tracing::debug!("dbus status=2, latching sticky error");
                    self.error = true;
                    return Ok(0);
                }
                STATUS_BUSY => {
                    if let Some(max) = self.options.max_busy_retries {
                        if retries >= max {
                            tracing::debug!("dbus retry bound exceeded, latching sticky error");
                            self.error = true;
                            return Ok(0);
                        }
                    }
                    retries += 1;
                    tracing::debug!(retries, "dbus status=3, recovering");
                    self.recover_from_retry()?;
                    // Replay the previous transaction, then fall through to
                    // re-issue the one we actually wanted.
                    let replay_bits = self.abits + 36;
                    self.probe.shift_dr(self.last_dbus, replay_bits)?;
                    self.run_idle()?;
                    // loop re-issues `attempt` (the current transaction)
                }
                _ => unreachable!("dbus status is a 2-bit field"),
            }
            self.run_idle()?;
        }
    }

    fn run_idle(&mut self) -> Result<(), JtagError> {
        self.probe.run_test_idle(self.idle)
    }

    /// Status-3 recovery: bus reset via `dtmcontrol`, then reselect `dbus`.
    fn recover_from_retry(&mut self) -> Result<(), JtagError> {
        self.probe.select_ir(IR_DTMCONTROL)?;
        let mut dtmcontrol = Dtmcontrol(0);
        dtmcontrol.set_dbusreset(true);
        let Dtmcontrol(raw) = dtmcontrol;
        self.probe.shift_dr(raw as u128, 32)?;
        self.probe.select_ir(IR_DBUS)?;
        Ok(())
    }

    /// Read `addr` (§4.1's two-shift read pipeline: arm, then collect).
    pub fn read(&mut self, addr: u32) -> Result<u64, RiscvError> {
        let arm = self.encode(addr, 0, OP_READ);
        self.raw_dbus(arm)?;
        self.run_idle()?;
        let collect = self.encode(0, 0, OP_NOP);
        let data = self.raw_dbus(collect)?;
        self.run_idle()?;
        Ok(data as u64)
    }

    /// Write `data34` to `addr`.
    pub fn write(&mut self, addr: u32, data34: u64) -> Result<(), RiscvError> {
        let payload = self.encode(addr, data34, OP_WRITE);
        self.raw_dbus(payload)?;
        self.run_idle()?;
        Ok(())
    }

    /// Clear the sticky error flag, reporting whether it had been set.
    ///
    /// Per §4.4/§7: issues a `dbus` reset unconditionally, then reports and
    /// clears whatever the flag's prior value was.
    pub fn check_error(&mut self) -> Result<bool, RiscvError> {
        self.recover_from_retry()?;
        self.run_idle()?;
        let was_set = self.error;
        self.error = false;
        Ok(was_set)
    }

    /// Read `dmcontrol`, the register whose bit 32 (HALTNOT) indicates the
    /// hart is currently halted (§4.4, §6).
    pub fn read_dmcontrol(&mut self) -> Result<u64, RiscvError> {
        self.read(DMCONTROL_ADDRESS)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::FakeJtagProbe;

    #[test]
    fn encode_matches_wire_layout() {
        let probe = FakeJtagProbe::new_attached();
        let dtm = Dtm::new(Box::new(probe), DtmOptions::default()).unwrap();
        let payload = dtm.encode(0x11, 0x1_2345_6789, OP_WRITE);
        assert_eq!(payload & 0x3, OP_WRITE);
        assert_eq!((payload >> 2) & ((1u128 << 34) - 1), 0x1_2345_6789);
        assert_eq!(payload >> 36, 0x11);
    }

    #[test]
    fn attach_rejects_unsupported_dtm_version() {
        let mut probe = FakeJtagProbe::new_attached();
        probe.set_dtmcontrol_version(1);
        let err = Dtm::new(Box::new(probe), DtmOptions::default()).unwrap_err();
        assert!(matches!(err, RiscvError::UnsupportedDtmVersion(1)));
    }

    #[test]
    fn attach_rejects_unexpected_dramsize() {
        let mut probe = FakeJtagProbe::new_attached();
        probe.set_dramsize(4);
        let err = Dtm::new(Box::new(probe), DtmOptions::default()).unwrap_err();
        assert!(matches!(err, RiscvError::UnexpectedDramSize(4)));
    }

    #[test]
    fn sticky_error_suppresses_further_io_until_checked() {
        let mut probe = FakeJtagProbe::new_attached();
        let mut dtm = Dtm::new(Box::new(probe.clone_handle()), DtmOptions::default()).unwrap();

        probe.force_failed_response_once();
        let v = dtm.read(0x10).unwrap();
        assert_eq!(v, 0);

        // Further reads are no-ops: the fake probe would panic/register a
        // shift if one happened, so a second identical read staying 0
        // without arming a forced response again demonstrates no I/O ran.
        let v2 = dtm.read(0x10).unwrap();
        assert_eq!(v2, 0);

        assert!(dtm.check_error().unwrap());
        assert!(!dtm.check_error().unwrap());
    }
}
