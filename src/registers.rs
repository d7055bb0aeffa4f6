//! CSR numbers and the GDB `rv32` register index map used by
//! [`crate::target::RiscvTarget::reg_read`]/`regs_write`.

/// Debug Control and Status register.
pub const CSR_DCSR: u32 = 0x7b0;
/// Debug PC — the hart's program counter at the moment it halted.
pub const CSR_DPC: u32 = 0x7b1;
/// Debug scratch register; also shadows `s0`/x8 while the hart is halted.
pub const CSR_DSCRATCH: u32 = 0x7b2;
/// Trigger select.
pub const CSR_TSELECT: u32 = 0x7a0;
/// Trigger data 1 (viewed through the `mcontrol` match-control shape).
pub const CSR_MCONTROL: u32 = 0x7a1;
/// Trigger data 2 — the watched address for the currently selected trigger.
pub const CSR_TDATA2: u32 = 0x7a2;

/// `dcsr` bit 29: `ndmreset`, a non-debug-module reset request.
pub const DCSR_NDMRESET: u32 = 1 << 29;
/// `dcsr` bit 2: `step`, single-step-on-resume.
pub const DCSR_STEP: u32 = 1 << 2;

/// GDB register indices, rv32 order: x0..x31, then pc. Used by
/// [`gdb_index_to_csr`] to resolve CSR-space register accesses.
pub const GDB_REGS_COUNT: u32 = 33;
/// Size in bytes of the `regs` blob GDB expects (33 32-bit registers).
pub const REGS_SIZE: usize = GDB_REGS_COUNT as usize * 4;

/// What a GDB register index resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterTarget {
    /// Always reads zero; writes are ignored.
    HardZero,
    /// A general-purpose register, accessed through the gpreg stub.
    Gpr(u32),
    /// `x8`/`s0`'s debug-mode shadow, `DSCRATCH`.
    DscratchShadow,
    /// `x9`/`s1`'s debug-mode shadow, Debug RAM word `dramsize`.
    DramsizeShadow,
    /// The hart's program counter at halt, `DPC`.
    Dpc,
    /// An arbitrary CSR.
    Csr(u32),
}

/// Resolve a GDB `rv32` register index to what it addresses.
///
/// Returns `None` for indices outside the supported ranges (0, 1..=31, 32,
/// 65..=65+4095).
pub fn gdb_index_to_target(index: u32) -> Option<RegisterTarget> {
    match index {
        0 => Some(RegisterTarget::HardZero),
        8 => Some(RegisterTarget::DscratchShadow),
        9 => Some(RegisterTarget::DramsizeShadow),
        1..=31 => Some(RegisterTarget::Gpr(index)),
        32 => Some(RegisterTarget::Dpc),
        65..=4160 => Some(RegisterTarget::Csr(index - 65)),
        _ => None,
    }
}

/// A minimal GDB target-description XML string declaring `riscv:rv32`.
/// The higher target-abstraction layer is out of scope, but the façade
/// carries this static description alongside it, so it lives here rather
/// than being invented at the call site.
pub const TDESC_RV32: &str = r#"<?xml version="1.0"?>
<!DOCTYPE target SYSTEM "gdb-target.dtd">
<target version="1.0">
  <architecture>riscv:rv32</architecture>
  <feature name="org.gnu.gdb.riscv.cpu">
    <reg name="x0" bitsize="32" regnum="0"/>
    <reg name="pc" bitsize="32" regnum="32"/>
  </feature>
</target>
"#;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_zero_is_hard_zero() {
        assert_eq!(gdb_index_to_target(0), Some(RegisterTarget::HardZero));
    }

    #[test]
    fn index_eight_and_nine_are_shadows() {
        assert_eq!(gdb_index_to_target(8), Some(RegisterTarget::DscratchShadow));
        assert_eq!(gdb_index_to_target(9), Some(RegisterTarget::DramsizeShadow));
    }

    #[test]
    fn index_thirty_two_is_dpc() {
        assert_eq!(gdb_index_to_target(32), Some(RegisterTarget::Dpc));
    }

    #[test]
    fn csr_range_subtracts_base() {
        assert_eq!(gdb_index_to_target(65), Some(RegisterTarget::Csr(0)));
        assert_eq!(gdb_index_to_target(65 + 4095), Some(RegisterTarget::Csr(4095)));
        assert_eq!(gdb_index_to_target(65 + 4096), None);
    }
}
