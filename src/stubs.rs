//! Code Stubs (§4.3): the fixed catalog of pre-assembled instruction
//! sequences the target façade runs to effect every register, memory, and
//! control operation. Base encodings are transcribed verbatim from the
//! catalog table; the only work done here is OR-ing in the handful of
//! per-call bit-field patches (register index, CSR number, step flag) the
//! catalog documents, and reading back whichever Debug RAM word a stub's
//! own instructions left the result in.

use crate::debugram::exec;
use crate::dtm::Dtm;
use crate::error::RiscvError;
use crate::registers::{CSR_DCSR, DCSR_NDMRESET, DCSR_STEP};

const JAL_MEM_3F8: u32 = 0x3f80_006f;
const JAL_MEM_3FC: u32 = 0x3fc0_006f;
const JAL_MEM_400: u32 = 0x4000_006f;

/// `lw s0, 0x410(zero); lw s1, 0(s0); sw s1, 0x414(zero); jal <resume>; <addr>`
/// Reads one 32-bit word of target memory.
///
/// The catalog's prose names the result slot "ram[4]", but its own third
/// instruction (`0x40902a23`) encodes a store to offset `0x414`, i.e. word 5
/// — see `DESIGN.md`. The follow-up read below uses the word the literal
/// hex actually writes, since the hex is the bit-identical contract (§4.3).
pub fn mem_read32(dtm: &mut Dtm, addr: u32) -> Result<u32, RiscvError> {
    let code = [0x4100_2403, 0x0004_2483, 0x4090_2a23, JAL_MEM_3F8, addr];
    exec(dtm, &code)?;
    let word = dtm.read(5)?;
    Ok(word as u32)
}

/// Writes one 32-bit word of target memory.
pub fn mem_write32(dtm: &mut Dtm, addr: u32, val: u32) -> Result<(), RiscvError> {
    let code = [
        0x4100_2403,
        0x4140_2483,
        0x0094_2023,
        JAL_MEM_3F8,
        addr,
        val,
    ];
    exec(dtm, &code)?;
    Ok(())
}

/// Reads GPR `rx` (x1..x31) by storing it to Debug RAM from the hart side.
/// Result lands in the Debug RAM word immediately after the stub's own code.
pub fn gpreg_read(dtm: &mut Dtm, rx: u32) -> Result<u32, RiscvError> {
    debug_assert!((1..32).contains(&rx));
    let first = 0x4000_2423 | (rx << 20);
    let code = [first, JAL_MEM_400];
    exec(dtm, &code)?;
    let word = dtm.read(code.len() as u32)?;
    Ok(word as u32)
}

/// Writes GPR `rx`. Transcribed literally from the catalog (§4.3): the
/// patch site and base opcode are as documented there even though, taken at
/// face value, a `sw` cannot itself deposit a value into a register file —
/// see `DESIGN.md` for this catalog entry's open question.
pub fn gpreg_write(dtm: &mut Dtm, rx: u32, val: u32) -> Result<(), RiscvError> {
    debug_assert!((1..32).contains(&rx));
    let first = 0x4000_2423 | (rx << 7);
    let code = [first, JAL_MEM_400, val];
    exec(dtm, &code)?;
    Ok(())
}

/// Reads a CSR. Result lands in the Debug RAM word after the stub's code.
pub fn csr_read(dtm: &mut Dtm, csr: u32) -> Result<u32, RiscvError> {
    let first = 0x0000_2473 | (csr << 20);
    let code = [first, 0x4080_2623, JAL_MEM_3FC];
    exec(dtm, &code)?;
    let word = dtm.read(code.len() as u32)?;
    Ok(word as u32)
}

/// Writes a CSR.
pub fn csr_write(dtm: &mut Dtm, csr: u32, val: u32) -> Result<(), RiscvError> {
    let second = 0x0004_1073 | (csr << 20);
    let code = [0x40c0_2403, second, JAL_MEM_3FC, val];
    exec(dtm, &code)?;
    Ok(())
}

/// Halts the hart (`csrsi dcsr, HALT`).
pub fn halt(dtm: &mut Dtm) -> Result<(), RiscvError> {
    let code = [0x7b04_6073, JAL_MEM_400];
    exec(dtm, &code)?;
    Ok(())
}

/// Resumes the hart, optionally with `dcsr.step` set for a single step.
///
/// Per §4.4/§8 Scenario 5, `step` OR-s `4 << 15` (bit 17) into the first
/// template word (`0x7b006073` -> `0x7b026073`). The catalog gives no
/// non-step patch for the second word, so the non-step path runs both
/// templates unpatched.
pub fn resume(dtm: &mut Dtm, step: bool) -> Result<(), RiscvError> {
    let mut first = 0x7b00_6073;
    if step {
        first |= DCSR_STEP << 15;
    }
    let code = [first, 0x7b04_7073, JAL_MEM_3FC];
    exec(dtm, &code)?;
    Ok(())
}

/// Resets the hart via `dcsr.ndmreset`.
pub fn reset(dtm: &mut Dtm) -> Result<(), RiscvError> {
    csr_write(dtm, CSR_DCSR, DCSR_NDMRESET)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gpreg_read_patches_rs2_field() {
        let rx = 18u32; // s2 / x18, §8 Scenario 2
        let patched = 0x4000_2423 | (rx << 20);
        assert_eq!(patched, 0x4120_2423);
    }

    #[test]
    fn resume_step_patches_bit_seventeen() {
        let patched = 0x7b00_6073 | (4 << 15);
        assert_eq!(patched, 0x7b02_6073);
    }
}
