//! Debug RAM execution engine (§4.2).
//!
//! Every register, memory, and control operation this driver performs is
//! synthesized by loading a short fixed instruction sequence into on-hart
//! Debug RAM and running it. This module is the one place that knows how to
//! stage such a sequence and wait for it to finish; the actual instruction
//! encodings live in [`crate::stubs`].

use crate::dtm::Dtm;
use crate::error::RiscvError;

/// Bit 33 of the `dbus` data field. Writing a Debug RAM word with this bit
/// set tells the hart to resume execution of Debug RAM from address 0x400;
/// the hart clears it again once it reaches the `<resume>` trampoline.
pub const INTERRUPT_BIT: u64 = 1 << 33;

/// Run `code` in Debug RAM and return the low 32 bits of the completion
/// poll.
///
/// Writes `code.len()` words starting at word 0 (all but the last verbatim,
/// the last with [`INTERRUPT_BIT`] set to kick off execution), then polls
/// the hart's completion slot, Debug RAM word `dramsize`, until the
/// interrupt bit clears there.
///
/// The completion slot is fixed at `dramsize` rather than at `code.len()`:
/// every stub's `<resume>` jump (the trailing `3fc0006f`/`3f80006f`/
/// `4000006f` instruction in each template, §4.3) targets that one fixed
/// address regardless of how many words the stub itself occupies, so a
/// short stub's INTERRUPT bit is only observed as cleared once the hart
/// reaches word `dramsize` and the trampoline there clears it (§9's Open
/// Question). Attach-time validation of `dramsize == 16` is what makes the
/// fixed jump offsets baked into the stub catalog correct.
///
/// `code` must not be empty, and `code.len()` must not exceed `dramsize`.
pub fn exec(dtm: &mut Dtm, code: &[u32]) -> Result<u32, RiscvError> {
    debug_assert!(!code.is_empty(), "exec() requires at least one word");
    debug_assert!(
        code.len() <= dtm.dramsize() as usize,
        "stub longer than Debug RAM"
    );

    let n = code.len();
    for (i, &word) in code[..n - 1].iter().enumerate() {
        dtm.write(i as u32, word as u64)?;
    }
    dtm.write((n - 1) as u32, (code[n - 1] as u64) | INTERRUPT_BIT)?;

    let completion_addr = dtm.dramsize() as u32;
    loop {
        let status_word = dtm.read(completion_addr)?;
        tracing::trace!(
            "debug ram poll: addr={}, value={:#x}",
            completion_addr,
            status_word
        );
        if status_word & INTERRUPT_BIT == 0 {
            return Ok((status_word & 0xFFFF_FFFF) as u32);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dtm::DtmOptions;
    use crate::testing::FakeJtagProbe;

    #[test]
    fn exec_stages_code_and_reports_completion_value() {
        let probe = FakeJtagProbe::new_attached();
        let handle = probe.clone_handle();
        let mut dtm = Dtm::new(Box::new(handle), DtmOptions::default()).unwrap();

        // halt stub: two words, csrsi dcsr + jump to resume.
        let code = [0x7b04_6073u32, 0x4000_006f_u32];
        let result = exec(&mut dtm, &code).unwrap();

        assert_eq!(probe.ram_word(0), 0x7b04_6073);
        assert_eq!(result, 0);
    }

    #[test]
    fn exec_polls_at_least_once() {
        let probe = FakeJtagProbe::new_attached();
        let handle = probe.clone_handle();
        let mut dtm = Dtm::new(Box::new(handle), DtmOptions::default()).unwrap();

        let code = [0x7b04_6073u32, 0x4000_006f_u32];
        exec(&mut dtm, &code).unwrap();

        assert!(probe.poll_count() >= 1);
    }
}
