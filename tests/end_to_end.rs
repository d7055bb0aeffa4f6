//! End-to-end scenarios exercising the full attach -> halt -> read/write ->
//! resume flow against the in-memory hart model.

use riscv_dtm::dtm::DtmOptions;
use riscv_dtm::target::{HaltReason, RiscvTarget};
use riscv_dtm::trigger::BreakwatchKind;
use riscv_dtm::error::RiscvError;
use riscv_dtm::testing::FakeJtagProbe;

#[test]
fn attach_on_unsupported_dtm_refuses() {
    let mut probe = FakeJtagProbe::new_attached();
    probe.set_dtmcontrol_version(1);
    let result = RiscvTarget::attach(Box::new(probe), DtmOptions::default());
    assert!(matches!(result, Err(RiscvError::UnsupportedDtmVersion(1))));
}

#[test]
fn read_s2_returns_hart_value() {
    let probe = FakeJtagProbe::new_attached();
    probe.set_gpr(18, 0xcafe_babe);
    let mut target = RiscvTarget::attach(Box::new(probe.clone_handle()), DtmOptions::default())
        .expect("attach");

    let value = target.reg_read(18).expect("reg_read");
    assert_eq!(value, 0xcafe_babe);
}

#[test]
fn memory_read_word_at_fixed_address() {
    let probe = FakeJtagProbe::new_attached();
    probe.set_mem(0x2000_0000, 0x1234_5678);
    let mut target = RiscvTarget::attach(Box::new(probe.clone_handle()), DtmOptions::default())
        .expect("attach");

    let mut buf = [0u8; 4];
    target.mem_read(&mut buf, 0x2000_0000, 4).expect("mem_read");
    assert_eq!(u32::from_le_bytes(buf), 0x1234_5678);
}

const GDB_CSR_BASE: u32 = 65;
const TSELECT_INDEX: u32 = GDB_CSR_BASE + 0x7a0;
const DCSR_INDEX: u32 = GDB_CSR_BASE + 0x7b0;

#[test]
fn set_execute_trigger_restores_tselect() {
    let probe = FakeJtagProbe::new_attached();
    let mut target = RiscvTarget::attach(Box::new(probe), DtmOptions::default()).expect("attach");

    // tselect sits wherever the hart happens to have it before the call;
    // walking the allocator must leave it exactly where it found it.
    let before = target.reg_read(TSELECT_INDEX).unwrap_or(0);

    let bw = target
        .breakwatch_set(0x0800_0100, BreakwatchKind::Execute)
        .expect("breakwatch_set");
    assert_eq!(bw.kind(), BreakwatchKind::Execute);

    let after = target.reg_read(TSELECT_INDEX).unwrap_or(0);
    assert_eq!(before, after);

    target.breakwatch_clear(&bw).expect("breakwatch_clear");
}

#[test]
fn single_step_reports_stepping_cause() {
    let probe = FakeJtagProbe::new_attached();
    let mut target = RiscvTarget::attach(Box::new(probe.clone_handle()), DtmOptions::default())
        .expect("attach");

    target.halt_resume(true).expect("halt_resume(step)");
    // A real hart re-halts almost immediately after completing the single
    // step; our instruction-interpreting model doesn't run free-running
    // code, so the re-halt is simulated directly.
    probe.set_haltnot(true);

    // `dcsr.cause` isn't otherwise driven by our simplified hart model, so
    // poke it directly through the CSR register surface to exercise the
    // decode path the way a real single-stepping hart would leave it.
    let dcsr = target.reg_read(DCSR_INDEX).unwrap_or(0);
    target
        .regs_write(DCSR_INDEX, (dcsr & !(0x7 << 6)) | (4 << 6))
        .expect("set dcsr.cause=STEPPING");

    let reason = target.halt_poll().expect("halt_poll");
    assert_eq!(reason, HaltReason::Stepping);
}

#[test]
fn sticky_error_clears_on_first_check_only() {
    let mut probe = FakeJtagProbe::new_attached();
    let mut target = RiscvTarget::attach(Box::new(probe.clone_handle()), DtmOptions::default())
        .expect("attach");

    probe.force_failed_response_once();
    let result = target.reg_read(1);
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), 0);

    assert!(target.check_error().expect("check_error"));
    assert!(!target.check_error().expect("check_error"));
}
