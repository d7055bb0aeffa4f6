//! Crate-wide error type.

use crate::jtag::JtagError;

/// The overarching error type for everything in this crate.
///
/// Most DTM-level failures are *not* reported through this type: per the
/// `dbus` retry discipline, a status-2 response latches the sticky `error`
/// flag on [`crate::dtm::Dtm`] instead of returning `Err`, and is only
/// surfaced later through [`crate::target::RiscvTarget::check_error`]. This
/// enum exists for the handful of conditions that cannot be represented that
/// way: failures in the downstream collaborator, refusal to attach, and
/// programming errors a caller can act on.
#[derive(thiserror::Error, Debug)]
pub enum RiscvError {
    /// The downstream JTAG transport failed.
    #[error("JTAG transport error")]
    Jtag(#[from] JtagError),

    /// The hart reported a DTM version other than 0.
    #[error("unsupported debug transport module version: {0}")]
    UnsupportedDtmVersion(u8),

    /// The hart reported a debug module version other than 1.
    #[error("unsupported debug module version: {0}")]
    UnsupportedDebugModuleVersion(u8),

    /// The hart reported `authenticated=0`; this driver does not implement
    /// the authentication challenge/response handshake.
    #[error("hart is not authenticated")]
    NotAuthenticated,

    /// `dminfo.dramsize` was not 16. The fixed jump offsets baked into the
    /// code stubs (§4.3 / §9) assume a 17-word Debug RAM; refuse to attach
    /// rather than execute stubs that would jump to the wrong address.
    #[error("unexpected Debug RAM size: dramsize={0} (expected 16)")]
    UnexpectedDramSize(u8),

    /// A memory or register access was not word-aligned.
    #[error("misaligned access: address {address:#010x}, length {len}")]
    MisalignedAccess { address: u32, len: u32 },

    /// No free trigger slot was found while walking `tselect`.
    #[error("no free trigger (breakpoint/watchpoint) slot available")]
    NoFreeTrigger,

    /// A register index outside the GDB rv32 register map was requested.
    #[error("register index {0} is out of range")]
    InvalidRegisterIndex(u32),
}
