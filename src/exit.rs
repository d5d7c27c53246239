//! Process exit status for a failed run.

use omerotag_core::Error;

/// 1 connection, 2 rules, 3 store, 4 anything else.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.chain().find_map(|c| c.downcast_ref::<Error>()) {
        Some(Error::Connection(_)) => 1,
        Some(Error::Compile(_)) | Some(Error::PathValidation { .. }) => 2,
        Some(Error::Store(_)) => 3,
        _ => 4,
    }
}
