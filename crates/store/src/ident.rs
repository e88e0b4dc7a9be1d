//! Window identity derivation.
//!
//! Handles are not durable: they change on every launch of the owning
//! application. The identity key is the only continuity mechanism across
//! enumerations and restarts, so it must be byte-stable for the same
//! window metadata.

/// Derive the canonical identity key for a window.
///
/// Field order is fixed (`title|class|executable|style|exstyle`) and the
/// numeric fields are rendered as fixed-width uppercase hex, so keys are
/// stable and diffable across runs.
///
/// Two simultaneously open windows that agree on all five fields (e.g.
/// two instances of the same application) are indistinguishable: their
/// saves collide, last writer wins, and an apply pass drives both to the
/// same rectangle. Known limitation.
pub fn window_key(title: &str, class: &str, executable: &str, style: u32, ex_style: u32) -> String {
    format!("{title}|{class}|{executable}|0x{style:08X}|0x{ex_style:08X}")
}
