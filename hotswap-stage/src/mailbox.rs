//! Mailbox drop-box naming.
//!
//! Writers drop code into one well-known inbox (`app/mailbox.rb`). Each drain
//! moves the content into a uniquely named sibling so concurrent writers never
//! race on one file name:
//!
//! ```text
//! app/mailbox.rb                               (emptied)
//! app/mailbox-processed/mailbox-<tick>.rb      (reload candidate)
//! ```

use hotswap_core::{ReloadPath, Tick};

/// Staging path for a mailbox drained at `tick`.
pub fn processed_path(mailbox: &ReloadPath, tick: Tick) -> ReloadPath {
    let name = mailbox.file_name();
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    };
    let file = match ext {
        Some(ext) => format!("{stem}-processed/{stem}-{tick}.{ext}"),
        None => format!("{stem}-processed/{stem}-{tick}"),
    };
    mailbox.sibling(&file)
}
