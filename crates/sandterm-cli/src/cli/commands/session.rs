//! Session id command handler.

use anyhow::Result;
use sandterm_core::config::paths;
use sandterm_core::core::session_id;

pub fn run(new: bool) -> Result<()> {
    let path = paths::session_path();
    let id = if new {
        session_id::rotate(&path)?
    } else {
        session_id::load_or_create(&path)?
    };
    println!("{id}");
    Ok(())
}
