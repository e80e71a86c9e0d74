use std::error::Error;

pub fn require(predicate: bool, err: &str) -> Result<(), Box<dyn Error>> {
    if predicate { Ok(()) } else { Err(err.into()) }
}

/// Non-fatal diagnostics, e.g. a relocation table that doesn't fit inside
/// the attached slice. Routed through the `log` facade so embedding
/// applications decide where they end up.
pub fn warn(mesg: &str) {
    log::warn!("{mesg}");
}
