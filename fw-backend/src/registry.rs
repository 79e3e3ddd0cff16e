//! Target registry.
//!
//! Each generator module registers itself with [`inventory::submit!`]; the
//! driver resolves a target id to an [`Engine`] bound to an output root.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::{Engine, Generator};

/// Reserved id that lists the registered targets instead of translating.
pub const LIST: &str = "list";

/// One translatable target.
pub struct TargetRegistration {
    /// Identifier accepted on the command line (matched case-insensitively).
    pub id: &'static str,
    pub description: &'static str,
    pub build: fn() -> Box<dyn Generator>,
}

inventory::collect!(TargetRegistration);

#[derive(Debug, Error)]
#[error("unknown target language '{0}'; run with 'list' for the supported targets")]
pub struct UnknownTarget(pub String);

/// Every registered target, ordered by id.
pub fn registrations() -> Vec<&'static TargetRegistration> {
    let mut all: Vec<&'static TargetRegistration> =
        inventory::iter::<TargetRegistration>.into_iter().collect();
    all.sort_by_key(|reg| reg.id);
    all
}

pub fn find(id: &str) -> Option<&'static TargetRegistration> {
    inventory::iter::<TargetRegistration>
        .into_iter()
        .find(|reg| reg.id.eq_ignore_ascii_case(id))
}

/// Build the engine for `id`, writing under `root`.
pub fn lookup(id: &str, root: impl Into<PathBuf>) -> Result<Engine, UnknownTarget> {
    let reg = find(id).ok_or_else(|| UnknownTarget(id.to_string()))?;
    Ok(Engine::new(root, (reg.build)()))
}

/// `ID:\tdescription` lines for every target.
pub fn render_list() -> String {
    registrations()
        .iter()
        .map(|reg| format!("{}:\t{}\n", reg.id, reg.description))
        .collect()
}
