//! `bizdesk-auth`: capability-based authorization (pure, no IO).
//!
//! Raw access grants are normalized once into a [`CapabilityIndex`]; every
//! access decision afterwards is a constant-time lookup against that index.
//! Denial is a plain `false`, never an error.

pub mod access;
pub mod authorize;
pub mod capability;
pub mod index;

pub use access::AccessControl;
pub use authorize::{DecisionExplanation, DenialKind, can, can_access_module, explain};
pub use capability::{AccessCheck, Capability, capability_key};
pub use index::{CapabilityIndex, normalize};
