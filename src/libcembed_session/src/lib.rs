//! The single owned interpreter instance: arena, interner, type registry,
//! scope/frame stack and diagnostics (spec §9 "Mapping global mutable
//! state"), grounded on `librustc_session::Session` bundling everything the
//! compiler needs into one struct.

pub mod diag;
pub mod scope;
pub mod state;

pub use diag::{CResult, Diagnostic, ErrorKind, Pos};
pub use scope::{Frame, FrameStack};
pub use state::{Checkpoint, State};
