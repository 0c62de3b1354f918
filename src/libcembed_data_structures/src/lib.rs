//! String interning and the chained hash tables used for every symbol table
//! in the interpreter (globals, per-frame locals, reserved words, string and
//! identifier literals, struct/union members, breakpoints — spec §3.5).

pub mod intern;
pub mod table;

pub use intern::{Interner, Symbol};
pub use table::ChainedTable;

/// Hasher alias matching the teacher's own choice (`rustc_data_structures`
/// links `rustc-hash` for exactly this reason: the default `SipHash` is
/// slower than this workload needs).
pub use rustc_hash::{FxHashMap, FxHashSet};
