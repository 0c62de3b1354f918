//! The statement interpreter's control-flow state (spec §4.5): every
//! statement form re-parses under whichever `RunMode` it is reached in
//! (full syntax always consumed, side effects gated by the mode) rather
//! than branching on a separate "should I execute this" flag at every call
//! site the way a tree-walking interpreter normally would.

use cembed_data_structures::Symbol;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunMode {
    Run,
    Skip,
    Return,
    Break,
    Continue,
    /// Scanning a `switch` body for the `case`/`default` that matches this
    /// value; becomes `Run` once found.
    CaseSearch(i64),
    /// Scanning the enclosing function body for this label; becomes `Run`
    /// once the label is reached.
    Goto(Symbol),
}

impl RunMode {
    pub fn executing(self) -> bool {
        matches!(self, RunMode::Run)
    }
}
