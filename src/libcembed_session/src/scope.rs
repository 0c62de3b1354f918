//! Scope & frame discipline (spec §3.6): a frame groups the locals for one
//! function call; a scope id hides/reveals locals at block boundaries.

use cembed_data_structures::{ChainedTable, Symbol};
use cembed_value::{ScopeId, Value};

/// Locals that have gone `out_of_scope` but whose storage is retained
/// until frame teardown (V4); kept separately from `locals` purely so
/// lookups stay O(1) without scanning past hidden entries.
pub struct Frame {
    locals: ChainedTable<Symbol, Value>,
    shadowed: Vec<(Symbol, Value)>,
    pub return_slot: Option<Value>,
    /// Arena address of the frame-chain header written by `Arena::frame_push`.
    pub arena_frame_addr: usize,
    pub function_name: String,
}

impl Frame {
    pub fn new(arena_frame_addr: usize, function_name: impl Into<String>) -> Frame {
        Frame {
            locals: ChainedTable::new(),
            shadowed: Vec::new(),
            return_slot: None,
            arena_frame_addr,
            function_name: function_name.into(),
        }
    }

    /// Declares `name` in the current (innermost) scope. Fails if a
    /// *visible* binding for `name` already exists in this frame.
    pub fn declare(&mut self, name: Symbol, value: Value) -> bool {
        self.locals.insert(name, value)
    }

    pub fn lookup(&self, name: Symbol) -> Option<&Value> {
        self.locals.get(&name)
    }

    pub fn lookup_mut(&mut self, name: Symbol) -> Option<&mut Value> {
        self.locals.get_mut(&name)
    }

    /// Hides every local declared with scope id `id`: spec's testable
    /// property "after a block exits, no local defined inside it resolves
    /// via name lookup" plus "re-entered... resolves again, to a fresh
    /// value" — achieved here by removing the binding from the lookup
    /// table (a re-declaration on re-entry is then just a fresh insert,
    /// never a duplicate-declaration error) while keeping the `Value`
    /// around in `shadowed` so its storage is still reclaimed at frame
    /// teardown (V4).
    pub fn exit_scope(&mut self, id: ScopeId) {
        let names: Vec<Symbol> = self
            .locals
            .iter()
            .filter(|entry| entry.1.scope_id == id)
            .map(|entry| entry.0)
            .collect();
        for name in names {
            if let Some(mut v) = self.locals.remove(&name) {
                v.mark_out_of_scope();
                self.shadowed.push((name, v));
            }
        }
    }

    pub fn all_owned_values(&self) -> impl Iterator<Item = &Value> {
        self.locals.iter().map(|entry| &entry.1).chain(self.shadowed.iter().map(|entry| &entry.1))
    }
}

/// The call stack of frames; index 0 (if present) is the outermost call.
#[derive(Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> FrameStack {
        FrameStack { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cembed_types::{Idx, TypeHandle};

    fn dummy_type() -> TypeHandle {
        TypeHandle::from_usize(0)
    }

    #[test]
    fn scope_exit_hides_but_retains_storage() {
        let mut frame = Frame::new(0, "main");
        let name = test_symbol(1);
        let scope_a = ScopeId(1);
        let v = Value::new_owned(dummy_type(), 16, false, scope_a);
        assert!(frame.declare(name, v));
        assert!(frame.lookup(name).is_some());
        frame.exit_scope(scope_a);
        assert!(frame.lookup(name).is_none());
        assert_eq!(frame.all_owned_values().count(), 1);
    }

    #[test]
    fn reentry_allows_fresh_declaration_of_same_name() {
        let mut frame = Frame::new(0, "main");
        let name = test_symbol(2);
        let scope_a = ScopeId(1);
        frame.declare(name, Value::new_owned(dummy_type(), 16, false, scope_a));
        frame.exit_scope(scope_a);
        // Re-entering the loop body re-declares the same name at a new address.
        assert!(frame.declare(name, Value::new_owned(dummy_type(), 32, false, scope_a)));
        assert_eq!(frame.lookup(name).unwrap().addr, 32);
    }

    // Symbols are normally minted by an Interner; tests just need distinct,
    // stable handles, which `Symbol`'s private constructor doesn't expose —
    // so route through `Interner` instead.
    fn test_symbol(n: u32) -> cembed_data_structures::Symbol {
        let mut interner = cembed_data_structures::Interner::new();
        interner.intern_str(&format!("sym{}", n))
    }
}
