//! `State`: the single owned instance tying every subsystem together
//! (design notes, "Mapping global mutable state" — "keep exactly that: all
//! interpreter state lives in one owned value").

use cembed_arena::Arena;
use cembed_data_structures::{ChainedTable, Interner, Symbol};
use cembed_types::TypeRegistry;
use cembed_value::{ScopeId, Value};

use crate::scope::{Frame, FrameStack};

/// A rewind point captured before a statement/REPL entry begins, restored
/// on error recovery (§7 "stack and transient allocations are reclaimed by
/// arena rewind on the recovery path"; §9 "Mapping `longjmp` error
/// recovery").
#[derive(Clone, Copy)]
pub struct Checkpoint {
    stack_top: usize,
    frame_depth: usize,
}

pub struct State {
    pub arena: Arena,
    pub interner: Interner,
    pub types: TypeRegistry,
    pub globals: ChainedTable<Symbol, Value>,
    pub reserved_words: ChainedTable<Symbol, ()>,
    pub frames: FrameStack,
    pub manual_break: bool,
    next_scope_id: u32,
}

impl State {
    pub fn new(arena_size: usize) -> State {
        State {
            arena: Arena::new(arena_size),
            interner: Interner::new(),
            types: TypeRegistry::new(),
            globals: ChainedTable::new(),
            reserved_words: ChainedTable::new(),
            frames: FrameStack::new(),
            manual_break: false,
            next_scope_id: 1,
        }
    }

    /// Mints a fresh scope id. Spec ties these to parser position; callers
    /// that have one should prefer passing it through explicitly (e.g. the
    /// token index at block entry) — this counter is the fallback for
    /// contexts where no meaningful position is at hand.
    pub fn fresh_scope_id(&mut self) -> ScopeId {
        let id = ScopeId(self.next_scope_id);
        self.next_scope_id += 1;
        id
    }

    /// Marks the current stack top so a later [`stack_rewind`] can discard
    /// everything an expression's temporaries allocated above it, without
    /// touching the frame stack (unlike the full error-recovery
    /// [`Checkpoint`]). Interp calls this around every statement/condition
    /// evaluation; a persistent local's slot is allocated *before* this
    /// mark so the rewind leaves it intact.
    pub fn stack_checkpoint(&self) -> usize {
        self.arena.stack_top()
    }

    pub fn stack_rewind(&mut self, mark: usize) {
        let current = self.arena.stack_top();
        if current > mark {
            self.arena.stack_pop(None, current - mark);
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint { stack_top: self.arena.stack_top(), frame_depth: self.frames.depth() }
    }

    /// Rewinds the arena stack and drops any frames pushed since
    /// `cp` was captured — the arena-rewind half of error recovery.
    pub fn rewind(&mut self, cp: Checkpoint) {
        while self.frames.depth() > cp.frame_depth {
            self.frames.pop();
        }
        let current = self.arena.stack_top();
        if current > cp.stack_top {
            self.arena.stack_pop(Some(cp.stack_top), current - cp.stack_top);
        }
    }

    pub fn push_frame(&mut self, function_name: impl Into<String>) -> Option<()> {
        let addr = self.arena.frame_push()?;
        self.frames.push(Frame::new(addr, function_name));
        Some(())
    }

    pub fn pop_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.arena.frame_pop();
            let _ = frame; // storage reclamation happens via stack rewind/heap_free at call sites.
        }
    }

    /// Looks a name up in the current frame's locals, then falls back to
    /// globals — the lookup order every declaration/reference site uses.
    pub fn lookup(&self, name: Symbol) -> Option<&Value> {
        if let Some(frame) = self.frames.current() {
            if let Some(v) = frame.lookup(name) {
                return Some(v);
            }
        }
        self.globals.get(&name)
    }

    pub fn lookup_mut(&mut self, name: Symbol) -> Option<&mut Value> {
        if self.frames.current().map_or(false, |f| f.lookup(name).is_some()) {
            return self.frames.current_mut().unwrap().lookup_mut(name);
        }
        self.globals.get_mut(&name)
    }

    /// Declares a local in the current frame, or a global if there is no
    /// active frame (top-level script statements, §6.2 `-s` mode).
    pub fn declare(&mut self, name: Symbol, value: Value) -> bool {
        match self.frames.current_mut() {
            Some(frame) => frame.declare(name, value),
            None => self.globals.insert(name, value),
        }
    }

    /// `static` storage (§4.5 "Declarations"): always lands in `globals`
    /// under the mangled name, regardless of whether a frame is active.
    pub fn declare_static(&mut self, mangled_name: Symbol, value: Value) -> bool {
        self.globals.insert(mangled_name, value)
    }

    pub fn exit_scope(&mut self, id: ScopeId) {
        if let Some(frame) = self.frames.current_mut() {
            frame.exit_scope(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cembed_types::{Idx, IntWidth, TypeHandle};

    #[test]
    fn checkpoint_rewind_restores_stack_top() {
        let mut st = State::new(4096);
        let cp = st.checkpoint();
        st.arena.stack_alloc(64);
        st.arena.stack_alloc(64);
        assert_ne!(st.arena.stack_top(), cp.stack_top);
        st.rewind(cp);
        assert_eq!(st.arena.stack_top(), cp.stack_top);
    }

    #[test]
    fn global_declare_and_lookup_without_a_frame() {
        let mut st = State::new(4096);
        let name = st.interner.intern_str("g");
        let ty: TypeHandle = st.types.int(true, IntWidth::W32);
        let addr = st.arena.stack_alloc(4).unwrap();
        let v = Value::new_owned(ty, addr, false, ScopeId::GLOBAL);
        assert!(st.declare(name, v));
        assert!(st.lookup(name).is_some());
        let _ = TypeHandle::from_usize(0);
    }

    #[test]
    fn frame_locals_shadow_globals() {
        let mut st = State::new(4096);
        let name = st.interner.intern_str("x");
        let ty = st.types.int(true, IntWidth::W32);
        let gaddr = st.arena.stack_alloc(4).unwrap();
        st.declare(name, Value::new_owned(ty, gaddr, false, ScopeId::GLOBAL));

        st.push_frame("f").unwrap();
        let laddr = st.arena.stack_alloc(4).unwrap();
        let scope = st.fresh_scope_id();
        st.declare(name, Value::new_owned(ty, laddr, false, scope));
        assert_eq!(st.lookup(name).unwrap().addr, laddr);
        st.pop_frame();
        assert_eq!(st.lookup(name).unwrap().addr, gaddr);
    }
}
