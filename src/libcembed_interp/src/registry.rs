//! Function/macro/include side-tables and the `Aux` half of the split that
//! lets `cembed_eval::Caller` be implemented without an `Interp` method
//! borrowing `self` twice (spec §4.6 "Functions, macros, `#include`").
//!
//! `State` (owned by `Interp`, not here) holds everything the evaluator
//! already understands: arena, types, scopes. Everything the evaluator does
//! *not* know about — function bodies, macro bodies, which headers are
//! registered, captured stdout, the debugger hook — lives in `Aux` so a
//! `&mut Interp` can be split into `(&mut State, &mut Aux)` and handed to
//! free functions in `stmt.rs` without aliasing `self`.

use cembed_data_structures::Symbol;
use cembed_session::Pos;
use cembed_types::TypeHandle;
use cembed_value::Value;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::Interp;

/// A host-provided function body (§4.6 "intrinsics"): given the callee's
/// already-bound arguments, computes a result. Takes `&mut Aux` (not just
/// `&mut State`) so an intrinsic like `printf` can append to `aux.stdout`.
pub type Intrinsic = fn(&mut cembed_session::State, &mut Aux, &[Value]) -> cembed_session::CResult<cembed_value::AnyValue>;

/// A registered `#include`d header's setup: installs whatever intrinsics,
/// typedefs, and constants that header provides directly as Rust code,
/// rather than as parsed C source (§4.6 "a host-registered callback, not a
/// second copy of the declaration parser").
#[derive(Clone, Copy)]
pub struct IncludeEntry {
    pub setup: fn(&mut Interp),
}

/// One function's signature plus, if defined rather than merely declared,
/// its body tokens (braces inclusive) and/or a host intrinsic.
///
/// `params` carries names separately from `ret`'s `TypeHandle`-only
/// function type (`TypeRegistry::function` canonicalizes on types alone,
/// spec §3.3 "two function types with different parameter *names* are the
/// same type") because binding arguments to a callee needs the names even
/// though type-checking a call site never does.
#[derive(Clone)]
pub struct FunctionDef {
    pub ret: TypeHandle,
    pub params: Vec<(Symbol, TypeHandle)>,
    pub variadic: bool,
    pub body: Option<Vec<cembed_lexer::Token>>,
    pub intrinsic: Option<Intrinsic>,
    pub declared_at: Pos,
}

#[derive(Clone)]
pub struct MacroDef {
    pub params: Vec<Symbol>,
    pub body: Vec<cembed_lexer::Token>,
}

/// Everything a `cembed_eval::Caller` needs beyond `State` (spec §4.6),
/// plus the one piece of `RunMode` machinery the evaluator never sees: the
/// debugger hook (§4.5), invoked once per executed statement.
#[derive(Default)]
pub struct Aux {
    pub functions: FxHashMap<Symbol, FunctionDef>,
    pub macros: FxHashMap<Symbol, MacroDef>,
    pub includes: FxHashMap<&'static str, IncludeEntry>,
    pub included: FxHashSet<String>,
    pub stdout: Vec<u8>,
    pub debug_hook: Option<Box<dyn FnMut(Pos)>>,
}

impl Aux {
    pub fn new() -> Aux {
        Aux::default()
    }
}

impl cembed_eval::Caller for Aux {
    fn call_function(
        &mut self,
        st: &mut cembed_session::State,
        callee: Symbol,
        args: Vec<Value>,
        executing: bool,
    ) -> cembed_session::CResult<Value> {
        crate::stmt::call_function(st, self, callee, args, executing)
    }

    fn call_macro(
        &mut self,
        st: &mut cembed_session::State,
        callee: Symbol,
        args: Vec<Value>,
        executing: bool,
    ) -> cembed_session::CResult<Value> {
        crate::stmt::call_macro(st, self, callee, args, executing)
    }
}
