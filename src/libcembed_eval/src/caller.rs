//! The seam between the evaluator and the statement interpreter: calling a
//! user-defined function or macro needs the `RunMode` machinery `interp`
//! owns, so the evaluator only describes the shape of the call.

use cembed_data_structures::Symbol;
use cembed_session::{CResult, State};
use cembed_value::Value;

pub trait Caller {
    /// Invokes a function-valued `callee` with already-evaluated `args`.
    /// Implementations must still push (and pop) a call frame "even in
    /// skip mode, for balance" (spec §4.4) regardless of `executing`;
    /// only side effects inside the body are conditioned on `executing`.
    fn call_function(
        &mut self,
        st: &mut State,
        callee: Symbol,
        args: Vec<Value>,
        executing: bool,
    ) -> CResult<Value>;

    /// Expands and evaluates a macro-valued `callee`.
    fn call_macro(
        &mut self,
        st: &mut State,
        callee: Symbol,
        args: Vec<Value>,
        executing: bool,
    ) -> CResult<Value>;
}
