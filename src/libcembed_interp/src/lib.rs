//! `cembed_interp`: the embeddable single-pass C interpreter's outer shell
//! (spec §1 "Overview", §6.1 "Embedding API") — ties the lexer, type
//! system, value/scope machinery, expression evaluator, and this crate's
//! own preprocessor/declaration/statement modules into one `Interp`.
//!
//! `Interp` deliberately splits into three independently-borrowable parts:
//! `state` (everything `cembed_eval` already understands), `aux`
//! (functions/macros/includes/stdout — everything it does not), and
//! `read_file` (the host's callback for resolving an arbitrary `#include`
//! target, kept off `Aux` since it borrows host environment, not
//! interpreter state). Free functions in `stmt.rs`/`decl.rs`/`preprocess.rs`
//! take `(&mut State, &mut Aux, ...)` so this split never has to collapse
//! back into a single `&mut self` borrow.

pub mod mode;
pub(crate) mod registry;
pub(crate) mod err;
pub(crate) mod decl;
pub(crate) mod preprocess;
pub(crate) mod stmt;

pub use mode::RunMode;
pub use registry::{Aux, FunctionDef, IncludeEntry, Intrinsic, MacroDef};

use cembed_lexer::tokenize;
use cembed_session::{CResult, State};
use cembed_value::{AnyValue, ScopeId, Value};

use err::{parse_err, runtime_err};

/// Decodes an already-bound argument/result `Value` into a raw scalar
/// (spec §6.4 "intrinsic registration" — intrinsic bodies read their
/// arguments this way rather than through `cembed_eval`'s internal,
/// crate-private decode path). An array-typed value (a string literal or
/// array argument, which has decayed to a pointer at the call site)
/// decodes to its own address, matching `address_of` semantics.
pub fn decode_value(st: &State, v: &Value) -> CResult<AnyValue> {
    stmt::decode(st, v)
}

/// The raw address a pointer- or array-typed value refers to — the
/// address an intrinsic walks byte-by-byte for a `char*`/`char[]`
/// argument (e.g. `strlen`, `printf`'s `%s`).
pub fn pointer_address(st: &State, v: &Value) -> CResult<i64> {
    stmt::ptr_bits(st, v)
}

type LexPos = cembed_lexer::Pos;

/// Default arena size (spec §5 "Memory model"): generous enough for the
/// six end-to-end scenarios in §8 without tuning, matching
/// `original_source/Memory.c`'s default stack+heap budget.
const DEFAULT_ARENA_SIZE: usize = 4 * 1024 * 1024;

pub struct Interp {
    pub state: State,
    pub aux: Aux,
    /// Resolves an `#include` target this session has not registered a
    /// callback for (§4.6): given a header name, returns its source text.
    pub read_file: Option<Box<dyn FnMut(&str) -> Option<String>>>,
}

impl Interp {
    pub fn new() -> Interp {
        Interp::with_arena_size(DEFAULT_ARENA_SIZE)
    }

    pub fn with_arena_size(arena_size: usize) -> Interp {
        Interp { state: State::new(arena_size), aux: Aux::new(), read_file: None }
    }

    /// Registers a Rust setup callback for `#include <name>`/`"name"`
    /// (§4.6): the callback runs once, the first time that header is
    /// included, and is expected to register whatever intrinsics/typedefs
    /// the header provides via [`Interp::register_intrinsic`] and friends.
    pub fn register_include(&mut self, header: &'static str, setup: fn(&mut Interp)) {
        self.aux.includes.insert(header, IncludeEntry { setup });
    }

    /// Registers a host-implemented function under `name` with the given
    /// C signature, so calls to it dispatch to `body` instead of requiring
    /// a parsed definition (§4.6 "intrinsics").
    pub fn register_intrinsic(
        &mut self,
        name: &str,
        ret: cembed_types::TypeHandle,
        params: Vec<(&str, cembed_types::TypeHandle)>,
        variadic: bool,
        body: Intrinsic,
    ) {
        let sym = self.state.interner.intern_str(name);
        let params: Vec<_> = params.into_iter().map(|(p, t)| (self.state.interner.intern_str(p), t)).collect();
        let param_tys: Vec<_> = params.iter().map(|(_, t)| *t).collect();
        let fn_ty = self.state.types.function(ret, param_tys, variadic);
        self.aux.functions.insert(
            sym,
            FunctionDef { ret, params, variadic, body: None, intrinsic: Some(body), declared_at: cembed_session::Pos::default() },
        );
        self.state.declare(sym, Value::rvalue(fn_ty, 0, ScopeId::GLOBAL));
    }

    /// Runs every registered `#include` setup callback unconditionally
    /// (spec §6.1 "`IncludeAllSystemHeaders`" — lets a host that wants the
    /// full standard-library surface skip writing `#include` lines at
    /// all). Idempotent: headers already included are skipped.
    pub fn include_all_system_headers(&mut self) {
        let headers: Vec<&'static str> = self.aux.includes.keys().copied().collect();
        for header in headers {
            if self.aux.included.contains(header) {
                continue;
            }
            if let Some(entry) = self.aux.includes.get(header).copied() {
                self.aux.included.insert(header.to_string());
                (entry.setup)(self);
            }
        }
    }

    /// Installs the host's `#include` fallback (§4.6): resolves any header
    /// name not covered by a registered callback.
    pub fn set_read_file(&mut self, f: impl FnMut(&str) -> Option<String> + 'static) {
        self.read_file = Some(Box::new(f));
    }

    /// Lexes, preprocesses, then parses `source` as a sequence of
    /// top-level declarations (spec §6.1 "`Parse`"). Function bodies are
    /// captured as token spans, not executed, until [`Interp::call_main`]
    /// or [`Interp::call`] runs them.
    pub fn parse(&mut self, source: &str) -> CResult<()> {
        let tokens = tokenize(source).map_err(|e| parse_err(LexPos::default(), e.to_string()))?;
        let expanded = preprocess::preprocess(self, tokens)?;
        let mut pos = 0usize;
        while !matches!(expanded[pos].kind, cembed_lexer::TokenKind::Eof) {
            decl::parse_declaration(&expanded, &mut pos, &mut self.state, &mut self.aux, true, ScopeId::GLOBAL, true)?;
        }
        Ok(())
    }

    /// Calls a previously-parsed, parameterless `int`-returning function
    /// by name (spec §6.1 "`CallMain`") and returns its result.
    pub fn call_main(&mut self) -> CResult<i64> {
        self.call("main", Vec::new())
    }

    /// Calls a previously-parsed function by name with already-evaluated
    /// arguments (spec §6.1 "embedding a call" — the general form
    /// `CallMain` is a convenience wrapper around).
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> CResult<i64> {
        let sym = self.state.interner.lookup_str(name).ok_or_else(|| runtime_err(LexPos::default(), format!("no such function `{}`", name)))?;
        if !self.aux.functions.contains_key(&sym) {
            return Err(runtime_err(LexPos::default(), format!("no such function `{}`", name)));
        }
        let result = stmt::call_function(&mut self.state, &mut self.aux, sym, args, true)?;
        let av = stmt::decode(&self.state, &result)?;
        Ok(av.as_i64())
    }

    /// Drains and returns everything written to the simulated `stdout`
    /// stream so far (spec §6.1 "`stdout`" — intrinsics like `printf`
    /// append to `aux.stdout` rather than touching the host's real
    /// standard output, so embedders can capture or redirect it).
    pub fn take_stdout(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.aux.stdout)
    }

    pub fn stdout(&self) -> &[u8] {
        &self.aux.stdout
    }

    /// Installs a hook invoked once per executed statement (spec §4.5,
    /// "debugger hook" — the `RunMode` machinery's one integration point
    /// with a host-side debugger/tracer).
    pub fn set_debug_hook(&mut self, hook: impl FnMut(cembed_session::Pos) + 'static) {
        self.aux.debug_hook = Some(Box::new(hook));
    }

    /// Releases everything an embedding session held (spec §6.1
    /// "`Cleanup`"): dropping `Interp` already frees the arena and every
    /// side-table, so this just exists as the API's documented symmetry
    /// with `Initialize`/`Parse`/`CallMain`.
    pub fn cleanup(self) {}
}

impl Default for Interp {
    fn default() -> Interp {
        Interp::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cembed_session::{CResult, State};
    use cembed_types::IntWidth;
    use cembed_value::{AnyValue, Value};

    fn install_test_printf(interp: &mut Interp) {
        let int_ty = interp.state.types.int(true, IntWidth::W32);
        let char_ty = interp.state.types.int(true, IntWidth::W8);
        let ptr_ty = interp.state.types.pointer_to(char_ty);
        interp.register_intrinsic("printf", int_ty, vec![("fmt", ptr_ty)], true, test_printf);
    }

    fn test_printf(st: &mut State, aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
        let fmt_val = &args[0];
        let fmt_addr = stmt_ptr_bits(st, fmt_val)? as usize;
        let mut out = Vec::new();
        let mut arg_i = 1usize;
        let mut i = fmt_addr;
        loop {
            let b = st.arena.read(i, 1)[0];
            if b == 0 {
                break;
            }
            if b == b'%' {
                i += 1;
                let spec = st.arena.read(i, 1)[0];
                match spec {
                    b'd' | b'i' => {
                        let v = stmt_decode(st, &args[arg_i])?.as_i64();
                        out.extend(v.to_string().into_bytes());
                        arg_i += 1;
                    }
                    b's' => {
                        let saddr = stmt_ptr_bits(st, &args[arg_i])? as usize;
                        let mut j = saddr;
                        loop {
                            let c = st.arena.read(j, 1)[0];
                            if c == 0 {
                                break;
                            }
                            out.push(c);
                            j += 1;
                        }
                        arg_i += 1;
                    }
                    b'%' => out.push(b'%'),
                    _ => {}
                }
                i += 1;
            } else {
                out.push(b);
                i += 1;
            }
        }
        let n = out.len() as i32;
        aux.stdout.extend(out);
        Ok(AnyValue::SInt32(n))
    }

    // Test-local re-exports of `stmt`'s crate-private helpers (same
    // behavior, just named to keep this module self-contained).
    fn stmt_ptr_bits(st: &State, v: &Value) -> CResult<i64> {
        crate::stmt::ptr_bits(st, v)
    }
    fn stmt_decode(st: &State, v: &Value) -> CResult<AnyValue> {
        crate::stmt::decode(st, v)
    }

    fn new_interp_with_printf() -> Interp {
        let mut interp = Interp::new();
        interp.register_include("test_stdio.h", install_test_printf);
        interp.parse("#include \"test_stdio.h\"\n").unwrap();
        interp
    }

    #[test]
    fn sum_loop_returns_expected_total() {
        let mut interp = Interp::new();
        interp
            .parse(
                r#"
                int main() {
                    int sum = 0;
                    int i = 1;
                    while (i <= 10) {
                        sum = sum + i;
                        i = i + 1;
                    }
                    return sum;
                }
                "#,
            )
            .unwrap();
        assert_eq!(interp.call_main().unwrap(), 55);
    }

    #[test]
    fn recursive_fibonacci() {
        let mut interp = Interp::new();
        interp
            .parse(
                r#"
                int fib(int n) {
                    if (n < 2) {
                        return n;
                    }
                    return fib(n - 1) + fib(n - 2);
                }
                int main() {
                    return fib(10);
                }
                "#,
            )
            .unwrap();
        assert_eq!(interp.call_main().unwrap(), 55);
    }

    #[test]
    fn object_and_function_like_macros() {
        let mut interp = Interp::new();
        interp
            .parse(
                r#"
                #define LIMIT 5
                #define SQ(x) ((x) * (x))
                int main() {
                    int total = 0;
                    int i = 0;
                    while (i < LIMIT) {
                        total = total + SQ(i);
                        i = i + 1;
                    }
                    return total;
                }
                "#,
            )
            .unwrap();
        // SQ(0)+SQ(1)+SQ(2)+SQ(3)+SQ(4) = 0+1+4+9+16 = 30
        assert_eq!(interp.call_main().unwrap(), 30);
    }

    #[test]
    fn nested_for_bubble_sort() {
        let mut interp = Interp::new();
        interp
            .parse(
                r#"
                int main() {
                    int a[5];
                    a[0] = 5; a[1] = 3; a[2] = 4; a[3] = 1; a[4] = 2;
                    int n = 5;
                    int i = 0;
                    for (i = 0; i < n; i = i + 1) {
                        int j = 0;
                        for (j = 0; j < n - i - 1; j = j + 1) {
                            if (a[j] > a[j + 1]) {
                                int tmp = a[j];
                                a[j] = a[j + 1];
                                a[j + 1] = tmp;
                            }
                        }
                    }
                    return a[0] * 10000 + a[1] * 1000 + a[2] * 100 + a[3] * 10 + a[4];
                }
                "#,
            )
            .unwrap();
        assert_eq!(interp.call_main().unwrap(), 12345);
    }

    #[test]
    fn pointer_walk_computes_string_length() {
        let mut interp = Interp::new();
        interp
            .parse(
                r#"
                int strlen_manual(char *s) {
                    int n = 0;
                    while (*s != 0) {
                        n = n + 1;
                        s = s + 1;
                    }
                    return n;
                }
                int main() {
                    char msg[6];
                    msg[0] = 'h'; msg[1] = 'e'; msg[2] = 'l'; msg[3] = 'l'; msg[4] = 'o'; msg[5] = 0;
                    return strlen_manual(msg);
                }
                "#,
            )
            .unwrap();
        assert_eq!(interp.call_main().unwrap(), 5);
    }

    #[test]
    fn short_circuit_and_suppresses_the_right_hand_assignment() {
        let mut interp = Interp::new();
        interp
            .parse(
                r#"
                int main() {
                    int touched = 0;
                    int zero = 0;
                    int result = (zero != 0) && (touched = 1);
                    return touched;
                }
                "#,
            )
            .unwrap();
        assert_eq!(interp.call_main().unwrap(), 0);
    }

    #[test]
    fn intrinsic_printf_writes_to_captured_stdout() {
        let mut interp = new_interp_with_printf();
        interp
            .parse(
                r#"
                int main() {
                    printf("count=%d end\n", 7);
                    return 0;
                }
                "#,
            )
            .unwrap();
        interp.call_main().unwrap();
        assert_eq!(interp.take_stdout(), b"count=7 end\n".to_vec());
    }

    #[test]
    fn switch_statement_dispatches_to_matching_case() {
        let mut interp = Interp::new();
        interp
            .parse(
                r#"
                int classify(int n) {
                    switch (n) {
                        case 1:
                            return 10;
                        case 2:
                            return 20;
                        default:
                            return -1;
                    }
                }
                int main() {
                    return classify(2);
                }
                "#,
            )
            .unwrap();
        assert_eq!(interp.call_main().unwrap(), 20);
    }

    #[test]
    fn goto_skips_forward_over_a_statement() {
        let mut interp = Interp::new();
        interp
            .parse(
                r#"
                int main() {
                    int x = 1;
                    goto skip;
                    x = 99;
                skip:
                    x = x + 1;
                    return x;
                }
                "#,
            )
            .unwrap();
        assert_eq!(interp.call_main().unwrap(), 2);
    }
}
