//! Command-line driver for `cembed` (spec §6.2 "Host CLI"):
//!
//! ```text
//! cembed <file>...    [ - <arg>... ]   # compile + call main
//! cembed -s <file>...  [ - <arg>... ]  # run top-level statements, no main
//! cembed -i                            # interactive
//! ```
//!
//! Grounded on `librustc_driver`'s `run_compiler`-style shell: parse options
//! with `getopts`, initialize `env_logger`, dispatch to the embedding API,
//! and translate the guest's outcome into a process exit code.

use std::io::{self, BufRead, Write};

use cembed_interp::Interp;
use cembed_session::{CResult, Diagnostic};
use cembed_types::IntWidth;
use cembed_value::{ScopeId, Value};

fn print_usage(program: &str, opts: &getopts::Options) {
    let brief = format!(
        "Usage:\n    {program} <file>...   [ - <arg>... ]   compile + call main\n    {program} -s <file>... [ - <arg>... ]   run top-level statements\n    {program} -i                            interactive\n"
    );
    print!("{}", opts.usage(&brief));
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut opts = getopts::Options::new();
    opts.optflag("s", "statements", "run top-level statements without calling main");
    opts.optflag("i", "interactive", "read and execute statements from stdin");
    opts.optmulti("D", "", "predefine NAME or NAME=VALUE as an object-like macro", "NAME[=VALUE]");
    opts.optopt("", "stack-size", "stack arena budget in bytes", "BYTES");
    opts.optopt("", "heap-size", "heap arena budget in bytes", "BYTES");
    opts.optflag("h", "help", "print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{program}: {e}");
            print_usage(&program, &opts);
            std::process::exit(1);
        }
    };

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }

    let stack_size: usize = matches.opt_str("stack-size").and_then(|s| s.parse().ok()).unwrap_or(0);
    let heap_size: usize = matches.opt_str("heap-size").and_then(|s| s.parse().ok()).unwrap_or(0);
    let arena_size = stack_size + heap_size;

    let mut interp = if arena_size > 0 { Interp::with_arena_size(arena_size) } else { Interp::new() };
    cembed_stdlib::register_all(&mut interp);
    interp.include_all_system_headers();

    let defines = matches.opt_strs("D");

    if matches.opt_present("i") {
        run_interactive(&mut interp, &defines);
        return;
    }

    let run_statements_only = matches.opt_present("s");
    let (files, guest_args) = split_guest_args(&matches.free);

    if files.is_empty() {
        eprintln!("{program}: no input files");
        print_usage(&program, &opts);
        std::process::exit(1);
    }

    declare_guest_argv(&mut interp, &program, &guest_args);

    let mut exit_code = 0i32;
    for path in &files {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{program}: cannot read `{path}`: {e}");
                std::process::exit(1);
            }
        };
        let source = prepend_defines(&defines, &source);
        if let Err(diag) = interp.parse(&source) {
            report(path, &source, &diag);
            std::process::exit(1);
        }
    }

    if !run_statements_only {
        match interp.call_main() {
            Ok(code) => exit_code = code as i32,
            Err(diag) => {
                report(files.last().unwrap(), "", &diag);
                exit_code = 1;
            }
        }
    }

    io::stdout().write_all(&interp.take_stdout()).ok();
    std::process::exit(exit_code);
}

/// Splits `free` arguments at a bare `-` (spec §6.2): everything before is
/// source files, everything after is forwarded to the guest program.
fn split_guest_args(free: &[String]) -> (Vec<String>, Vec<String>) {
    match free.iter().position(|a| a == "-") {
        Some(i) => (free[..i].to_vec(), free[i + 1..].to_vec()),
        None => (free.to_vec(), Vec::new()),
    }
}

/// Exposes `argc`/`argv` as plain global variables rather than `main`
/// parameters, since this embedding's `CallMain` is parameterless — guest
/// code that wants its command-line arguments reads these globals instead
/// of declaring `main(int argc, char **argv)`.
fn declare_guest_argv(interp: &mut Interp, program: &str, guest_args: &[String]) {
    let int_ty = interp.state.types.int(true, IntWidth::W32);
    let char_ty = interp.state.types.int(true, IntWidth::W8);
    let char_ptr = interp.state.types.pointer_to(char_ty);
    let argv_ty = interp.state.types.pointer_to(char_ptr);

    let mut all = vec![program.to_string()];
    all.extend(guest_args.iter().cloned());

    let mut ptrs = Vec::with_capacity(all.len());
    for s in &all {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        let addr = match interp.state.arena.heap_alloc(bytes.len()) {
            Some(a) => a,
            None => return,
        };
        interp.state.arena.write(addr, &bytes);
        ptrs.push(addr as u64);
    }

    let argv_table_bytes = ptrs.len() * 8;
    let Some(table_addr) = interp.state.arena.heap_alloc(argv_table_bytes) else { return };
    for (i, p) in ptrs.iter().enumerate() {
        interp.state.arena.write(table_addr + i * 8, &p.to_le_bytes());
    }

    let argc_sym = interp.state.interner.intern_str("argc");
    let Some(argc_addr) = interp.state.arena.heap_alloc(4) else { return };
    interp.state.arena.write(argc_addr, &(all.len() as i32).to_le_bytes());
    interp.state.declare(argc_sym, Value::rvalue(int_ty, argc_addr, ScopeId::GLOBAL));

    let argv_sym = interp.state.interner.intern_str("argv");
    interp.state.declare(argv_sym, Value::rvalue(argv_ty, table_addr, ScopeId::GLOBAL));
}

/// `-D name[=value]` is expanded the way a real preprocessor would: a
/// literal `#define` line in front of the source, so the existing
/// object-like macro machinery (`preprocess.rs`) handles it unchanged.
fn prepend_defines(defines: &[String], source: &str) -> String {
    if defines.is_empty() {
        return source.to_string();
    }
    let mut out = String::new();
    for d in defines {
        match d.split_once('=') {
            Some((name, value)) => out.push_str(&format!("#define {name} {value}\n")),
            None => out.push_str(&format!("#define {d} 1\n")),
        }
    }
    out.push_str(source);
    out
}

fn report(filename: &str, source: &str, diag: &Diagnostic) {
    eprintln!("{}", diag.render(filename, source));
}

/// Interactive REPL (spec §6.3 `ParseInteractive`): each line is parsed and
/// run as a top-level declaration/statement; a fatal diagnostic is
/// reported and the loop recovers rather than exiting (spec §7
/// "Propagation policy" — "the host may recover... interactive mode
/// does").
fn run_interactive(interp: &mut Interp, defines: &[String]) {
    declare_guest_argv(interp, "cembed", &[]);
    let stdin = io::stdin();
    let mut first = true;
    print!("cembed> ");
    io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let source = if first {
            first = false;
            prepend_defines(defines, &line)
        } else {
            line.clone()
        };
        let result: CResult<()> = interp.parse(&source);
        if let Err(diag) = result {
            report("<stdin>", &line, &diag);
        }
        io::stdout().write_all(&interp.take_stdout()).ok();
        print!("cembed> ");
        io::stdout().flush().ok();
    }
    println!();
}
