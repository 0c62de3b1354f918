//! `errno.h` (spec SPEC_FULL "errno.h": single interned `errno` global plus
//! the `E*` constant table) — declared the same way `decl.rs::parse_enum`
//! declares enum constants: a real global `int` cell backed by arena
//! storage, so guest code can read *and assign* `errno` like any other
//! global variable, not just read it through an intrinsic.

use cembed_interp::Interp;
use cembed_types::IntWidth;
use cembed_value::{ScopeId, Value};

use crate::helpers::define_int_constant;

pub fn setup(interp: &mut Interp) {
    let int_ty = interp.state.types.int(true, IntWidth::W32);
    let sym = interp.state.interner.intern_str("errno");
    let addr = interp
        .state
        .arena
        .stack_alloc(4)
        .expect("fresh arena has room for the errno cell");
    interp.state.arena.write(addr, &0i32.to_le_bytes());
    interp.state.declare(sym, Value::rvalue(int_ty, addr, ScopeId::GLOBAL));

    define_int_constant(interp, "EPERM", 1);
    define_int_constant(interp, "ENOENT", 2);
    define_int_constant(interp, "ESRCH", 3);
    define_int_constant(interp, "EINTR", 4);
    define_int_constant(interp, "EIO", 5);
    define_int_constant(interp, "ENXIO", 6);
    define_int_constant(interp, "EBADF", 9);
    define_int_constant(interp, "EAGAIN", 11);
    define_int_constant(interp, "ENOMEM", 12);
    define_int_constant(interp, "EACCES", 13);
    define_int_constant(interp, "EFAULT", 14);
    define_int_constant(interp, "EBUSY", 16);
    define_int_constant(interp, "EEXIST", 17);
    define_int_constant(interp, "ENODEV", 19);
    define_int_constant(interp, "ENOTDIR", 20);
    define_int_constant(interp, "EISDIR", 21);
    define_int_constant(interp, "EINVAL", 22);
    define_int_constant(interp, "ENFILE", 23);
    define_int_constant(interp, "EMFILE", 24);
    define_int_constant(interp, "EFBIG", 27);
    define_int_constant(interp, "ENOSPC", 28);
    define_int_constant(interp, "ERANGE", 34);
}
