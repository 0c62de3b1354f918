//! `stdbool.h` pack, grounded in `original_source/Lib/stdbool.c`
//! (`StdboolSetupFunc`): defines `bool` as an alias for `int` and the
//! `true`/`false`/`__bool_true_false_are_defined` constants. No boolean
//! intrinsics — this header is pure declarations.

use cembed_interp::Interp;

use crate::helpers::{define_int_alias, define_int_constant};

pub fn setup(interp: &mut Interp) {
    define_int_alias(interp, "bool");
    define_int_constant(interp, "true", 1);
    define_int_constant(interp, "false", 0);
    define_int_constant(interp, "__bool_true_false_are_defined", 1);
}
