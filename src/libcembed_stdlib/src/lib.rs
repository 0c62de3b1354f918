//! Default standard-library intrinsic packs for `cembed` (spec SPEC_FULL
//! "Supplemented features"): `stdio.h`, `string.h`, `math.h`, `ctype.h`,
//! `stdlib.h`, `time.h`, `errno.h`, `unistd.h`, `stdbool.h`. Each header is
//! its own module exposing a `setup(&mut Interp)` matching
//! `cembed_interp::IncludeEntry::setup`, registered with
//! `Interp::register_include` so `#include <header.h>` in guest source
//! pulls in exactly that pack and nothing else.

mod ctype;
mod errno;
mod format;
mod helpers;
mod mathlib;
mod stdbool;
mod stdio;
mod stdlib_fns;
mod strings;
mod timelib;
mod unistd;

use cembed_interp::Interp;

/// Registers every pack against `interp`'s include table, keyed by the
/// header name guest source spells in `#include <...>`. Call this once
/// after `Interp::new` and before `parse`; `include_all_system_headers`
/// then makes every registered header available without explicit
/// `#include` lines, matching the host CLI's `-s` invocation form.
pub fn register_all(interp: &mut Interp) {
    interp.register_include("stdio.h", stdio::setup);
    interp.register_include("string.h", strings::setup);
    interp.register_include("math.h", mathlib::setup);
    interp.register_include("ctype.h", ctype::setup);
    interp.register_include("stdlib.h", stdlib_fns::setup);
    interp.register_include("time.h", timelib::setup);
    interp.register_include("errno.h", errno::setup);
    interp.register_include("unistd.h", unistd::setup);
    interp.register_include("stdbool.h", stdbool::setup);
}
