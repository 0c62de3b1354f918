//! `ctype.h` pack (spec SPEC_FULL "ctype.h pack", grounded in
//! `original_source/Lib/ctype.c`) — thin forwards onto `u8::is_ascii_*`.

use cembed_interp::{decode_value, Aux, Interp};
use cembed_session::{CResult, State};
use cembed_types::IntWidth;
use cembed_value::{AnyValue, Value};

pub fn setup(interp: &mut Interp) {
    let int_ty = interp.state.types.int(true, IntWidth::W32);
    macro_rules! pred {
        ($name:literal, $f:expr) => {
            interp.register_intrinsic($name, int_ty, vec![("c", int_ty)], false, $f);
        };
    }
    pred!("isalpha", isalpha);
    pred!("isdigit", isdigit);
    pred!("isalnum", isalnum);
    pred!("isspace", isspace);
    pred!("isupper", isupper);
    pred!("islower", islower);
    pred!("ispunct", ispunct);
    pred!("iscntrl", iscntrl);
    pred!("isprint", isprint);
    pred!("isgraph", isgraph);
    pred!("isxdigit", isxdigit);
    interp.register_intrinsic("toupper", int_ty, vec![("c", int_ty)], false, toupper);
    interp.register_intrinsic("tolower", int_ty, vec![("c", int_ty)], false, tolower);
}

fn ch(st: &State, args: &[Value]) -> CResult<u8> {
    Ok(decode_value(st, &args[0])?.as_i64() as u8)
}

macro_rules! def_pred {
    ($name:ident, $op:expr) => {
        fn $name(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
            let c = ch(st, args)?;
            let f: fn(&u8) -> bool = $op;
            Ok(AnyValue::SInt32(if f(&c) { 1 } else { 0 }))
        }
    };
}

def_pred!(isalpha, u8::is_ascii_alphabetic);
def_pred!(isdigit, u8::is_ascii_digit);
def_pred!(isalnum, u8::is_ascii_alphanumeric);
def_pred!(isspace, u8::is_ascii_whitespace);
def_pred!(isupper, u8::is_ascii_uppercase);
def_pred!(islower, u8::is_ascii_lowercase);
def_pred!(ispunct, u8::is_ascii_punctuation);
def_pred!(iscntrl, u8::is_ascii_control);
def_pred!(isgraph, u8::is_ascii_graphic);
def_pred!(isxdigit, u8::is_ascii_hexdigit);

fn isprint(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let c = ch(st, args)?;
    Ok(AnyValue::SInt32(if c.is_ascii_graphic() || c == b' ' { 1 } else { 0 }))
}

fn toupper(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let c = ch(st, args)?;
    Ok(AnyValue::SInt32(c.to_ascii_uppercase() as i32))
}

fn tolower(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let c = ch(st, args)?;
    Ok(AnyValue::SInt32(c.to_ascii_lowercase() as i32))
}
