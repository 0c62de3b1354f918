//! `math.h` pack (spec SPEC_FULL "math.h pack") — each intrinsic forwards
//! straight to the matching `f64` host function, matching
//! `original_source/Lib.c`'s `MathSetupFunc` registrations.

use cembed_interp::{decode_value, Aux, Interp};
use cembed_session::{CResult, State};
use cembed_value::{AnyValue, Value};

pub fn setup(interp: &mut Interp) {
    let double_ty = interp.state.types.double();
    macro_rules! unary {
        ($name:literal, $f:expr) => {
            interp.register_intrinsic($name, double_ty, vec![("x", double_ty)], false, $f);
        };
    }
    unary!("sin", sin);
    unary!("cos", cos);
    unary!("tan", tan);
    unary!("asin", asin);
    unary!("acos", acos);
    unary!("atan", atan);
    unary!("sinh", sinh);
    unary!("cosh", cosh);
    unary!("tanh", tanh);
    unary!("exp", exp);
    unary!("log", log);
    unary!("log10", log10);
    unary!("sqrt", sqrt);
    unary!("floor", floor);
    unary!("ceil", ceil);
    unary!("fabs", fabs);
    interp.register_intrinsic("atan2", double_ty, vec![("y", double_ty), ("x", double_ty)], false, atan2);
    interp.register_intrinsic("pow", double_ty, vec![("base", double_ty), ("exp", double_ty)], false, pow);
    interp.register_intrinsic("fmod", double_ty, vec![("x", double_ty), ("y", double_ty)], false, fmod);
}

fn arg0(st: &State, args: &[Value]) -> CResult<f64> {
    Ok(decode_value(st, &args[0])?.as_f64())
}

macro_rules! def_unary {
    ($name:ident, $op:expr) => {
        fn $name(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
            let x = arg0(st, args)?;
            let f: fn(f64) -> f64 = $op;
            Ok(AnyValue::Double(f(x)))
        }
    };
}

def_unary!(sin, f64::sin);
def_unary!(cos, f64::cos);
def_unary!(tan, f64::tan);
def_unary!(asin, f64::asin);
def_unary!(acos, f64::acos);
def_unary!(atan, f64::atan);
def_unary!(sinh, f64::sinh);
def_unary!(cosh, f64::cosh);
def_unary!(tanh, f64::tanh);
def_unary!(exp, f64::exp);
def_unary!(log, f64::ln);
def_unary!(log10, f64::log10);
def_unary!(sqrt, f64::sqrt);
def_unary!(floor, f64::floor);
def_unary!(ceil, f64::ceil);
def_unary!(fabs, f64::abs);

fn atan2(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let y = decode_value(st, &args[0])?.as_f64();
    let x = decode_value(st, &args[1])?.as_f64();
    Ok(AnyValue::Double(y.atan2(x)))
}

fn pow(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let base = decode_value(st, &args[0])?.as_f64();
    let exp = decode_value(st, &args[1])?.as_f64();
    Ok(AnyValue::Double(base.powf(exp)))
}

fn fmod(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let x = decode_value(st, &args[0])?.as_f64();
    let y = decode_value(st, &args[1])?.as_f64();
    Ok(AnyValue::Double(x % y))
}
