//! `time.h` subset (spec SPEC_FULL "time.h subset": `time`, `clock`,
//! `difftime`) — grounded in `original_source/Lib.c`'s time registrations;
//! `time_t`/`clock_t` are modeled as plain `long` since this crate never
//! exposes a `struct tm` or calendar breakdown (Non-goals).

use std::time::{SystemTime, UNIX_EPOCH};

use cembed_interp::{decode_value, pointer_address, Aux, Interp};
use cembed_session::{CResult, State};
use cembed_types::IntWidth;
use cembed_value::{AnyValue, Value};

pub fn setup(interp: &mut Interp) {
    let long_ty = interp.state.types.int(true, IntWidth::W64);
    let void_ty = interp.state.types.void();
    let void_ptr = interp.state.types.pointer_to(void_ty);
    let double_ty = interp.state.types.double();

    interp.register_intrinsic("time", long_ty, vec![("tloc", void_ptr)], false, time_fn);
    interp.register_intrinsic("clock", long_ty, vec![], false, clock_fn);
    interp.register_intrinsic("difftime", double_ty, vec![("end", long_ty), ("start", long_ty)], false, difftime);
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn time_fn(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let secs = now_secs();
    let addr = pointer_address(st, &args[0])?;
    if addr != 0 {
        st.arena.write(addr as usize, &secs.to_le_bytes());
    }
    Ok(AnyValue::SInt64(secs))
}

/// CLOCKS_PER_SEC is conventionally 1_000_000 on the platforms the original
/// targets; wall-clock process age stands in for CPU time.
fn clock_fn(_st: &mut State, _aux: &mut Aux, _args: &[Value]) -> CResult<AnyValue> {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0);
    Ok(AnyValue::SInt64(micros))
}

fn difftime(st: &mut State, _aux: &mut Aux, args: &[Value]) -> CResult<AnyValue> {
    let end = decode_value(st, &args[0])?.as_i64();
    let start = decode_value(st, &args[1])?.as_i64();
    Ok(AnyValue::Double((end - start) as f64))
}
