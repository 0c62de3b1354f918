//! A single `printf`-family format scanner shared by `printf`/`sprintf`/
//! `fprintf` (spec SPEC_FULL "stdio.h pack"), grounded in
//! `original_source/Lib/stdio.c`'s `PrintSimpleInt`/`PrintStr`/`PrintFP`
//! dispatch-by-conversion-character; width/precision are honored, the `l`/
//! `ll`/`h`/`hh`/`L` length modifiers are accepted and folded away since
//! every integer here is already 64-bit-capable.

use cembed_session::{CResult, State};
use cembed_value::Value;

use crate::helpers::arg_cstr;

struct Spec {
    left_align: bool,
    zero_pad: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

pub fn format_c(st: &State, fmt: &[u8], args: &[Value]) -> CResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut arg_i = 0usize;
    let mut i = 0usize;
    while i < fmt.len() {
        if fmt[i] != b'%' {
            out.push(fmt[i]);
            i += 1;
            continue;
        }
        i += 1;
        if i >= fmt.len() {
            break;
        }
        if fmt[i] == b'%' {
            out.push(b'%');
            i += 1;
            continue;
        }

        let mut spec = Spec { left_align: false, zero_pad: false, width: None, precision: None };
        while i < fmt.len() && matches!(fmt[i], b'-' | b'0' | b'+' | b' ' | b'#') {
            match fmt[i] {
                b'-' => spec.left_align = true,
                b'0' => spec.zero_pad = true,
                _ => {}
            }
            i += 1;
        }
        let mut w = 0usize;
        let mut saw_w = false;
        while i < fmt.len() && fmt[i].is_ascii_digit() {
            w = w * 10 + (fmt[i] - b'0') as usize;
            saw_w = true;
            i += 1;
        }
        if saw_w {
            spec.width = Some(w);
        }
        if i < fmt.len() && fmt[i] == b'.' {
            i += 1;
            let mut p = 0usize;
            while i < fmt.len() && fmt[i].is_ascii_digit() {
                p = p * 10 + (fmt[i] - b'0') as usize;
                i += 1;
            }
            spec.precision = Some(p);
        }
        while i < fmt.len() && matches!(fmt[i], b'l' | b'h' | b'L') {
            i += 1;
        }
        if i >= fmt.len() {
            break;
        }
        let conv = fmt[i];
        i += 1;

        let rendered: Vec<u8> = match conv {
            b'd' | b'i' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_i64();
                arg_i += 1;
                pad(&v.to_string(), &spec)
            }
            b'u' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_i64();
                arg_i += 1;
                pad(&(v as u64).to_string(), &spec)
            }
            b'x' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_i64();
                arg_i += 1;
                pad(&format!("{:x}", v as u64), &spec)
            }
            b'X' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_i64();
                arg_i += 1;
                pad(&format!("{:X}", v as u64), &spec)
            }
            b'o' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_i64();
                arg_i += 1;
                pad(&format!("{:o}", v as u64), &spec)
            }
            b'c' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_i64();
                arg_i += 1;
                vec![v as u8]
            }
            b's' => {
                let bytes = arg_cstr(st, &args[arg_i])?;
                arg_i += 1;
                let bytes = match spec.precision {
                    Some(p) if p < bytes.len() => bytes[..p].to_vec(),
                    _ => bytes,
                };
                pad_bytes(bytes, &spec)
            }
            b'f' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_f64();
                arg_i += 1;
                let prec = spec.precision.unwrap_or(6);
                pad(&format!("{:.*}", prec, v), &spec)
            }
            b'e' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_f64();
                arg_i += 1;
                let prec = spec.precision.unwrap_or(6);
                pad(&format!("{:.*e}", prec, v), &spec)
            }
            b'g' => {
                let v = cembed_interp::decode_value(st, &args[arg_i])?.as_f64();
                arg_i += 1;
                pad(&format!("{}", v), &spec)
            }
            b'p' => {
                let addr = cembed_interp::pointer_address(st, &args[arg_i])?;
                arg_i += 1;
                pad(&format!("0x{:x}", addr), &spec)
            }
            other => vec![b'%', other],
        };
        out.extend(rendered);
    }
    Ok(out)
}

fn pad(s: &str, spec: &Spec) -> Vec<u8> {
    pad_bytes(s.as_bytes().to_vec(), spec)
}

fn pad_bytes(bytes: Vec<u8>, spec: &Spec) -> Vec<u8> {
    let Some(width) = spec.width else { return bytes };
    if bytes.len() >= width {
        return bytes;
    }
    let fill = if spec.zero_pad && !spec.left_align { b'0' } else { b' ' };
    let padding = vec![fill; width - bytes.len()];
    if spec.left_align {
        let mut out = bytes;
        out.extend(vec![b' '; width - out.len()]);
        out
    } else {
        let mut out = padding;
        out.extend(bytes);
        out
    }
}
