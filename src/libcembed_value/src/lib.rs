//! The value & variable model (spec §3.2): a `Value` names a typed location
//! in the arena; `AnyValue` is the decoded form used while computing.
//!
//! The design notes ask for "a tagged enum... with inline storage for small
//! scalars and arena handles for aggregates" — but every C value is a
//! potential `&`-operand, so even a scalar local needs a real, addressable
//! arena location. `Value` therefore always carries an arena address
//! (`addr`); [`AnyValue`] is the ephemeral decoded view used by
//! `cembed_eval` to compute, encoded back to bytes afterwards.

use bitflags::bitflags;
use cembed_data_structures::Symbol;
use cembed_types::{BaseTag, Idx, IntWidth, TypeHandle};

bitflags! {
    /// Mirrors spec §3.2's `flags` set exactly.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct ValueFlags: u8 {
        const ON_HEAP      = 0b0000_0001;
        const ANY_ON_HEAP  = 0b0000_0010;
        const ON_STACK     = 0b0000_0100;
        const IS_LVALUE    = 0b0000_1000;
        const OUT_OF_SCOPE = 0b0001_0000;
    }
}

/// A per-block integer derived from the parser position at scope entry
/// (spec §3.6); `0` is reserved for globals, which are never hidden.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Value {
    pub ty: TypeHandle,
    /// Arena byte address of this value's storage.
    pub addr: usize,
    /// Set when this value was obtained via *share*: it aliases another
    /// value's storage rather than owning its own (V1/V2).
    pub lvalue_from: Option<usize>,
    pub scope_id: ScopeId,
    pub flags: ValueFlags,
}

impl Value {
    pub fn new_owned(ty: TypeHandle, addr: usize, on_heap: bool, scope_id: ScopeId) -> Value {
        let mut flags = if on_heap { ValueFlags::ON_HEAP } else { ValueFlags::ON_STACK };
        flags |= ValueFlags::IS_LVALUE;
        Value { ty, addr, lvalue_from: None, scope_id, flags }
    }

    /// A value that shares another's storage (member access, dereference,
    /// array indexing) — V1: carries neither `on_heap` nor `on_stack`.
    pub fn share(ty: TypeHandle, addr: usize, from_addr: usize, scope_id: ScopeId, is_lvalue: bool) -> Value {
        let mut flags = ValueFlags::empty();
        if is_lvalue {
            flags |= ValueFlags::IS_LVALUE;
        }
        Value { ty, addr, lvalue_from: Some(from_addr), scope_id, flags }
    }

    /// A transient, non-addressable result (an rvalue pushed on the
    /// evaluator's stack) — not an lvalue, owns no storage of its own.
    pub fn rvalue(ty: TypeHandle, addr: usize, scope_id: ScopeId) -> Value {
        Value { ty, addr, lvalue_from: None, scope_id, flags: ValueFlags::empty() }
    }

    pub fn is_lvalue(&self) -> bool {
        self.flags.contains(ValueFlags::IS_LVALUE)
    }

    pub fn is_out_of_scope(&self) -> bool {
        self.flags.contains(ValueFlags::OUT_OF_SCOPE)
    }

    pub fn mark_out_of_scope(&mut self) {
        self.flags |= ValueFlags::OUT_OF_SCOPE;
    }

    pub fn owns_storage(&self) -> bool {
        self.flags.intersects(ValueFlags::ON_HEAP | ValueFlags::ON_STACK)
    }
}

/// The decoded form of an `AnyValue` union slot (spec §3.2); never stored
/// directly — always the product of decoding `Value`'s arena bytes against
/// its type, and consumed by re-encoding.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum AnyValue {
    Void,
    SInt8(i8),
    SInt16(i16),
    SInt32(i32),
    SInt64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    /// `0` is null; otherwise an arena address.
    Pointer(u64),
    Identifier(Symbol),
    TypeValue(TypeHandle),
}

impl AnyValue {
    /// Decodes `bytes` (exactly `base`'s width) per `base`'s scalar kind.
    /// Callers are expected to have already sized `bytes` via
    /// `TypeRegistry::sizeof`; aggregates are not handled here (callers
    /// read/write their bytes directly and never materialize an `AnyValue`
    /// for them).
    pub fn decode(bytes: &[u8], base: BaseTag) -> AnyValue {
        match base {
            BaseTag::Void => AnyValue::Void,
            BaseTag::Int(k) => {
                let v = read_le(bytes);
                match (k.signed, k.width) {
                    (true, IntWidth::W8) => AnyValue::SInt8(v as i8),
                    (true, IntWidth::W16) => AnyValue::SInt16(v as i16),
                    (true, IntWidth::W32) => AnyValue::SInt32(v as i32),
                    (true, IntWidth::W64) => AnyValue::SInt64(v as i64),
                    (false, IntWidth::W8) => AnyValue::UInt8(v as u8),
                    (false, IntWidth::W16) => AnyValue::UInt16(v as u16),
                    (false, IntWidth::W32) => AnyValue::UInt32(v as u32),
                    (false, IntWidth::W64) => AnyValue::UInt64(v),
                }
            }
            BaseTag::Enum => AnyValue::SInt32(read_le(bytes) as i32),
            BaseTag::Float => AnyValue::Float(f32::from_bits(read_le(bytes) as u32)),
            BaseTag::Double => AnyValue::Double(f64::from_bits(read_le(bytes))),
            BaseTag::Pointer => AnyValue::Pointer(read_le(bytes)),
            BaseTag::TypeOfTypes => {
                AnyValue::TypeValue(TypeHandle::from_usize(read_le(bytes) as usize))
            }
            BaseTag::Uber
            | BaseTag::Array
            | BaseTag::Struct
            | BaseTag::Union
            | BaseTag::Function
            | BaseTag::Macro => AnyValue::Void,
        }
    }

    /// Encodes back into `out`, which must be exactly as long as the
    /// value's scalar width.
    pub fn encode(&self, out: &mut [u8]) {
        let bits: u64 = match *self {
            AnyValue::Void => 0,
            AnyValue::SInt8(v) => v as u8 as u64,
            AnyValue::SInt16(v) => v as u16 as u64,
            AnyValue::SInt32(v) => v as u32 as u64,
            AnyValue::SInt64(v) => v as u64,
            AnyValue::UInt8(v) => v as u64,
            AnyValue::UInt16(v) => v as u64,
            AnyValue::UInt32(v) => v as u64,
            AnyValue::UInt64(v) => v,
            AnyValue::Float(v) => v.to_bits() as u64,
            AnyValue::Double(v) => v.to_bits(),
            AnyValue::Pointer(v) => v,
            AnyValue::Identifier(s) => s.as_u32() as u64,
            AnyValue::TypeValue(h) => h.index() as u64,
        };
        write_le(out, bits);
    }

    pub fn as_i64(&self) -> i64 {
        match *self {
            AnyValue::Void => 0,
            AnyValue::SInt8(v) => v as i64,
            AnyValue::SInt16(v) => v as i64,
            AnyValue::SInt32(v) => v as i64,
            AnyValue::SInt64(v) => v,
            AnyValue::UInt8(v) => v as i64,
            AnyValue::UInt16(v) => v as i64,
            AnyValue::UInt32(v) => v as i64,
            AnyValue::UInt64(v) => v as i64,
            AnyValue::Float(v) => v as i64,
            AnyValue::Double(v) => v as i64,
            AnyValue::Pointer(v) => v as i64,
            AnyValue::Identifier(s) => s.as_u32() as i64,
            AnyValue::TypeValue(h) => h.index() as i64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            AnyValue::Float(v) => v as f64,
            AnyValue::Double(v) => v,
            other => other.as_i64() as f64,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match *self {
            AnyValue::Float(v) => v != 0.0,
            AnyValue::Double(v) => v != 0.0,
            _ => self.as_i64() != 0,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, AnyValue::Float(_) | AnyValue::Double(_))
    }
}

fn read_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
    u64::from_le_bytes(buf)
}

fn write_le(out: &mut [u8], bits: u64) {
    let buf = bits.to_le_bytes();
    out.copy_from_slice(&buf[..out.len()]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cembed_types::IntKind;

    #[test]
    fn scalar_roundtrips() {
        let v = AnyValue::SInt32(-7);
        let mut bytes = [0u8; 4];
        v.encode(&mut bytes);
        let back = AnyValue::decode(&bytes, BaseTag::Int(IntKind { signed: true, width: IntWidth::W32 }));
        assert_eq!(back, v);
        assert_eq!(back.as_i64(), -7);
    }

    #[test]
    fn double_roundtrips() {
        let v = AnyValue::Double(3.25);
        let mut bytes = [0u8; 8];
        v.encode(&mut bytes);
        let back = AnyValue::decode(&bytes, BaseTag::Double);
        assert_eq!(back, v);
        assert!(back.is_floating());
    }

    #[test]
    fn owned_value_has_exactly_one_storage_flag() {
        let ty = TypeHandle::from_usize(1);
        let stack_val = Value::new_owned(ty, 100, false, ScopeId(1));
        assert!(stack_val.flags.contains(ValueFlags::ON_STACK));
        assert!(!stack_val.flags.contains(ValueFlags::ON_HEAP));
        let heap_val = Value::new_owned(ty, 200, true, ScopeId(1));
        assert!(heap_val.flags.contains(ValueFlags::ON_HEAP));
        assert!(!heap_val.flags.contains(ValueFlags::ON_STACK));
    }

    #[test]
    fn shared_value_owns_no_storage() {
        let ty = TypeHandle::from_usize(1);
        let shared = Value::share(ty, 300, 100, ScopeId(1), true);
        assert!(!shared.owns_storage());
        assert_eq!(shared.lvalue_from, Some(100));
        assert!(shared.is_lvalue());
    }
}
