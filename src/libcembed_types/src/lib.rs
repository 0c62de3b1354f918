//! The canonicalized derived-type tree (spec §3.3): a shared tree rooted at
//! a sentinel "Uber" type where every `(parent, base, array_size,
//! identifier)` tuple names exactly one node (T1: type equality is handle
//! equality after canonicalization).
//!
//! Per the design notes ("Mapping cyclic structures"), the tree is an arena
//! of nodes indexed by a small integer handle rather than parent/child/
//! sibling pointers — `index_vec` is the real published crate closest to
//! the teacher's internal-only `rustc_index::IndexVec` idiom.

use cembed_data_structures::{ChainedTable, Symbol};
use index_vec::{define_index_type, IndexVec};
use std::fmt;

pub use index_vec::Idx;

define_index_type! {
    pub struct TypeHandle = u32;
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bytes(self) -> u32 {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 2,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IntKind {
    pub signed: bool,
    pub width: IntWidth,
}

/// The tag half of a type node's identity — everything needed to tell two
/// *non-aggregate* derived types apart. Struct/union/enum/function nodes
/// also carry data outside this tag (member tables, parameter lists) that
/// is attached after creation rather than folded into the canonical key,
/// matching T3 (a forward-declared aggregate has no members yet but is
/// still the same handle every time its tag is looked up).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BaseTag {
    Uber,
    Void,
    Int(IntKind),
    Float,
    Double,
    Pointer,
    Array,
    Struct,
    Union,
    Enum,
    Function,
    Macro,
    TypeOfTypes,
}

pub struct Member {
    pub offset: u32,
    pub ty: TypeHandle,
}

pub struct TypeNode {
    pub base: BaseTag,
    /// `None` for a scalar/pointer/aggregate; `Some(n)` for a sized array of
    /// `n` elements; a zero-length `Some(0)` array is the "unsized" marker
    /// used by `int a[];`/`char s[];` before a sizing initializer runs.
    pub array_size: Option<u32>,
    pub identifier: Option<Symbol>,
    pub parent: TypeHandle,
    pub params: Vec<TypeHandle>,
    pub variadic: bool,
    pub members: Option<ChainedTable<Symbol, Member>>,
    pub is_union: bool,
    pub sizeof: u32,
    pub align: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TypeError {
    IncompleteType,
    Redefinition(&'static str),
    NotAggregate,
    MemberNotFound,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::IncompleteType => write!(f, "use of incomplete type"),
            TypeError::Redefinition(what) => write!(f, "redefinition of {}", what),
            TypeError::NotAggregate => write!(f, "member access on a non-aggregate type"),
            TypeError::MemberNotFound => write!(f, "no such member"),
        }
    }
}

impl std::error::Error for TypeError {}

#[derive(Clone, PartialEq, Eq, Hash)]
struct CanonKey {
    parent: TypeHandle,
    base: BaseTag,
    array_size: Option<u32>,
    identifier: Option<Symbol>,
    params: Vec<TypeHandle>,
}

pub struct TypeRegistry {
    nodes: IndexVec<TypeHandle, TypeNode>,
    canon: ChainedTable<u64, TypeHandle>,
    canon_keys: IndexVec<TypeHandle, Option<CanonKey>>,
    uber: TypeHandle,
    type_of_types: TypeHandle,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut nodes = IndexVec::new();
        let uber = nodes.push(TypeNode {
            base: BaseTag::Uber,
            array_size: None,
            identifier: None,
            parent: TypeHandle::from_usize(0),
            params: Vec::new(),
            variadic: false,
            members: None,
            is_union: false,
            sizeof: 0,
            align: 1,
        });
        let mut canon_keys = IndexVec::new();
        canon_keys.push(None);
        let mut reg = TypeRegistry { nodes, canon: ChainedTable::new(), canon_keys, uber, type_of_types: uber };
        reg.type_of_types = reg.type_of_types();
        reg
    }

    pub fn uber(&self) -> TypeHandle {
        self.uber
    }

    /// The canonical handle for "the type of a type value" (what a typedef
    /// name or a `sizeof`-style type-argument resolves to), cached at
    /// construction so callers that only have `&TypeRegistry` can still
    /// recognize a typedef binding.
    pub fn type_of_types_handle(&self) -> TypeHandle {
        self.type_of_types
    }

    pub fn node(&self, h: TypeHandle) -> &TypeNode {
        &self.nodes[h]
    }

    fn hash_key(key: &CanonKey) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = rustc_hash_fallback_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns the existing handle for this canonical key, or creates one.
    /// This is the core of T1: a second request for the same
    /// `(parent, base, array_size, identifier)` returns the same node.
    fn get_or_create(
        &mut self,
        parent: TypeHandle,
        base: BaseTag,
        array_size: Option<u32>,
        identifier: Option<Symbol>,
        params: Vec<TypeHandle>,
    ) -> TypeHandle {
        let key = CanonKey { parent, base, array_size, identifier, params };
        let h = Self::hash_key(&key);
        if let Some(&existing) = self.canon.get(&h) {
            // Collisions are vanishingly unlikely with FxHash over these
            // small keys; verify to stay correct rather than fast-and-wrong.
            if self.canon_keys[existing].as_ref() == Some(&key) {
                return existing;
            }
        }
        let (sizeof, align) = Self::primitive_layout(&base, array_size, &self.nodes, parent);
        let handle = self.nodes.push(TypeNode {
            base,
            array_size,
            identifier,
            parent,
            params: key.params.clone(),
            variadic: false,
            members: None,
            is_union: matches!(base, BaseTag::Union),
            sizeof,
            align,
        });
        let idx = self.canon_keys.push(Some(key));
        debug_assert_eq!(idx, handle);
        self.canon.insert(h, handle);
        handle
    }

    fn primitive_layout(
        base: &BaseTag,
        array_size: Option<u32>,
        nodes: &IndexVec<TypeHandle, TypeNode>,
        parent: TypeHandle,
    ) -> (u32, u32) {
        match base {
            BaseTag::Uber | BaseTag::Macro | BaseTag::Function => (0, 1),
            // A "value of type Type" stores a `TypeHandle` as a plain u64
            // (`AnyValue::TypeValue`'s encoding), so it needs real storage
            // width even though the type tree has no children of it.
            BaseTag::TypeOfTypes => (8, 8),
            BaseTag::Void => (0, 1),
            BaseTag::Int(k) => (k.width.bytes(), k.width.bytes()),
            BaseTag::Float => (4, 4),
            BaseTag::Double => (8, 8),
            BaseTag::Pointer => (8, 8),
            BaseTag::Enum => (4, 4),
            BaseTag::Array => {
                let elem = &nodes[parent];
                let n = array_size.unwrap_or(0);
                (elem.sizeof * n, elem.align.max(1))
            }
            BaseTag::Struct | BaseTag::Union => (0, 1),
        }
    }

    pub fn void(&mut self) -> TypeHandle {
        self.get_or_create(self.uber, BaseTag::Void, None, None, Vec::new())
    }

    pub fn int(&mut self, signed: bool, width: IntWidth) -> TypeHandle {
        self.get_or_create(self.uber, BaseTag::Int(IntKind { signed, width }), None, None, Vec::new())
    }

    pub fn float(&mut self) -> TypeHandle {
        self.get_or_create(self.uber, BaseTag::Float, None, None, Vec::new())
    }

    pub fn double(&mut self) -> TypeHandle {
        self.get_or_create(self.uber, BaseTag::Double, None, None, Vec::new())
    }

    pub fn type_of_types(&mut self) -> TypeHandle {
        self.get_or_create(self.uber, BaseTag::TypeOfTypes, None, None, Vec::new())
    }

    /// The canonical handle for "this name is a `#define` macro" (§4.6):
    /// used the same way `function` is, to let `cembed_eval::parse_call`
    /// tell a macro invocation from a function call via `node(ty).base`.
    pub fn macro_type(&mut self) -> TypeHandle {
        self.get_or_create(self.uber, BaseTag::Macro, None, None, Vec::new())
    }

    /// Derived pointer-to-`pointee`, canonical per T1.
    pub fn pointer_to(&mut self, pointee: TypeHandle) -> TypeHandle {
        self.get_or_create(pointee, BaseTag::Pointer, None, None, Vec::new())
    }

    /// Derived array-of-`elem`; `len = None` is the "unsized" form
    /// (`int a[];`) that a later initializer resizes via [`resize_array`].
    pub fn array_of(&mut self, elem: TypeHandle, len: Option<u32>) -> TypeHandle {
        self.get_or_create(elem, BaseTag::Array, Some(len.unwrap_or(0)), None, Vec::new())
    }

    pub fn is_unsized_array(&self, h: TypeHandle) -> bool {
        matches!(self.nodes[h].base, BaseTag::Array) && self.nodes[h].array_size == Some(0)
    }

    /// Re-canonicalizes an unsized array type to a sized one once its
    /// initializer length is known (spec §4.5 "Array initializer").
    pub fn resize_array(&mut self, h: TypeHandle, len: u32) -> TypeHandle {
        let elem = self.nodes[h].parent;
        self.array_of(elem, Some(len))
    }

    /// Looks up (or forward-declares) the tag for `struct`/`union name`.
    /// Returns the same handle on every call for the same name (T1/T3).
    pub fn struct_or_union_tag(&mut self, name: Symbol, is_union: bool) -> TypeHandle {
        let base = if is_union { BaseTag::Union } else { BaseTag::Struct };
        self.get_or_create(self.uber, base, None, Some(name), Vec::new())
    }

    /// Looks up (or forward-declares) the tag for `enum name`. Enum
    /// constants themselves are plain signed 32-bit ints (§6.1); this
    /// handle exists only so `enum Color c;` canonicalizes like a struct
    /// tag does.
    pub fn enum_tag(&mut self, name: Symbol) -> TypeHandle {
        self.get_or_create(self.uber, BaseTag::Enum, None, Some(name), Vec::new())
    }

    pub fn is_complete_aggregate(&self, h: TypeHandle) -> bool {
        self.nodes[h].members.is_some()
    }

    /// Defines the member layout for a previously forward-declared
    /// struct/union tag. Errors if already defined (no redefinition).
    pub fn define_members(
        &mut self,
        h: TypeHandle,
        members: Vec<(Symbol, TypeHandle)>,
    ) -> Result<(), TypeError> {
        if self.nodes[h].members.is_some() {
            return Err(TypeError::Redefinition("struct/union"));
        }
        let is_union = self.nodes[h].is_union;
        let mut table = ChainedTable::new();
        let (size, align) = if is_union {
            let mut max_size = 0u32;
            let mut max_align = 1u32;
            for (name, ty) in &members {
                let node = &self.nodes[*ty];
                max_size = max_size.max(node.sizeof);
                max_align = max_align.max(node.align);
                table.insert(*name, Member { offset: 0, ty: *ty });
            }
            (round_up(max_size, max_align), max_align)
        } else {
            let mut offset = 0u32;
            let mut max_align = 1u32;
            for (name, ty) in &members {
                let node = &self.nodes[*ty];
                offset = round_up(offset, node.align.max(1));
                table.insert(*name, Member { offset, ty: *ty });
                offset += node.sizeof;
                max_align = max_align.max(node.align);
            }
            (round_up(offset, max_align), max_align)
        };
        let node = &mut self.nodes[h];
        node.members = Some(table);
        node.sizeof = size; // T2: sizeof % align == 0 by construction.
        node.align = align;
        Ok(())
    }

    pub fn member(&self, h: TypeHandle, name: Symbol) -> Result<&Member, TypeError> {
        let node = &self.nodes[h];
        let table = node.members.as_ref().ok_or(TypeError::IncompleteType)?;
        table.get(&name).ok_or(TypeError::MemberNotFound)
    }

    /// Creates a function type. Unlike scalar/pointer/array derivations,
    /// the parameter list is folded into the canonical key so two
    /// functions with the same return type but different signatures get
    /// distinct handles.
    pub fn function(&mut self, ret: TypeHandle, params: Vec<TypeHandle>, variadic: bool) -> TypeHandle {
        let h = self.get_or_create(ret, BaseTag::Function, None, None, params);
        self.nodes[h].variadic = variadic;
        h
    }

    pub fn sizeof(&self, h: TypeHandle) -> Result<u32, TypeError> {
        let node = &self.nodes[h];
        match node.base {
            BaseTag::Struct | BaseTag::Union if node.members.is_none() => Err(TypeError::IncompleteType),
            BaseTag::Array if node.array_size == Some(0) => Err(TypeError::IncompleteType),
            BaseTag::Function | BaseTag::Macro | BaseTag::TypeOfTypes | BaseTag::Uber => Err(TypeError::NotAggregate),
            _ => Ok(node.sizeof),
        }
    }

    pub fn align(&self, h: TypeHandle) -> u32 {
        self.nodes[h].align
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn round_up(n: u32, align: u32) -> u32 {
    if align <= 1 {
        return n;
    }
    (n + align - 1) / align * align
}

/// A small self-contained FxHash-style hasher so this crate does not need
/// to depend on `cembed_data_structures`'s re-export for one internal use.
fn rustc_hash_fallback_hasher() -> impl std::hash::Hasher {
    rustc_hash::FxHasher::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cembed_data_structures::Interner;

    #[test]
    fn canonicalization_is_idempotent() {
        let mut reg = TypeRegistry::new();
        let int1 = reg.int(true, IntWidth::W32);
        let int2 = reg.int(true, IntWidth::W32);
        assert_eq!(int1, int2);
        let p1 = reg.pointer_to(int1);
        let p2 = reg.pointer_to(int2);
        assert_eq!(p1, p2);
        let unsigned = reg.int(false, IntWidth::W32);
        assert_ne!(int1, unsigned);
    }

    #[test]
    fn struct_layout_respects_alignment() {
        let mut reg = TypeRegistry::new();
        let mut interner = Interner::new();
        let c = reg.int(true, IntWidth::W8);
        let i = reg.int(true, IntWidth::W32);
        let tag = interner.intern_str("Point");
        let handle = reg.struct_or_union_tag(tag, false);
        assert!(!reg.is_complete_aggregate(handle));
        let fx = interner.intern_str("flag");
        let fy = interner.intern_str("value");
        reg.define_members(handle, vec![(fx, c), (fy, i)]).unwrap();
        assert!(reg.is_complete_aggregate(handle));
        // flag:u8 at 0, padding to 4-byte align, value:i32 at 4 -> size 8.
        assert_eq!(reg.sizeof(handle).unwrap(), 8);
        assert_eq!(reg.align(handle), 4);
        assert_eq!(reg.member(handle, fy).unwrap().offset, 4);
    }

    #[test]
    fn union_size_is_the_largest_member() {
        let mut reg = TypeRegistry::new();
        let mut interner = Interner::new();
        let i = reg.int(true, IntWidth::W32);
        let d = reg.double();
        let tag = interner.intern_str("AnyNum");
        let handle = reg.struct_or_union_tag(tag, true);
        let fi = interner.intern_str("i");
        let fd = interner.intern_str("d");
        reg.define_members(handle, vec![(fi, i), (fd, d)]).unwrap();
        assert_eq!(reg.sizeof(handle).unwrap(), 8);
        assert_eq!(reg.member(handle, fi).unwrap().offset, 0);
        assert_eq!(reg.member(handle, fd).unwrap().offset, 0);
    }

    #[test]
    fn forward_declared_struct_is_incomplete() {
        let mut reg = TypeRegistry::new();
        let mut interner = Interner::new();
        let tag = interner.intern_str("Node");
        let h = reg.struct_or_union_tag(tag, false);
        assert_eq!(reg.sizeof(h), Err(TypeError::IncompleteType));
    }

    #[test]
    fn array_resize_reassigns_a_canonical_sized_type() {
        let mut reg = TypeRegistry::new();
        let c = reg.int(true, IntWidth::W8);
        let unsized_arr = reg.array_of(c, None);
        assert!(reg.is_unsized_array(unsized_arr));
        let sized = reg.resize_array(unsized_arr, 4);
        assert_eq!(reg.sizeof(sized).unwrap(), 4);
        let sized_again = reg.array_of(c, Some(4));
        assert_eq!(sized, sized_again);
    }

    #[test]
    fn function_types_distinguish_by_signature() {
        let mut reg = TypeRegistry::new();
        let i = reg.int(true, IntWidth::W32);
        let f1 = reg.function(i, vec![i], false);
        let f2 = reg.function(i, vec![i, i], false);
        assert_ne!(f1, f2);
        let f1_again = reg.function(i, vec![i], false);
        assert_eq!(f1, f1_again);
    }
}
