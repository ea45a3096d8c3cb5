//! The type system: a closed, interned set of value types.
//!
//! Two structurally identical types always compare equal by reference:
//! callers intern through a [`TypeInterner`] and compare the resulting
//! [`Type`] handles with `==`, which is pointer equality on the interned
//! data. There is no subtyping; widening from a narrower `Int` to a wider
//! one is always an explicit [`Ext`](crate::instruction::Instruction::Ext)
//! instruction inserted by the lowering pass, never implicit here.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
enum TypeData {
    Void,
    Int(u8),
    Pointer(Type),
    Function(Type, Vec<Type>),
}

/// An interned value type. Cloning is a refcount bump; equality is identity.
#[derive(Clone)]
pub struct Type(Rc<TypeData>);

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Type {}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &*self.0 {
            TypeData::Void => write!(f, "void"),
            TypeData::Int(1) => write!(f, "i1"),
            TypeData::Int(w) => write!(f, "i{}", w),
            TypeData::Pointer(t) => write!(f, "{}*", t),
            TypeData::Function(ret, params) => {
                write!(f, "{}(", ret)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Type {
    pub fn is_void(&self) -> bool {
        matches!(*self.0, TypeData::Void)
    }

    pub fn is_int(&self) -> bool {
        matches!(*self.0, TypeData::Int(_))
    }

    pub fn is_i1(&self) -> bool {
        matches!(*self.0, TypeData::Int(1))
    }

    pub fn is_i32(&self) -> bool {
        matches!(*self.0, TypeData::Int(32))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(*self.0, TypeData::Pointer(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(*self.0, TypeData::Function(..))
    }

    /// Bit width of an `Int` type, panics on anything else.
    pub fn num_bits(&self) -> u8 {
        match &*self.0 {
            TypeData::Int(w) => *w,
            other => panic!("num_bits() called on non-integer type {other:?}"),
        }
    }

    pub fn pointee(&self) -> Option<&Type> {
        match &*self.0 {
            TypeData::Pointer(t) => Some(t),
            _ => None,
        }
    }

    pub fn fn_ret(&self) -> Option<&Type> {
        match &*self.0 {
            TypeData::Function(ret, _) => Some(ret),
            _ => None,
        }
    }

    pub fn fn_params(&self) -> Option<&[Type]> {
        match &*self.0 {
            TypeData::Function(_, params) => Some(params),
            _ => None,
        }
    }

    /// Widening is permitted from a narrower `Int` to a wider `Int` only.
    pub fn can_widen_to(&self, other: &Type) -> bool {
        match (&*self.0, &*other.0) {
            (TypeData::Int(a), TypeData::Int(b)) => a < b,
            _ => false,
        }
    }
}

/// Interns [`Type`] instances so structurally-equal types share one
/// allocation and compare equal by pointer.
pub struct TypeInterner {
    table: HashMap<TypeData, Type>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    fn intern(&mut self, data: TypeData) -> Type {
        if let Some(t) = self.table.get(&data) {
            return t.clone();
        }
        let t = Type(Rc::new(data.clone()));
        self.table.insert(data, t.clone());
        t
    }

    pub fn void_type(&mut self) -> Type {
        self.intern(TypeData::Void)
    }

    pub fn int_type(&mut self, width: u8) -> Type {
        debug_assert!(width == 1 || width == 32, "unsupported int width {width}");
        self.intern(TypeData::Int(width))
    }

    pub fn i1(&mut self) -> Type {
        self.int_type(1)
    }

    pub fn i32(&mut self) -> Type {
        self.int_type(32)
    }

    pub fn ptr_type(&mut self, pointee: Type) -> Type {
        self.intern(TypeData::Pointer(pointee))
    }

    pub fn fn_type(&mut self, ret: Type, params: Vec<Type>) -> Type {
        self.intern(TypeData::Function(ret, params))
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_identity_equality() {
        let mut t = TypeInterner::new();
        let a = t.int_type(32);
        let b = t.int_type(32);
        assert_eq!(a, b);
        let c = t.int_type(1);
        assert_ne!(a, c);
    }

    #[test]
    fn widening_rule() {
        let mut t = TypeInterner::new();
        let i1 = t.i1();
        let i32_ = t.i32();
        assert!(i1.can_widen_to(&i32_));
        assert!(!i32_.can_widen_to(&i1));
        assert!(!i32_.can_widen_to(&i32_));
    }

    #[test]
    fn display() {
        let mut t = TypeInterner::new();
        let i32_ = t.i32();
        let ptr = t.ptr_type(i32_);
        assert_eq!(ptr.to_string(), "i32*");
    }
}
