//! Native call signatures.
//!
//! A binding descriptor declares the signature it expects for a symbol, and
//! every slot knows the signature of its own function-pointer type. The
//! binder compares the two before any address is stored.

use std::ffi::c_void;
use std::fmt;

use crate::platform::RawSymbol;

/// Scalar type that can cross the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Void,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Isize,
    Usize,
    F32,
    F64,
    Pointer,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::Isize => "isize",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Pointer => "ptr",
        };
        f.write_str(name)
    }
}

/// Parameter and return types of a native function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeSignature {
    pub params: Vec<ValueType>,
    pub ret: ValueType,
}

impl NativeSignature {
    pub fn new(params: impl Into<Vec<ValueType>>, ret: ValueType) -> Self {
        Self {
            params: params.into(),
            ret,
        }
    }

    /// Signature of a Rust function-pointer type.
    pub fn of<F: NativeFnPtr>() -> Self {
        F::signature()
    }
}

impl fmt::Display for NativeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// Rust types with a fixed C ABI representation.
pub trait NativeType {
    const VALUE_TYPE: ValueType;
}

macro_rules! native_type {
    ($($ty:ty => $vt:ident),* $(,)?) => {
        $(impl NativeType for $ty {
            const VALUE_TYPE: ValueType = ValueType::$vt;
        })*
    };
}

native_type! {
    () => Void,
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    isize => Isize,
    usize => Usize,
    f32 => F32,
    f64 => F64,
}

impl<T> NativeType for *const T {
    const VALUE_TYPE: ValueType = ValueType::Pointer;
}

impl<T> NativeType for *mut T {
    const VALUE_TYPE: ValueType = ValueType::Pointer;
}

/// An `extern "C"` function-pointer type a resolved symbol can become.
///
/// # Safety
/// Implementors must be pointer-sized function pointers so that
/// [`NativeFnPtr::from_raw`] is a plain reinterpretation of the address.
pub unsafe trait NativeFnPtr: Copy + Send + Sync + 'static {
    /// Signature described by the Rust type.
    fn signature() -> NativeSignature;

    /// Reinterpret a resolved symbol address as this function type.
    ///
    /// # Safety
    /// The address must point at a function whose real ABI matches `Self`.
    unsafe fn from_raw(address: RawSymbol) -> Self;
}

macro_rules! impl_native_fn {
    ($($arg:ident),*) => {
        unsafe impl<Ret: NativeType + 'static, $($arg: NativeType + 'static),*> NativeFnPtr
            for extern "C" fn($($arg),*) -> Ret
        {
            fn signature() -> NativeSignature {
                NativeSignature::new(vec![$(<$arg as NativeType>::VALUE_TYPE),*], Ret::VALUE_TYPE)
            }

            unsafe fn from_raw(address: RawSymbol) -> Self {
                let ptr: *const c_void = address.as_ptr();
                std::mem::transmute_copy::<*const c_void, Self>(&ptr)
            }
        }

        unsafe impl<Ret: NativeType + 'static, $($arg: NativeType + 'static),*> NativeFnPtr
            for unsafe extern "C" fn($($arg),*) -> Ret
        {
            fn signature() -> NativeSignature {
                NativeSignature::new(vec![$(<$arg as NativeType>::VALUE_TYPE),*], Ret::VALUE_TYPE)
            }

            unsafe fn from_raw(address: RawSymbol) -> Self {
                let ptr: *const c_void = address.as_ptr();
                std::mem::transmute_copy::<*const c_void, Self>(&ptr)
            }
        }
    };
}

impl_native_fn!();
impl_native_fn!(A1);
impl_native_fn!(A1, A2);
impl_native_fn!(A1, A2, A3);
impl_native_fn!(A1, A2, A3, A4);
impl_native_fn!(A1, A2, A3, A4, A5);
impl_native_fn!(A1, A2, A3, A4, A5, A6);
