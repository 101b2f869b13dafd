//! Descriptor-driven conversion between native and managed values.

use super::{ArgDescriptor, NativeValue, WChar};
use crate::bridge::ReferenceBridge;
use crate::exc::{PyException, PyResult};
use crate::host::{HostObjectModel, ManagedValue};
use crate::mem;

/// Everything a conversion may need: the host object model for boxing and
/// the bridge for object-reference resolution.
pub struct ConvertCx<'a> {
    pub host: &'a dyn HostObjectModel,
    pub bridge: &'a ReferenceBridge,
}

/// Decode one native argument slot into its managed image.
pub fn native_to_managed(
    cx: &ConvertCx<'_>,
    desc: ArgDescriptor,
    value: NativeValue,
) -> PyResult<ManagedValue> {
    // Safety: the descriptor names the live union field for this slot.
    unsafe {
        match desc {
            ArgDescriptor::Void => Ok(ManagedValue::Void),
            ArgDescriptor::Bool => Ok(ManagedValue::Bool(value.u8 != 0)),
            ArgDescriptor::Int8 => Ok(ManagedValue::Int(value.i8 as i64)),
            ArgDescriptor::Int16 => Ok(ManagedValue::Int(value.i16 as i64)),
            ArgDescriptor::Int32 => Ok(ManagedValue::Int(value.i32 as i64)),
            ArgDescriptor::Int64 => Ok(ManagedValue::Int(value.i64)),
            ArgDescriptor::UInt8 => Ok(ManagedValue::Int(value.u8 as i64)),
            ArgDescriptor::UInt16 => Ok(ManagedValue::Int(value.u16 as i64)),
            ArgDescriptor::UInt32 => Ok(ManagedValue::Int(value.u32 as i64)),
            ArgDescriptor::UInt64 => Ok(ManagedValue::UInt(value.u64)),
            ArgDescriptor::SSize => Ok(ManagedValue::Int(value.ssize as i64)),
            ArgDescriptor::Float32 => Ok(ManagedValue::Float(value.f32 as f64)),
            ArgDescriptor::Float64 => Ok(ManagedValue::Float(value.f64)),
            ArgDescriptor::Pointer | ArgDescriptor::FuncPtr | ArgDescriptor::StructPtr(_) => {
                Ok(ManagedValue::Ptr(value.ptr as usize))
            }
            ArgDescriptor::CharPtr => {
                let addr = value.ptr as usize;
                if addr == 0 {
                    return Ok(ManagedValue::NoValue);
                }
                Ok(ManagedValue::Str(mem::read_cstring(addr)?))
            }
            ArgDescriptor::AsciiCharPtr => {
                let addr = value.ptr as usize;
                if addr == 0 {
                    return Ok(ManagedValue::NoValue);
                }
                let text = mem::read_cstring(addr)?;
                if !text.is_ascii() {
                    return Err(PyException::decode_error(
                        "ordinal not in range(128)",
                    ));
                }
                Ok(ManagedValue::Str(text))
            }
            ArgDescriptor::WCharPtr => {
                let addr = value.ptr as usize;
                if addr == 0 {
                    return Ok(ManagedValue::NoValue);
                }
                Ok(ManagedValue::Str(read_wide_string(addr)?))
            }
            ArgDescriptor::ObjectBorrowed | ArgDescriptor::ObjectNewRef => {
                let addr = value.ptr as usize;
                if addr == 0 {
                    return Ok(ManagedValue::NoValue);
                }
                Ok(ManagedValue::Object(cx.bridge.resolve_native(cx.host, addr)?))
            }
            ArgDescriptor::ObjectTransfer => {
                let addr = value.ptr as usize;
                if addr == 0 {
                    return Ok(ManagedValue::NoValue);
                }
                let obj = cx.bridge.resolve_native(cx.host, addr)?;
                cx.bridge.consume_reference(cx.host, addr)?;
                Ok(ManagedValue::Object(obj))
            }
        }
    }
}

/// Encode a managed result into the native slot the descriptor names.
pub fn managed_to_native(
    cx: &ConvertCx<'_>,
    desc: ArgDescriptor,
    value: &ManagedValue,
) -> PyResult<NativeValue> {
    match desc {
        ArgDescriptor::Void => Ok(NativeValue::void()),
        ArgDescriptor::Bool => match value {
            ManagedValue::Bool(b) => Ok(NativeValue::from_u64(*b as u64)),
            other => Ok(NativeValue::from_u64((other.as_int()? != 0) as u64)),
        },
        ArgDescriptor::Int8 => narrow_signed::<i8>(value, "C char"),
        ArgDescriptor::Int16 => narrow_signed::<i16>(value, "C short"),
        ArgDescriptor::Int32 => narrow_signed::<i32>(value, "C int"),
        ArgDescriptor::Int64 => Ok(NativeValue::from_i64(value.as_int()?)),
        ArgDescriptor::UInt8 => narrow_unsigned::<u8>(value, "C unsigned char"),
        ArgDescriptor::UInt16 => narrow_unsigned::<u16>(value, "C unsigned short"),
        ArgDescriptor::UInt32 => narrow_unsigned::<u32>(value, "C unsigned int"),
        ArgDescriptor::UInt64 => Ok(NativeValue::from_u64(to_u64(value)?)),
        ArgDescriptor::SSize => Ok(NativeValue::from_i64(value.as_int()?)),
        ArgDescriptor::Float32 => Ok(NativeValue {
            f32: value.as_float()? as f32,
        }),
        ArgDescriptor::Float64 => Ok(NativeValue::from_f64(value.as_float()?)),
        ArgDescriptor::Pointer | ArgDescriptor::FuncPtr | ArgDescriptor::StructPtr(_) => {
            Ok(NativeValue::from_ptr(value.as_ptr()?))
        }
        ArgDescriptor::CharPtr => match value {
            ManagedValue::NoValue => Ok(NativeValue::null()),
            other => Ok(NativeValue::from_ptr(mem::alloc_cstring(other.as_str()?)?)),
        },
        ArgDescriptor::AsciiCharPtr => match value {
            ManagedValue::NoValue => Ok(NativeValue::null()),
            other => {
                let text = other.as_str()?;
                if !text.is_ascii() {
                    return Err(PyException::value_error(
                        "string contains non-ASCII characters",
                    ));
                }
                Ok(NativeValue::from_ptr(mem::alloc_cstring(text)?))
            }
        },
        ArgDescriptor::WCharPtr => match value {
            ManagedValue::NoValue => Ok(NativeValue::null()),
            other => Ok(NativeValue::from_ptr(alloc_wide_string(other.as_str()?)?)),
        },
        ArgDescriptor::ObjectBorrowed => match value.opt_object()? {
            None => Ok(NativeValue::null()),
            // Borrowed result: hand out the address without touching counts.
            Some(r) => Ok(NativeValue::from_ptr(cx.bridge.native_pointer_for(cx.host, r)?)),
        },
        ArgDescriptor::ObjectTransfer | ArgDescriptor::ObjectNewRef => match value.opt_object()? {
            None => Ok(NativeValue::null()),
            Some(r) => {
                let addr = cx.bridge.native_pointer_for(cx.host, r)?;
                cx.bridge.produce_reference(cx.host, addr)?;
                Ok(NativeValue::from_ptr(addr))
            }
        },
    }
}

fn narrow_signed<T>(value: &ManagedValue, target: &str) -> PyResult<NativeValue>
where
    T: TryFrom<i64> + Into<i64>,
{
    let wide = value.as_int()?;
    let narrow = T::try_from(wide).map_err(|_| {
        PyException::overflow(format!("Python int too large to convert to {target}"))
    })?;
    Ok(NativeValue::from_i64(narrow.into()))
}

fn narrow_unsigned<T>(value: &ManagedValue, target: &str) -> PyResult<NativeValue>
where
    T: TryFrom<u64> + Into<u64>,
{
    let wide = to_u64(value)?;
    let narrow = T::try_from(wide).map_err(|_| {
        PyException::overflow(format!("Python int too large to convert to {target}"))
    })?;
    Ok(NativeValue::from_u64(narrow.into()))
}

fn to_u64(value: &ManagedValue) -> PyResult<u64> {
    match value {
        ManagedValue::UInt(v) => Ok(*v),
        other => {
            let wide = other.as_int()?;
            u64::try_from(wide).map_err(|_| {
                PyException::overflow("can't convert negative value to unsigned int")
            })
        }
    }
}

/// Read a NUL-terminated platform wide string.
///
/// # Safety
/// Caller guarantees `addr` points at a valid NUL-terminated `wchar_t`
/// buffer; enforced by the dispatch contract.
unsafe fn read_wide_string(addr: usize) -> PyResult<String> {
    let mut out = String::new();
    let mut p = addr as *const WChar;
    loop {
        let unit = *p;
        if unit == 0 {
            break;
        }
        let cp = unit as u32;
        let c = char::from_u32(cp).ok_or_else(|| {
            PyException::decode_error(format!("invalid wide character {cp:#x}"))
        })?;
        out.push(c);
        p = p.add(1);
    }
    Ok(out)
}

/// Allocate a NUL-terminated wide string in the boundary ledger.
fn alloc_wide_string(text: &str) -> PyResult<usize> {
    let unit = std::mem::size_of::<WChar>();
    let count = text.chars().count();
    let addr = mem::allocate((count + 1) * unit)?;
    for (i, c) in text.chars().enumerate() {
        let bytes = (c as u32 as WChar).to_ne_bytes();
        mem::write_bytes(addr, i * unit, &bytes);
    }
    Ok(addr)
}
