//! The fixed-layout value record for hosts on the other side of a C ABI.
//!
//! A record is 16 bytes: an 8-byte payload, then the kind code at offset 8, then a length
//! at offset 12. What the payload and length hold depends on the kind:
//!
//! | kind                                | payload            | length        |
//! |-------------------------------------|--------------------|---------------|
//! | Null                                | unused             | 0             |
//! | Boolean, Integer                    | `i32`              | 0             |
//! | Index                               | `i64`              | 0             |
//! | Number, Date                        | `f64`              | 0             |
//! | String, Error, CompileError         | UTF-16 buffer      | code units    |
//! | UnknownError                        | UTF-16 buffer/null | code units    |
//! | Array                               | element records    | element count |
//! | HostRef, HostError                  | unused             | host id       |
//! | Wrapped, WrappedError               | boxed handle       | 0             |
//!
//! Buffers and boxed handles are owned by the record. A record must be released exactly
//! once, either by converting it back with [`Value::from_raw`] or with [`RawValue::dispose`].

use std::ffi::c_void;
use std::mem;
use std::ptr;

use crate::engine::{HostId, JsText, Kind, ObjectHandle, Value};

#[repr(C)]
#[derive(Clone, Copy)]
pub union RawPayload {
    pub i32: i32,
    pub i64: i64,
    pub num: f64,
    pub str: *mut u16,
    pub arr: *mut RawValue,
    pub ptr: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawValue {
    pub payload: RawPayload,
    pub kind: i32,
    pub length: i32,
}

const _: () = assert!(mem::size_of::<RawValue>() == 16);
const _: () = assert!(mem::offset_of!(RawValue, kind) == 8);
const _: () = assert!(mem::offset_of!(RawValue, length) == 12);

const TOO_LARGE: &str = "value too large for the wire layout";

impl RawValue {
    fn new(kind: Kind, payload: RawPayload, length: i32) -> RawValue {
        RawValue { payload, kind: kind.code(), length }
    }

    fn empty(kind: Kind) -> RawValue {
        RawValue::new(kind, RawPayload { i64: 0 }, 0)
    }

    pub fn null() -> RawValue {
        RawValue::empty(Kind::Null)
    }

    /// A String record holding a copy of `units`.
    pub fn alloc_string(units: &[u16]) -> RawValue {
        Value::String(JsText::from(units)).into_raw()
    }

    /// An Array record of `len` Null elements, to be filled in by the caller.
    pub fn alloc_array(len: usize) -> RawValue {
        Value::Array((0..len).map(|_| Value::Null).collect()).into_raw()
    }

    pub fn kind(&self) -> Option<Kind> {
        Kind::from_code(self.kind)
    }

    /// Releases everything the record owns.
    ///
    /// # Safety
    ///
    /// The record must have come from [`Value::into_raw`] (or the alloc functions) and
    /// must not be used again.
    pub unsafe fn dispose(self) {
        drop(Value::from_raw(self));
    }
}

fn text_into_raw(kind: Kind, text: JsText) -> RawValue {
    let len = match i32::try_from(text.len()) {
        Ok(len) => len,
        Err(_) => return text_into_raw(Kind::UnknownError, JsText::from(TOO_LARGE)),
    };
    let units = Box::into_raw(text.into_units().into_boxed_slice());
    RawValue::new(kind, RawPayload { str: units as *mut u16 }, len)
}

unsafe fn text_from_raw(raw: &RawValue) -> JsText {
    let len = usize::try_from(raw.length).unwrap_or(0);
    if raw.payload.str.is_null() || len == 0 {
        return JsText::new();
    }
    let units = Box::from_raw(ptr::slice_from_raw_parts_mut(raw.payload.str, len));
    JsText::from(units.into_vec())
}

impl Value {
    /// Converts into a record, transferring ownership of buffers and handles to it.
    pub fn into_raw(self) -> RawValue {
        match self {
            Value::Null => RawValue::null(),
            Value::Boolean(b) => RawValue::new(Kind::Boolean, RawPayload { i32: i32::from(b) }, 0),
            Value::Integer(i) => RawValue::new(Kind::Integer, RawPayload { i32: i }, 0),
            Value::Index(i) => RawValue::new(Kind::Index, RawPayload { i64: i64::from(i) }, 0),
            Value::Number(n) => RawValue::new(Kind::Number, RawPayload { num: n }, 0),
            Value::Date(ms) => RawValue::new(Kind::Date, RawPayload { num: ms }, 0),
            Value::String(s) => text_into_raw(Kind::String, s),
            Value::Error(s) => text_into_raw(Kind::Error, s),
            Value::CompileError(s) => text_into_raw(Kind::CompileError, s),
            Value::UnknownError(Some(s)) => text_into_raw(Kind::UnknownError, s),
            Value::UnknownError(None) => RawValue::new(Kind::UnknownError, RawPayload { str: ptr::null_mut() }, 0),
            Value::Array(items) => {
                let len = match i32::try_from(items.len()) {
                    Ok(len) => len,
                    Err(_) => return text_into_raw(Kind::UnknownError, JsText::from(TOO_LARGE)),
                };
                let elements: Box<[RawValue]> = items.into_iter().map(Value::into_raw).collect();
                let elements = Box::into_raw(elements) as *mut RawValue;
                RawValue::new(Kind::Array, RawPayload { arr: elements }, len)
            }
            Value::HostRef(id) => RawValue::new(Kind::HostRef, RawPayload { i64: 0 }, id.0),
            Value::HostError(id) => RawValue::new(Kind::HostError, RawPayload { i64: 0 }, id.0),
            Value::Wrapped(h) => handle_into_raw(Kind::Wrapped, h),
            Value::WrappedError(h) => handle_into_raw(Kind::WrappedError, h),
        }
    }

    /// Converts a record back, taking ownership of what it holds.
    /// Unknown kind codes become `UnknownError`.
    ///
    /// # Safety
    ///
    /// The record must have come from [`Value::into_raw`] or the alloc functions, possibly
    /// modified in place by the host (array elements replaced), and must not be used again.
    pub unsafe fn from_raw(raw: RawValue) -> Value {
        let kind = match Kind::from_code(raw.kind) {
            Some(kind) => kind,
            None => return Value::UnknownError(Some(JsText::from(format!("unknown type code {}", raw.kind)))),
        };
        match kind {
            Kind::Null => Value::Null,
            Kind::Boolean => Value::Boolean(raw.payload.i32 != 0),
            Kind::Integer => Value::Integer(raw.payload.i32),
            Kind::Index => match u32::try_from(raw.payload.i64) {
                Ok(i) => Value::Index(i),
                Err(_) => Value::UnknownError(Some(JsText::from(format!("index out of range: {}", raw.payload.i64)))),
            },
            Kind::Number => Value::Number(raw.payload.num),
            Kind::Date => Value::Date(raw.payload.num),
            Kind::String => Value::String(text_from_raw(&raw)),
            Kind::Error => Value::Error(text_from_raw(&raw)),
            Kind::CompileError => Value::CompileError(text_from_raw(&raw)),
            Kind::UnknownError if raw.payload.str.is_null() => Value::UnknownError(None),
            Kind::UnknownError => Value::UnknownError(Some(text_from_raw(&raw))),
            Kind::Array => {
                let len = usize::try_from(raw.length).unwrap_or(0);
                if raw.payload.arr.is_null() || len == 0 {
                    return Value::Array(Vec::new());
                }
                let elements = Box::from_raw(ptr::slice_from_raw_parts_mut(raw.payload.arr, len));
                Value::Array(elements.into_vec().into_iter().map(|e| Value::from_raw(e)).collect())
            }
            Kind::HostRef => Value::HostRef(HostId(raw.length)),
            Kind::HostError => Value::HostError(HostId(raw.length)),
            Kind::Wrapped | Kind::WrappedError => {
                if raw.payload.ptr.is_null() {
                    return Value::UnknownError(Some(JsText::from("null object handle")));
                }
                let handle = *Box::from_raw(raw.payload.ptr as *mut ObjectHandle);
                if kind == Kind::Wrapped {
                    Value::Wrapped(handle)
                } else {
                    Value::WrappedError(handle)
                }
            }
        }
    }
}

fn handle_into_raw(kind: Kind, handle: ObjectHandle) -> RawValue {
    let handle = Box::into_raw(Box::new(handle));
    RawValue::new(kind, RawPayload { ptr: handle as *mut c_void }, 0)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    use crate::engine::ReleaseQueue;

    #[test]
    fn layout() {
        let raw = RawValue::alloc_string(&[0x61, 0x62]);
        let base = &raw as *const RawValue as *const u8;
        unsafe {
            assert_eq!(ptr::read(base as *const *mut u16), raw.payload.str);
            assert_eq!(ptr::read(base.add(8) as *const i32), Kind::String.code());
            assert_eq!(ptr::read(base.add(12) as *const i32), 2);
            raw.dispose();
        }
    }

    #[test]
    fn scalars() {
        let raw = Value::Index(3_000_000_000).into_raw();
        assert_eq!(raw.kind(), Some(Kind::Index));
        assert_eq!(unsafe { raw.payload.i64 }, 3_000_000_000);
        assert_eq!(unsafe { Value::from_raw(raw) }, Value::Index(3_000_000_000));

        let raw = Value::HostError(HostId(17)).into_raw();
        assert_eq!(raw.length, 17);
        assert_eq!(unsafe { Value::from_raw(raw) }, Value::HostError(HostId(17)));

        let raw = Value::Date(59_359_379_000.0).into_raw();
        assert_eq!(unsafe { raw.payload.num }, 59_359_379_000.0);
        unsafe { raw.dispose() };
    }

    #[test]
    fn strings() {
        let raw = RawValue::alloc_string(&[0x68, 0x69, 0xD800]);
        assert_eq!(raw.kind(), Some(Kind::String));
        assert_eq!(raw.length, 3);
        let units = unsafe { std::slice::from_raw_parts(raw.payload.str, 3) };
        assert_eq!(units, &[0x68, 0x69, 0xD800]);
        assert_eq!(unsafe { Value::from_raw(raw) }, Value::String(JsText::from(vec![0x68, 0x69, 0xD800])));

        let raw = Value::UnknownError(None).into_raw();
        assert!(unsafe { raw.payload.str.is_null() });
        assert_eq!(unsafe { Value::from_raw(raw) }, Value::UnknownError(None));
    }

    #[test]
    fn host_fills_array() {
        let raw = RawValue::alloc_array(2);
        assert_eq!(raw.length, 2);
        unsafe {
            *raw.payload.arr = Value::Integer(1).into_raw();
            *raw.payload.arr.add(1) = RawValue::alloc_string(&[0x78]);
        }
        let value = unsafe { Value::from_raw(raw) };
        assert_eq!(value, Value::Array(vec![Value::Integer(1), Value::from("x")]));
    }

    #[test]
    fn nested_array_disposes_each_handle_once() {
        let queue = Arc::new(ReleaseQueue::default());
        let handle = |id| ObjectHandle::new(1, id, Arc::downgrade(&queue));
        let value = Value::Array(vec![
            Value::Wrapped(handle(1)),
            Value::Array(vec![Value::WrappedError(handle(2)), Value::Array(vec![])]),
            Value::from("x"),
            Value::Wrapped(handle(3)),
        ]);

        let raw = value.into_raw();
        assert!(queue.drain().is_empty());
        unsafe { raw.dispose() };

        let mut released = queue.drain();
        released.sort();
        assert_eq!(released, vec![1, 2, 3]);
    }

    #[test]
    fn index_out_of_range() {
        for bad in [-1i64, 1 << 32, i64::MIN] {
            let raw = RawValue { payload: RawPayload { i64: bad }, kind: Kind::Index.code(), length: 0 };
            assert_eq!(unsafe { Value::from_raw(raw) }.kind(), Kind::UnknownError);
        }
        let raw = RawValue { payload: RawPayload { i64: u32::MAX as i64 }, kind: Kind::Index.code(), length: 0 };
        assert_eq!(unsafe { Value::from_raw(raw) }, Value::Index(u32::MAX));
    }

    #[test]
    fn unknown_kind() {
        let raw = RawValue { payload: RawPayload { i64: 0 }, kind: 99, length: 0 };
        assert_eq!(unsafe { Value::from_raw(raw) }.kind(), Kind::UnknownError);
    }
}
