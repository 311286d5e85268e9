use std::fmt;

use time::OffsetDateTime;

use super::handle::ObjectHandle;

/// An opaque identifier for a host object, assigned by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub i32);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The type code of a value. The numeric codes are part of the wire layout in [`crate::raw`]
/// and must not change. Negative codes are error kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Kind {
    Null = 0,
    Boolean = 1,
    Integer = 2,
    Number = 3,
    String = 4,
    Date = 5,
    Index = 6,
    Array = 10,
    HostRef = 11,
    Wrapped = 12,
    UnknownError = -1,
    Error = -2,
    CompileError = -3,
    HostError = -4,
    WrappedError = -5,
}

impl Kind {
    pub fn from_code(code: i32) -> Option<Kind> {
        let kind = match code {
            0 => Kind::Null,
            1 => Kind::Boolean,
            2 => Kind::Integer,
            3 => Kind::Number,
            4 => Kind::String,
            5 => Kind::Date,
            6 => Kind::Index,
            10 => Kind::Array,
            11 => Kind::HostRef,
            12 => Kind::Wrapped,
            -1 => Kind::UnknownError,
            -2 => Kind::Error,
            -3 => Kind::CompileError,
            -4 => Kind::HostError,
            -5 => Kind::WrappedError,
            _ => return None,
        };
        Some(kind)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_error(self) -> bool {
        self.code() < 0
    }
}

/// JS text: a sequence of UTF-16 code units, kept as-is.
/// Unpaired surrogates survive the trip through the engine.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct JsText {
    units: Vec<u16>,
}

impl JsText {
    pub fn new() -> JsText {
        JsText::default()
    }

    pub fn as_units(&self) -> &[u16] {
        &self.units
    }

    pub fn into_units(self) -> Vec<u16> {
        self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unpaired surrogates become U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.units)
    }
}

impl From<Vec<u16>> for JsText {
    fn from(units: Vec<u16>) -> JsText {
        JsText { units }
    }
}

impl From<&[u16]> for JsText {
    fn from(units: &[u16]) -> JsText {
        JsText { units: units.to_vec() }
    }
}

impl From<&str> for JsText {
    fn from(s: &str) -> JsText {
        JsText { units: s.encode_utf16().collect() }
    }
}

impl From<String> for JsText {
    fn from(s: String) -> JsText {
        JsText::from(s.as_str())
    }
}

impl PartialEq<str> for JsText {
    fn eq(&self, other: &str) -> bool {
        self.units.iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for JsText {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl fmt::Display for JsText {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for JsText {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

/// A value crossing the engine boundary.
///
/// Values own their payload. Strings and arrays are owned buffers, and object handles
/// keep their engine object alive until dropped, so a value can be moved but not copied.
/// Dropping a value disposes it, arrays disposing each element exactly once.
///
/// Numbers are split by range: integral values that fit an `i32` are `Integer`,
/// integral values in `[2^31, 2^32)` are `Index`, everything else (including -0) is `Number`.
#[derive(Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    Index(u32),
    Number(f64),
    String(JsText),
    /// Milliseconds since the Unix epoch, UTC.
    Date(f64),
    Array(Vec<Value>),
    HostRef(HostId),
    Wrapped(ObjectHandle),

    /// A script or engine failure with no error object behind it, e.g. `throw "boom"`.
    Error(JsText),
    CompileError(JsText),
    /// Script threw a host object.
    HostError(HostId),
    /// Script threw an engine object, usually an `Error`.
    WrappedError(ObjectHandle),
    UnknownError(Option<JsText>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match *self {
            Value::Null => Kind::Null,
            Value::Boolean(_) => Kind::Boolean,
            Value::Integer(_) => Kind::Integer,
            Value::Index(_) => Kind::Index,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Date(_) => Kind::Date,
            Value::Array(_) => Kind::Array,
            Value::HostRef(_) => Kind::HostRef,
            Value::Wrapped(_) => Kind::Wrapped,
            Value::Error(_) => Kind::Error,
            Value::CompileError(_) => Kind::CompileError,
            Value::HostError(_) => Kind::HostError,
            Value::WrappedError(_) => Kind::WrappedError,
            Value::UnknownError(_) => Kind::UnknownError,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind().is_error()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Any of the numeric kinds, widened.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Integer(i) => Some(f64::from(i)),
            Value::Index(i) => Some(f64::from(i)),
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&JsText> {
        match *self {
            Value::String(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match *self {
            Value::Array(ref items) => Some(items),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The host id of a `HostRef` or `HostError`.
    pub fn host_id(&self) -> Option<HostId> {
        match *self {
            Value::HostRef(id) | Value::HostError(id) => Some(id),
            _ => None,
        }
    }

    /// The engine object behind a `Wrapped` or `WrappedError`.
    pub fn handle(&self) -> Option<&ObjectHandle> {
        match *self {
            Value::Wrapped(ref h) | Value::WrappedError(ref h) => Some(h),
            _ => None,
        }
    }

    /// The message carried by `Error`, `CompileError` and `UnknownError`.
    pub fn error_message(&self) -> Option<String> {
        match *self {
            Value::Error(ref t) | Value::CompileError(ref t) => Some(t.to_string_lossy()),
            Value::UnknownError(ref t) => t.as_ref().map(JsText::to_string_lossy),
            _ => None,
        }
    }

    pub fn from_datetime(dt: OffsetDateTime) -> Value {
        Value::Date((dt.unix_timestamp_nanos() / 1_000_000) as f64)
    }

    /// `None` for non-dates and for the invalid date (NaN).
    pub fn as_datetime(&self) -> Option<OffsetDateTime> {
        match *self {
            Value::Date(ms) if ms.is_finite() => {
                OffsetDateTime::from_unix_timestamp_nanos(ms.trunc() as i128 * 1_000_000).ok()
            }
            _ => None,
        }
    }

    /// Releases whatever the value owns. Same as dropping it.
    pub fn dispose(self) {}
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Integer(i)
    }
}

/// Becomes `Index` only when the value doesn't fit an `Integer`.
impl From<u32> for Value {
    fn from(i: u32) -> Value {
        match i32::try_from(i) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Index(i),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(JsText::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(JsText::from(s))
    }
}

impl From<JsText> for Value {
    fn from(s: JsText) -> Value {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Array(items)
    }
}

impl From<HostId> for Value {
    fn from(id: HostId) -> Value {
        Value::HostRef(id)
    }
}

impl From<ObjectHandle> for Value {
    fn from(h: ObjectHandle) -> Value {
        Value::Wrapped(h)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use time::{Date, Month};

    #[test]
    fn kind_codes_round_trip() {
        let kinds = [
            Kind::Null, Kind::Boolean, Kind::Integer, Kind::Number, Kind::String, Kind::Date,
            Kind::Index, Kind::Array, Kind::HostRef, Kind::Wrapped, Kind::UnknownError,
            Kind::Error, Kind::CompileError, Kind::HostError, Kind::WrappedError,
        ];
        for kind in kinds.iter() {
            assert_eq!(Kind::from_code(kind.code()), Some(*kind));
        }
        assert_eq!(Kind::from_code(7), None);
        assert!(Kind::HostError.is_error());
        assert!(!Kind::HostRef.is_error());
    }

    #[test]
    fn text_keeps_code_units() {
        let lone = JsText::from(vec![0x61, 0xD800, 0x62]);
        assert_eq!(lone.len(), 3);
        assert_eq!(lone.as_units(), &[0x61, 0xD800, 0x62]);
        assert_eq!(lone.to_string_lossy(), "a\u{FFFD}b");

        let astral = JsText::from("x\u{1F600}");
        assert_eq!(astral.len(), 3);
        assert_eq!(astral, "x\u{1F600}");
    }

    #[test]
    fn u32_splits_on_range() {
        assert_eq!(Value::from(7u32), Value::Integer(7));
        assert_eq!(Value::from(3_000_000_000u32), Value::Index(3_000_000_000));
        assert_eq!(Value::Index(3_000_000_000).as_f64(), Some(3e9));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(Some("x")).as_text().map(JsText::to_string_lossy), Some("x".into()));
        assert!(Value::from(None::<i32>).is_null());
        assert_eq!(Value::HostError(HostId(3)).host_id(), Some(HostId(3)));
        assert_eq!(Value::Error(JsText::from("boom")).error_message(), Some("boom".into()));
        assert_eq!(Value::UnknownError(None).error_message(), None);
        assert!(Value::CompileError(JsText::new()).is_error());
        assert_eq!(Value::from(vec![Value::Null]).into_array().map(|v| v.len()), Some(1));
    }

    #[test]
    fn dates() {
        let dt = Date::from_calendar_date(1971, Month::November, 19).unwrap()
            .with_hms(0, 42, 59).unwrap()
            .assume_utc();
        let value = Value::from_datetime(dt);
        assert_eq!(value, Value::Date(59_359_379_000.0));
        assert_eq!(value.as_datetime(), Some(dt));
        assert_eq!(Value::Date(f64::NAN).as_datetime(), None);
    }
}
