//! A scriptable host for engine tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing_subscriber::EnvFilter;

use crate::engine::{Engine, EngineError, HostId, HostObjects, JsText, KeepAlive, Value};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A property of a test object.
#[derive(Clone, Debug, PartialEq)]
pub enum Prop {
    Int(i32),
    Num(f64),
    Text(String),
    /// Reading this property throws an error object with the given message.
    Throws(String),
    /// Reading this property sleeps, recording when the host was entered and left.
    Slow(i32),
    /// Reading this property tries to call back into the engine.
    Reenter,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Enter,
    Exit,
}

#[derive(Default)]
pub struct TestObject {
    props: Mutex<HashMap<String, Prop>>,
}

impl TestObject {
    pub fn with(props: &[(&str, Prop)]) -> Arc<TestObject> {
        let obj = TestObject::default();
        {
            let mut map = obj.props.lock().unwrap();
            for (name, prop) in props {
                map.insert(name.to_string(), prop.clone());
            }
        }
        Arc::new(obj)
    }

    pub fn prop(&self, name: &str) -> Option<Prop> {
        self.props.lock().unwrap().get(name).cloned()
    }
}

#[derive(Default)]
pub struct TestHost {
    pub objects: KeepAlive<Arc<TestObject>>,
    removed: Mutex<Vec<HostId>>,
    events: Mutex<Vec<Event>>,
    engine: OnceLock<Weak<Engine>>,
    reentry: Mutex<Option<Result<Value, EngineError>>>,
}

impl TestHost {
    pub fn new() -> Arc<TestHost> {
        Arc::new(TestHost::default())
    }

    pub fn add(&self, props: &[(&str, Prop)]) -> HostId {
        self.objects.insert(TestObject::with(props))
    }

    pub fn removed(&self) -> Vec<HostId> {
        self.removed.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn attach(&self, engine: &Arc<Engine>) {
        let _ = self.engine.set(Arc::downgrade(engine));
    }

    /// What the engine answered when a `Reenter` property was read.
    pub fn take_reentry(&self) -> Option<Result<Value, EngineError>> {
        self.reentry.lock().unwrap().take()
    }

    fn error_object(&self, message: &str) -> Value {
        Value::HostError(self.add(&[("message", Prop::Text(message.into()))]))
    }
}

impl HostObjects for TestHost {
    fn remove(&self, id: HostId) {
        self.removed.lock().unwrap().push(id);
        self.objects.remove(id);
    }

    fn get_property(&self, id: HostId, name: &str) -> Value {
        let obj = match self.objects.get(id) {
            Some(obj) => obj,
            None => return self.error_object("no such host object"),
        };
        match obj.prop(name) {
            None => Value::Null,
            Some(Prop::Int(i)) => Value::Integer(i),
            Some(Prop::Num(n)) => Value::Number(n),
            Some(Prop::Text(s)) => Value::from(s),
            Some(Prop::Throws(message)) => self.error_object(&message),
            Some(Prop::Slow(i)) => {
                self.events.lock().unwrap().push(Event::Enter);
                thread::sleep(Duration::from_millis(5));
                self.events.lock().unwrap().push(Event::Exit);
                Value::Integer(i)
            }
            Some(Prop::Reenter) => {
                let answer = match self.engine.get().and_then(Weak::upgrade) {
                    Some(engine) => engine.execute("1"),
                    None => Err(EngineError::Disposed),
                };
                let rejected = matches!(answer, Err(EngineError::Reentrant));
                *self.reentry.lock().unwrap() = Some(answer);
                Value::Boolean(rejected)
            }
        }
    }

    fn set_property(&self, id: HostId, name: &str, value: Value) -> Value {
        let obj = match self.objects.get(id) {
            Some(obj) => obj,
            None => return self.error_object("no such host object"),
        };
        if let Some(Prop::Throws(message)) = obj.prop(name) {
            return self.error_object(&message);
        }
        let prop = match value {
            Value::Integer(i) => Prop::Int(i),
            Value::Number(n) => Prop::Num(n),
            Value::String(s) => Prop::Text(s.to_string_lossy()),
            other => Prop::Text(format!("{:?}", other)),
        };
        obj.props.lock().unwrap().insert(name.to_string(), prop);
        Value::Null
    }
}

pub fn new_engine() -> (Arc<TestHost>, Engine) {
    init_logging();
    let host = TestHost::new();
    let engine = Engine::new(host.clone()).unwrap();
    (host, engine)
}

/// A random value of a kind that survives a round trip unchanged.
pub fn random_value<R: Rng>(rng: &mut R, depth: usize) -> Value {
    let choices = if depth == 0 { 7 } else { 8 };
    match rng.gen_range(0..choices) {
        0 => Value::Null,
        1 => Value::Boolean(rng.gen()),
        2 => Value::Integer(rng.gen()),
        3 => Value::Index(rng.gen_range(1u32 << 31..=u32::MAX)),
        // Never integral, so it can't come back as an integer kind.
        4 => Value::Number(f64::from(rng.gen_range(-1_000_000..1_000_000)) + 0.25),
        5 => Value::String(random_text(rng)),
        6 => Value::Date(f64::from(rng.gen_range(-1_000_000_000..1_000_000_000)) * 1000.0),
        _ => {
            let len = rng.gen_range(0..5);
            Value::Array((0..len).map(|_| random_value(rng, depth - 1)).collect())
        }
    }
}

fn random_text<R: Rng>(rng: &mut R) -> JsText {
    // Includes an astral char (a surrogate pair) and a lone surrogate.
    const UNITS: &[&[u16]] = &[&[0x61], &[0x7A], &[0x20], &[0xE0], &[0x4E2D], &[0xD83D, 0xDE00], &[0xDC00]];
    let len = rng.gen_range(0..12);
    let mut units = Vec::new();
    for _ in 0..len {
        units.extend_from_slice(UNITS[rng.gen_range(0..UNITS.len())]);
    }
    JsText::from(units)
}
