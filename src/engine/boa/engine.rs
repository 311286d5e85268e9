use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, info, warn};

use crate::engine::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::handle::ObjectHandle;
use crate::engine::traits::HostObjects;
use crate::engine::value::Value;

use super::active_context::{ActiveContext, Command, Request};
use super::context;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// A JS engine: one isolate with one global context.
///
/// The isolate lives on its own thread. Every operation is queued to that thread and
/// waits for its result, so an engine can be shared between host threads and calls never
/// overlap. Host callbacks run on the isolate thread in the middle of a call, and must not
/// call back into the engine.
///
/// Dropping the engine disposes it.
pub struct Engine {
    id: u64,
    commands: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: ThreadId,
}

impl Engine {
    pub fn new<H: HostObjects>(host: H) -> Result<Engine, EngineError> {
        Engine::with_config(host, EngineConfig::default())
    }

    pub fn with_config<H: HostObjects>(host: H, config: EngineConfig) -> Result<Engine, EngineError> {
        new_engine(Arc::new(host), config)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.commands).is_none()
    }

    /// Compiles and runs `source` in the global context. Returns the completion value,
    /// or an error value if the script didn't compile or threw.
    pub fn execute(&self, source: &str) -> Result<Value, EngineError> {
        self.request(Request::Execute(source.to_owned()))
    }

    pub fn get_variable(&self, name: &str) -> Result<Value, EngineError> {
        self.request(Request::GetVariable(name.to_owned()))
    }

    /// Sets a global. Returns `Null` on success.
    pub fn set_variable(&self, name: &str, value: Value) -> Result<Value, EngineError> {
        self.request(Request::SetVariable(name.to_owned(), value))
    }

    pub fn get_property(&self, object: &ObjectHandle, name: &str) -> Result<Value, EngineError> {
        self.check_handle(object)?;
        self.request(Request::GetProperty(object.id(), name.to_owned()))
    }

    /// Returns `Null` on success.
    pub fn set_property(&self, object: &ObjectHandle, name: &str, value: Value)
                        -> Result<Value, EngineError> {
        self.check_handle(object)?;
        self.request(Request::SetProperty(object.id(), name.to_owned(), value))
    }

    /// Calls the method `name` of `object`, with `this` bound to `object`.
    pub fn invoke_property(&self, object: &ObjectHandle, name: &str, args: Vec<Value>)
                           -> Result<Value, EngineError> {
        self.check_handle(object)?;
        self.request(Request::InvokeProperty(object.id(), name.to_owned(), args))
    }

    /// Runs a full collection. Host proxies that became unreachable get their `remove` callback.
    pub fn collect_garbage(&self) -> Result<(), EngineError> {
        self.request(Request::CollectGarbage).map(drop)
    }

    /// Shuts the isolate down and waits for it. Calls already queued still run.
    /// Every host proxy still alive gets its `remove` callback before this returns.
    pub fn dispose(&self) -> Result<(), EngineError> {
        if thread::current().id() == self.worker_thread {
            return Err(EngineError::Reentrant);
        }
        let commands = lock(&self.commands).take().ok_or(EngineError::Disposed)?;
        drop(commands);

        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            worker.join().map_err(|_| EngineError::WorkerLost)?;
        }
        info!(engine = self.id, "engine disposed");
        Ok(())
    }

    fn check_handle(&self, object: &ObjectHandle) -> Result<(), EngineError> {
        if object.engine_id() != self.id {
            return Err(EngineError::ForeignHandle { expected: self.id, found: object.engine_id() });
        }
        Ok(())
    }

    fn request(&self, request: Request) -> Result<Value, EngineError> {
        if thread::current().id() == self.worker_thread {
            warn!(engine = self.id, "host callback tried to reenter the engine");
            return Err(EngineError::Reentrant);
        }
        let commands = lock(&self.commands).clone().ok_or(EngineError::Disposed)?;

        let (reply, result) = mpsc::channel();
        commands.send(Command { request, reply }).map_err(|_| EngineError::WorkerLost)?;
        result.recv().map_err(|_| EngineError::WorkerLost)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        match self.dispose() {
            Ok(()) | Err(EngineError::Disposed) => (),
            Err(e) => warn!(engine = self.id, error = %e, "engine dropped without a clean shutdown"),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Engine").field("id", &self.id).field("disposed", &self.is_disposed()).finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_engine(host: Arc<dyn HostObjects>, config: EngineConfig) -> Result<Engine, EngineError> {
    let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
    let (commands, inbox) = mpsc::channel();
    let (ready, started) = mpsc::channel();

    let worker = thread::Builder::new()
        .name(config.thread_name.clone())
        .stack_size(config.stack_size)
        .spawn(move || run_isolate(id, host, config, inbox, ready))
        .map_err(|e| EngineError::Startup(e.to_string()))?;
    let worker_thread = worker.thread().id();

    match started.recv() {
        Ok(Ok(())) => (),
        Ok(Err(message)) => {
            let _ = worker.join();
            return Err(EngineError::Startup(message));
        }
        Err(_) => {
            let _ = worker.join();
            return Err(EngineError::Startup("isolate thread exited during startup".into()));
        }
    }

    info!(engine = id, "engine started");
    Ok(Engine {
        id,
        commands: Mutex::new(Some(commands)),
        worker: Mutex::new(Some(worker)),
        worker_thread,
    })
}

/// The isolate thread. Serves requests until every sender is gone, then tears down.
fn run_isolate(id: u64, host: Arc<dyn HostObjects>, config: EngineConfig,
               inbox: Receiver<Command>, ready: Sender<Result<(), String>>) {
    let mut env = match context::new_context_env(host, &config, id) {
        Ok(env) => env,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    debug!(engine = id, "isolate ready");

    for command in inbox.iter() {
        let value = ActiveContext::new(&mut env).dispatch(command.request);
        // The caller only goes away if its thread died while waiting.
        let _ = command.reply.send(value);
    }

    env.teardown();
}
