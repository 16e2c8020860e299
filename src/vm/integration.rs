//! Worker pool running a virtual machine off the caller's thread
//!
//! `VmIntegration::start` spawns the workers and queues the VM bootstrap as
//! the first job. Readiness is published on a watch channel; invocations
//! submitted before the VM is ready complete immediately with a fault.

use crate::vm::engine::{ClassHandle, VirtualMachine};
use crate::vm::fault::VmFault;
use crate::vm::sandbox::SandboxFs;
use crate::vm::value::{self, InstanceRef, VmValue};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

type SharedVm = Arc<Mutex<Box<dyn VirtualMachine>>>;
type Reply = Result<VmValue, VmFault>;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct VmOptions {
    pool_size: usize,
    queue_capacity: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            pool_size: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            queue_capacity: 256,
        }
    }
}

impl VmOptions {
    /// Number of worker threads, at least one. Defaults to the available parallelism.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Jobs that may wait in the queue before submitters block
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

/// Bootstrap progress of the VM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmState {
    Starting,
    Ready,
    Failed(String),
}

enum Job {
    Bootstrap {
        fs: SandboxFs,
        state: watch::Sender<VmState>,
    },
    Invoke {
        owner: String,
        name: String,
        descriptor: String,
        is_static: bool,
        args: Vec<VmValue>,
        response: oneshot::Sender<Reply>,
    },
    Shutdown,
}

/// Pending result of a method invocation.
///
/// Await it from async code or call [`Invocation::wait`] from a plain thread.
#[derive(Debug)]
pub struct Invocation {
    rx: oneshot::Receiver<Reply>,
}

impl Invocation {
    fn completed(reply: Reply) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(reply);
        Self { rx }
    }

    /// Block the current thread until the invocation finishes.
    ///
    /// Panics when called from inside an async runtime.
    pub fn wait(self) -> Reply {
        self.rx.blocking_recv().unwrap_or(Err(VmFault::Shutdown))
    }
}

impl Future for Invocation {
    type Output = Reply;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.unwrap_or(Err(VmFault::Shutdown)))
    }
}

/// Virtual machine driven by a pool of worker threads
pub struct VmIntegration {
    vm: SharedVm,
    fs: SandboxFs,
    job_tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    state: watch::Receiver<VmState>,
}

impl VmIntegration {
    /// Spawn the workers and queue the VM bootstrap
    pub fn start<V>(vm: V, fs: SandboxFs, options: VmOptions) -> Result<Self, VmFault>
    where
        V: VirtualMachine + 'static,
    {
        let boxed: Box<dyn VirtualMachine> = Box::new(vm);
        let vm: SharedVm = Arc::new(Mutex::new(boxed));
        let (job_tx, job_rx) = bounded::<Job>(options.queue_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));
        let (state_tx, state) = watch::channel(VmState::Starting);

        let mut workers = Vec::with_capacity(options.pool_size);
        for i in 0..options.pool_size {
            let rx = job_rx.clone();
            let worker_vm = vm.clone();
            let shutdown_flag = shutdown.clone();

            let handle = std::thread::Builder::new()
                .name(format!("jasm-vm-worker-{}", i))
                .spawn(move || run_worker(rx, worker_vm, shutdown_flag))
                .map_err(|e| VmFault::InitFailed {
                    message: format!("failed to spawn worker: {}", e),
                })?;
            workers.push(handle);
        }

        let bootstrap = Job::Bootstrap {
            fs: fs.clone(),
            state: state_tx,
        };
        if job_tx.send(bootstrap).is_err() {
            return Err(VmFault::InitFailed {
                message: "worker pool stopped before bootstrap".to_string(),
            });
        }
        log::debug!("vm integration started with {} worker(s)", workers.len());

        Ok(Self {
            vm,
            fs,
            job_tx,
            workers,
            shutdown,
            state,
        })
    }

    /// Current bootstrap state
    pub fn state(&self) -> VmState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == VmState::Ready
    }

    /// Wait until bootstrap has finished, successfully or not
    pub async fn wait_ready(&self) -> VmState {
        let mut rx = self.state.clone();
        let state = match rx.wait_for(|s| *s != VmState::Starting).await {
            Ok(state) => state.clone(),
            Err(_) => VmState::Failed("worker pool stopped before bootstrap finished".to_string()),
        };
        state
    }

    /// Channel following bootstrap state changes
    pub fn subscribe(&self) -> watch::Receiver<VmState> {
        self.state.clone()
    }

    /// File access toggles seen by the VM
    pub fn sandbox(&self) -> &SandboxFs {
        &self.fs
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    /// Run `owner.name descriptor` inside the VM.
    ///
    /// Class lookup, initialization and the call itself all happen on a
    /// worker; the calling thread never takes the VM lock.
    pub fn invoke(&self, owner: &str, name: &str, descriptor: &str, is_static: bool, args: Vec<VmValue>) -> Invocation {
        if self.shutdown.load(Ordering::SeqCst) {
            return Invocation::completed(Err(VmFault::Shutdown));
        }
        match self.state() {
            VmState::Ready => {}
            VmState::Starting => return Invocation::completed(Err(VmFault::NotReady)),
            VmState::Failed(message) => return Invocation::completed(Err(VmFault::InitFailed { message })),
        }

        let (tx, rx) = oneshot::channel();
        let job = Job::Invoke {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_static,
            args,
            response: tx,
        };
        if self.job_tx.send(job).is_err() {
            return Invocation::completed(Err(VmFault::Shutdown));
        }
        Invocation { rx }
    }

    /// Render a value, decoding strings through the running VM
    pub fn render(&self, value: &VmValue) -> String {
        let vm = self.vm.lock();
        let decoder = |instance: &InstanceRef| vm.read_utf8(instance);
        value::render(value, &decoder)
    }

    /// Stop the workers and wait for them to exit
    pub fn shutdown(mut self) {
        self.signal_shutdown();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        log::debug!("vm integration shut down");
    }

    fn signal_shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        for _ in &self.workers {
            match self.job_tx.try_send(Job::Shutdown) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                // Workers also watch the flag once the queue drains
                Err(TrySendError::Full(_)) => break,
            }
        }
    }
}

impl Drop for VmIntegration {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

fn run_worker(rx: Receiver<Job>, vm: SharedVm, shutdown: Arc<AtomicBool>) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Job::Shutdown) => break,
            Ok(Job::Bootstrap { fs, state }) => bootstrap(&vm, &fs, &state),
            Ok(Job::Invoke {
                owner,
                name,
                descriptor,
                is_static,
                args,
                response,
            }) => {
                let reply = run_method(&vm, &owner, &name, &descriptor, is_static, &args);
                let _ = response.send(reply);
            }
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn bootstrap(vm: &SharedVm, fs: &SandboxFs, state: &watch::Sender<VmState>) {
    // parking_lot mutexes do not poison
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| vm.lock().bootstrap(fs)));
    let result = match outcome {
        Ok(result) => result,
        Err(_) => {
            log::error!("vm bootstrap panicked");
            state.send_replace(VmState::Failed("vm bootstrap panicked".to_string()));
            return;
        }
    };
    match result {
        Ok(()) => {
            log::debug!("vm bootstrap finished");
            state.send_replace(VmState::Ready);
        }
        Err(e) => {
            log::error!("vm bootstrap failed: {}", e.cause_chain().join(" <- "));
            state.send_replace(VmState::Failed(e.to_string()));
        }
    }
}

fn find_class(vm: &mut dyn VirtualMachine, owner: &str) -> Result<ClassHandle, VmFault> {
    match vm.find_class(owner) {
        Ok(Some(class)) => Ok(class),
        Ok(None) => Err(VmFault::ClassNotFound {
            owner: owner.to_string(),
        }),
        Err(e) => Err(VmFault::ClassInitFailed {
            owner: owner.to_string(),
            source: Box::new(e),
        }),
    }
}

fn run_method(vm: &SharedVm, owner: &str, name: &str, descriptor: &str, is_static: bool, args: &[VmValue]) -> Reply {
    let mut vm = vm.lock();
    let class = find_class(&mut **vm, owner)?;
    vm.initialize_class(&class).map_err(|e| VmFault::ClassInitFailed {
        owner: class.name.clone(),
        source: Box::new(e),
    })?;
    log::trace!("invoking {}.{}{}", class.name, name, descriptor);
    vm.invoke(&class, name, descriptor, is_static, args)
}
