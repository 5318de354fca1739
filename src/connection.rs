use crate::adapter::{self, Record};
use crate::driver::{ProcedureDriver, Scalar};
use crate::error::CallError;
use log::{debug, info, warn};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

/// Retry discipline for opening a connection.
#[derive(Debug, Clone, Copy)]
pub enum RetryPolicy {
    /// Retry forever with a fixed delay. The shared service connection
    /// has nothing useful to do without a database, so it waits.
    Unbounded { delay: Duration },
    /// Give up after a fixed number of attempts, surfacing the last
    /// error. Used for the per-user login path.
    Bounded { attempts: u32, delay: Duration },
}

enum Command {
    Call {
        procedure: String,
        args: Vec<Scalar>,
        reply: oneshot::Sender<Result<Vec<Record>, CallError>>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// Owner of the process-wide database connection.
///
/// A dedicated worker thread holds the driver (odbc connections are not
/// `Send`); every invocation is serialized through its command queue, so
/// concurrent requests can never interleave cursor operations on the
/// shared connection.
pub struct ConnectionManager {
    cmd_tx: mpsc::Sender<Command>,
}

impl ConnectionManager {
    /// Open the shared connection and start the worker.
    ///
    /// Returns once the policy yields a connection: under the unbounded
    /// policy this does not resolve until the database accepts, under the
    /// bounded one it fails after the configured attempts.
    pub async fn connect<D, F>(factory: F, policy: RetryPolicy) -> Result<Self, CallError>
    where
        D: ProcedureDriver + 'static,
        F: FnMut() -> Result<D, CallError> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CallError>>();

        thread::spawn(move || worker(factory, policy, ready_tx, cmd_rx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self { cmd_tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CallError::connection(
                "connection worker exited before signalling readiness",
            )),
        }
    }

    /// Invoke a stored procedure and return the normalized records.
    pub async fn call(
        &self,
        procedure: &str,
        args: Vec<Scalar>,
    ) -> Result<Vec<Record>, CallError> {
        if procedure.is_empty() {
            return Err(CallError::invalid("empty procedure name"));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Call {
                procedure: procedure.to_string(),
                args,
                reply: reply_tx,
            })
            .map_err(|_| CallError::connection("connection worker is not running"))?;
        reply_rx
            .await
            .map_err(|_| CallError::connection("connection worker died before replying"))?
    }

    /// Release the connection and stop the worker. Releasing an
    /// already-stopped worker is a no-op; calls arriving afterwards fail
    /// with a connection-class error instead of hanging.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Shutdown { ack: ack_tx })
            .is_err()
        {
            return;
        }
        let _ = ack_rx.await;
    }
}

/// Try to open a short-lived connection with caller-supplied credentials.
///
/// The login path: runs the bounded acquire loop off the async runtime and
/// discards the connection immediately on success. Never touches the
/// shared service connection.
pub async fn verify_credentials<D, F>(factory: F, policy: RetryPolicy) -> Result<(), CallError>
where
    D: ProcedureDriver + 'static,
    F: FnMut() -> Result<D, CallError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut factory = factory;
        acquire(&mut factory, policy).map(drop)
    })
    .await
    .map_err(|e| CallError::connection(format!("login task failed: {}", e)))?
}

fn worker<D, F>(
    mut factory: F,
    policy: RetryPolicy,
    ready_tx: oneshot::Sender<Result<(), CallError>>,
    cmd_rx: mpsc::Receiver<Command>,
) where
    D: ProcedureDriver,
    F: FnMut() -> Result<D, CallError>,
{
    let mut driver = match acquire(&mut factory, policy) {
        Ok(driver) => driver,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    while let Ok(command) = cmd_rx.recv() {
        match command {
            Command::Call {
                procedure,
                args,
                reply,
            } => {
                debug!("calling {} ({} args)", procedure, args.len());
                let outcome = driver.call(&procedure, &args).map(adapter::flatten);
                if let Err(ref e) = outcome {
                    warn!("{} failed: {}", procedure, e);
                }
                let _ = reply.send(outcome);
            }
            Command::Shutdown { ack } => {
                drop(driver);
                info!("database connection released");
                let _ = ack.send(());
                return;
            }
        }
    }
    // Channel closed without an explicit shutdown; the connection drops here.
}

fn acquire<D, F>(factory: &mut F, policy: RetryPolicy) -> Result<D, CallError>
where
    F: FnMut() -> Result<D, CallError>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match factory() {
            Ok(driver) => {
                info!("database connection established (attempt {})", attempt);
                return Ok(driver);
            }
            Err(e) => match policy {
                RetryPolicy::Unbounded { delay } => {
                    warn!(
                        "connection attempt {} failed: {}; retrying in {}s",
                        attempt,
                        e,
                        delay.as_secs()
                    );
                    thread::sleep(delay);
                }
                RetryPolicy::Bounded { attempts, delay } => {
                    if attempt >= attempts {
                        return Err(e);
                    }
                    warn!(
                        "connection attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    thread::sleep(delay);
                }
            },
        }
    }
}
