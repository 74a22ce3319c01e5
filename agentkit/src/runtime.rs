//! Blocking execution of async wallet operations.
//!
//! Wallet providers expose a synchronous interface to agent frameworks while
//! the CDP client and the JSON-RPC provider are async. [`BlockingBridge`]
//! runs one future to completion and hands back its output:
//!
//! - inside a multi-thread tokio runtime, the ambient runtime is reused via
//!   [`tokio::task::block_in_place`];
//! - inside a current-thread runtime (its worker or one of its
//!   `spawn_blocking` threads), the future is polled in place while the
//!   bridge's own runtime drives its timers and sockets;
//! - anywhere else, the bridge's own runtime runs the future.

use std::fmt;
use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

use crate::wallet::WalletError;

/// Runs futures to completion from synchronous code.
///
/// The dedicated runtime is only built the first time it is needed, so a
/// bridge that always finds an ambient multi-thread runtime never owns one.
#[derive(Default)]
pub struct BlockingBridge {
    runtime: OnceLock<Runtime>,
}

impl fmt::Debug for BlockingBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingBridge")
            .field("dedicated_runtime", &self.runtime.get().is_some())
            .finish()
    }
}

impl Drop for BlockingBridge {
    fn drop(&mut self) {
        // Providers may be dropped inside async code, where a blocking shutdown panics.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl BlockingBridge {
    /// Create a bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `future` to completion, blocking the current thread.
    ///
    /// Called from a current-thread runtime, the ambient runtime makes no
    /// progress until the call returns.
    ///
    /// # Errors
    ///
    /// Returns the future's error, or [`WalletError::Runtime`] when the
    /// dedicated runtime cannot be built.
    pub fn block_on<F, T>(&self, future: F) -> Result<T, WalletError>
    where
        F: Future<Output = Result<T, WalletError>>,
    {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            Ok(_) => {
                let _enter = self.dedicated()?.enter();
                futures::executor::block_on(tokio::task::unconstrained(future))
            }
            Err(_) => self.dedicated()?.block_on(future),
        }
    }

    fn dedicated(&self) -> Result<&Runtime, WalletError> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .thread_name("agentkit-wallet")
            .build()
            .map_err(|e| WalletError::Runtime(format!("failed to build runtime: {e}")))?;
        Ok(self.runtime.get_or_init(|| runtime))
    }
}
