// ABOUTME: Operator interruption (Ctrl-C) as a value procedures can race against
// ABOUTME: Steps wrapped with InterruptSignal::run stop early so cleanup can still run

use anyhow::Result;
use std::future::Future;
use std::io;
use tokio::sync::watch;

use crate::errors::MigrateError;

/// Fires an [`InterruptSignal`]
#[derive(Debug)]
pub struct InterruptTrigger {
    tx: watch::Sender<bool>,
}

impl InterruptTrigger {
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }
}

/// Cloneable view of whether the operator asked to stop
#[derive(Debug, Clone)]
pub struct InterruptSignal {
    rx: watch::Receiver<bool>,
}

impl InterruptSignal {
    /// A connected trigger/signal pair
    pub fn pair() -> (InterruptTrigger, InterruptSignal) {
        let (tx, rx) = watch::channel(false);
        (InterruptTrigger { tx }, InterruptSignal { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_trigger, signal) = Self::pair();
        signal
    }

    /// A signal fired by the first Ctrl-C delivered to the process
    ///
    /// Installing the handler replaces the default "die immediately" behaviour,
    /// which is what gives procedures the chance to clean up. A second Ctrl-C
    /// abandons cleanup and exits with status 1.
    pub fn ctrl_c() -> Self {
        Self::listen(tokio::signal::ctrl_c, || {
            tracing::error!("Received second Ctrl-C, exiting without cleanup");
            std::process::exit(1);
        })
    }

    /// A signal fired by the first event from `next_signal`
    ///
    /// `on_repeat` runs if a second event arrives after that.
    pub fn listen<S, Fut, G>(mut next_signal: S, on_repeat: G) -> Self
    where
        S: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<()>> + Send,
        G: FnOnce() + Send + 'static,
    {
        let (trigger, signal) = Self::pair();
        tokio::spawn(async move {
            if let Err(e) = next_signal().await {
                tracing::warn!("⚠ Could not listen for Ctrl-C: {}", e);
                return;
            }
            tracing::debug!("Received Ctrl-C");
            trigger.fire();

            if next_signal().await.is_ok() {
                on_repeat();
            }
        });
        signal
    }

    pub fn is_interrupted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has fired; pends forever if it never can
    pub async fn interrupted(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|fired| *fired).await.is_err() {
            // trigger dropped without firing
            std::future::pending::<()>().await;
        }
    }

    /// Drive `step` to completion unless the operator interrupts first
    ///
    /// On interruption `step` is dropped (killing any in-flight child process)
    /// and [`MigrateError::Interrupted`] is returned. A signal that already
    /// fired prevents `step` from starting at all.
    pub async fn guard<T, F>(&self, step: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.interrupted() => Err(MigrateError::Interrupted.into()),
            value = step => Ok(value),
        }
    }

    /// [`guard`](Self::guard) for fallible steps
    pub async fn run<T, F>(&self, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.guard(step).await?
    }
}
