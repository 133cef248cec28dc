//! Cooperative shutdown flag shared between the signal handler and the loops.

use std::time::Duration;
use tokio::sync::watch;

/// Sets the flag. Held by whoever listens for process signals.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Observes the flag. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// New trigger/observer pair, initially not triggered.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set. Never resolves if the trigger was dropped unset.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        let sender_gone = rx.wait_for(|stop| *stop).await.is_err();
        if sender_gone {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless shutdown comes first. Returns false when interrupted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.triggered() => false,
        }
    }
}
