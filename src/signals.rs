/// Signal handling for graceful shutdown.
///
/// Listens for SIGINT (Ctrl-C) and SIGTERM; either one triggers a
/// coordinated shutdown of both servers. The listener runs as a
/// background task and surfaces the event through a watch channel, so
/// the supervisor observes a cancellation event rather than a raw
/// signal.
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Receiving half of the shutdown event.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Manual trigger used in place of OS signals (tests, embedding).
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    /// Install SIGINT/SIGTERM handlers and return the shutdown event.
    pub fn install() -> std::io::Result<ShutdownSignal> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => tracing::info!("SIGINT received, shutting down"),
                _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
            }
            let _ = tx.send(true);
        });

        Ok(ShutdownSignal { rx })
    }

    /// A shutdown event fired by a [`ShutdownTrigger`] instead of a signal.
    pub fn manual() -> (ShutdownTrigger, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, ShutdownSignal { rx })
    }

    /// Resolve once shutdown has been requested. Never resolves if the
    /// trigger side is dropped without firing.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
