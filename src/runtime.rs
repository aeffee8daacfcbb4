//! Runtime - Interrupt delivery and child signalling

use std::io;
use tokio::process::Child;

/// What the user (or the system) asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

/// Awaitable interrupt source.
///
/// Installing it replaces the default "die on SIGINT" disposition, so the
/// shell stays in charge of tearing the node down.
pub struct Interrupts {
    inner: Option<Listener>,
}

#[cfg(unix)]
struct Listener {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(not(unix))]
struct Listener;

impl Interrupts {
    /// Install signal handlers. Must be called from within a tokio runtime.
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                inner: Some(Listener {
                    sigint: signal(SignalKind::interrupt())?,
                    sigterm: signal(SignalKind::terminate())?,
                }),
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self { inner: Some(Listener) })
        }
    }

    /// A source that never fires
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// Wait for the next interrupt
    pub async fn recv(&mut self) -> Interrupt {
        let Some(listener) = self.inner.as_mut() else {
            return std::future::pending().await;
        };

        #[cfg(unix)]
        {
            tokio::select! {
                _ = listener.sigint.recv() => {
                    tracing::info!("Received SIGINT");
                    Interrupt::Interrupt
                }
                _ = listener.sigterm.recv() => {
                    tracing::info!("Received SIGTERM");
                    Interrupt::Terminate
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = listener;
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Ctrl+C handler failed: {}", e);
                return std::future::pending().await;
            }
            tracing::info!("Received Ctrl+C");
            Interrupt::Interrupt
        }
    }
}

/// Relay an interrupt to a child process. A child that already exited is not an error.
pub fn forward(child: &mut Child, interrupt: Interrupt) -> io::Result<()> {
    #[cfg(unix)]
    {
        let Some(pid) = child.id() else { return Ok(()) };
        let sig = match interrupt {
            Interrupt::Interrupt => libc::SIGINT,
            Interrupt::Terminate => libc::SIGTERM,
        };
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid as libc::pid_t, sig) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err);
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        match interrupt {
            // Console children already receive Ctrl+C from the terminal
            Interrupt::Interrupt => Ok(()),
            Interrupt::Terminate => child.start_kill(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn none_never_fires() {
        let mut interrupts = Interrupts::none();
        let result = tokio::time::timeout(Duration::from_millis(50), interrupts.recv()).await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn forward_terminate_stops_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .expect("spawn sleep");

        forward(&mut child, Interrupt::Terminate).expect("signal");
        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child exits")
            .expect("wait");
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn forward_to_exited_child_is_ok() {
        let mut child = tokio::process::Command::new("true").spawn().expect("spawn true");
        child.wait().await.expect("wait");
        assert!(forward(&mut child, Interrupt::Interrupt).is_ok());
    }
}
