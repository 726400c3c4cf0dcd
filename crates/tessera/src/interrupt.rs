//! Ctrl-C listener.
//!
//! A process-wide flag set from a dedicated thread running a single-threaded
//! tokio runtime. Installed at most once per process; once set it stays set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALL: Once = Once::new();

/// Starts the listener thread if it is not running yet.
pub(crate) fn install() {
    INSTALL.call_once(|| {
        let spawned = std::thread::Builder::new()
            .name("tessera-interrupt".to_owned())
            .spawn(listen);
        if let Err(err) = spawned {
            tracing::warn!(error = %err, "failed to start interrupt listener");
        }
    });
}

/// Returns `true` once Ctrl-C has been received.
pub(crate) fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::Acquire)
}

fn listen() {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::warn!(error = %err, "failed to build interrupt runtime");
            return;
        }
    };
    runtime.block_on(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, finishing current frame");
                INTERRUPTED.store(true, Ordering::Release);
            }
            Err(err) => tracing::warn!(error = %err, "failed to listen for interrupt"),
        }
    });
}
