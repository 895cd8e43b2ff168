//! Foreground/background gating as a capability handle.
//!
//! The sync layer never asks the platform whether its surface is visible;
//! it holds a [`Visibility`] handle and checks it at each scheduled tick.
//! Embedders with a real notion of visibility (a windowed dashboard) drive
//! a [`VisibilityController`]; headless embedders use [`Visibility::always`].

use tokio::sync::watch;

/// Read side of the visibility capability. Cheap to clone; every stream
/// driver holds one.
#[derive(Debug, Clone)]
pub struct Visibility {
    rx: watch::Receiver<bool>,
}

impl Visibility {
    /// A handle that reports visible forever. For headless embedders and
    /// most tests.
    pub fn always() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self { rx }
    }

    /// A controllable pair. The controller side flips visibility; dropping
    /// it freezes the last value.
    pub fn controlled(initially_visible: bool) -> (VisibilityController, Self) {
        let (tx, rx) = watch::channel(initially_visible);
        (VisibilityController { tx }, Self { rx })
    }

    pub fn is_visible(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next visibility flip. Returns `false` once the
    /// controller is gone and no further changes can arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Write side of the visibility capability, held by the embedder.
#[derive(Debug)]
pub struct VisibilityController {
    tx: watch::Sender<bool>,
}

impl VisibilityController {
    pub fn set_visible(&self, visible: bool) {
        let _ = self.tx.send(visible);
    }
}
