//! Surface registry and broadcast support

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};

/// Surface ID type
pub type SurfaceId = u64;

/// Global surface ID counter
static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Serialized runtime message
pub type SurfaceMessage = String;

/// Hub connecting every live surface (popup, options page, background)
#[derive(Clone)]
pub struct Hub {
    surfaces: Arc<Mutex<HashMap<SurfaceId, Sender<SurfaceMessage>>>>,
}

/// A registered surface's end of the hub
pub struct Subscription {
    pub id:   SurfaceId,
    receiver: Receiver<SurfaceMessage>,
}

impl Subscription {
    /// Drain every message queued since the last call
    pub fn drain(&self) -> Vec<SurfaceMessage> {
        self.receiver.try_iter().collect()
    }

    pub fn receiver(&self) -> &Receiver<SurfaceMessage> {
        &self.receiver
    }
}

impl Hub {
    /// Create a new hub
    pub fn new() -> Self {
        Self {
            surfaces: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Generate a unique surface ID
    pub fn next_surface_id() -> SurfaceId {
        NEXT_SURFACE_ID.fetch_add(1, Ordering::SeqCst)
    }

    fn surfaces(&self) -> MutexGuard<'_, HashMap<SurfaceId, Sender<SurfaceMessage>>> {
        self.surfaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new surface with its message sender
    pub fn register(&self, id: SurfaceId, sender: Sender<SurfaceMessage>) {
        self.surfaces().insert(id, sender);
    }

    /// Register a fresh surface and hand back its receiving end
    pub fn connect(&self) -> Subscription {
        let id = Self::next_surface_id();
        let (tx, rx) = unbounded();
        self.register(id, tx);
        Subscription { id, receiver: rx }
    }

    /// Get count of live surfaces
    pub fn surface_count(&self) -> usize {
        self.surfaces().len()
    }

    /// Broadcast a message to all live surfaces
    ///
    /// Surfaces whose receiver is gone are dropped from the registry. Returns
    /// the number of surfaces the message was queued for.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut surfaces = self.surfaces();
        let mut delivered = 0;

        surfaces.retain(|id, sender| match sender.try_send(message.to_string()) {
            Ok(()) => {
                delivered += 1;
                true
            },
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!(surface = id, "dropping closed surface");
                false
            },
        });

        delivered
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
