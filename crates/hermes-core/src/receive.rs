use std::sync::Arc;

use hermes_ipc::{IpcEvent, IpcResult, ListenerKiller, ReceiveHandle, ReceiveOptions, ZendService};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::{AppStores, CoreError, CoreResult, ReceiveReducer};

/// Owns the single receive listener session and the task that feeds its
/// events through the [`ReceiveReducer`].
pub struct ReceiveController {
    stores: Arc<AppStores>,
    zend: Arc<ZendService>,
    defaults: ReceiveOptions,
    session: Arc<AsyncMutex<SessionSlot>>,
}

#[derive(Default)]
struct SessionSlot {
    generation: u64,
    reducer: ReceiveReducer,
    consumer: Option<JoinHandle<()>>,
    killer: Option<ListenerKiller>,
}

impl SessionSlot {
    /// Detaches the running session so its consumer can never apply another event.
    fn retire(&mut self, stores: &AppStores) -> bool {
        self.generation += 1;
        let was_running = self.consumer.is_some() || self.killer.is_some();
        if let Some(consumer) = self.consumer.take() {
            consumer.abort();
        }
        if let Some(killer) = self.killer.take() {
            killer.kill();
        }
        self.reducer.cancel_active(stores);
        was_running
    }
}

impl ReceiveController {
    pub fn new(stores: Arc<AppStores>, zend: Arc<ZendService>, defaults: ReceiveOptions) -> Self {
        Self {
            stores,
            zend,
            defaults,
            session: Arc::new(AsyncMutex::new(SessionSlot::default())),
        }
    }

    pub fn defaults(&self) -> &ReceiveOptions {
        &self.defaults
    }

    pub async fn start_default(&self) -> CoreResult<()> {
        let options = self.defaults.clone();
        self.start(options).await
    }

    /// Starts a listener session, cancelling the previous one first.
    pub async fn start(&self, options: ReceiveOptions) -> CoreResult<()> {
        let mut slot = self.session.lock().await;
        if slot.retire(&self.stores) {
            tracing::info!("replacing running receive session");
        }

        let handle = match self.zend.start_receiving(&options).await {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!(error = %error, "failed to start receive listener");
                let message = error.user_message();
                self.stores
                    .receive
                    .update(|receive| receive.stop_listening(Some(message)));
                return Err(CoreError::from(error));
            }
        };

        let generation = slot.generation;
        slot.reducer = ReceiveReducer::new(options.output_dir.clone());
        slot.killer = Some(handle.killer());
        let port = options.effective_port();
        self.stores
            .receive
            .update(|receive| receive.start_listening(port));
        slot.consumer = Some(tokio::spawn(consume_session(
            Arc::clone(&self.stores),
            Arc::clone(&self.session),
            generation,
            handle,
        )));
        tracing::info!(port, generation, "receive session started");
        Ok(())
    }

    /// Stops the listener. Returns whether a session was running.
    pub async fn stop(&self) -> bool {
        let mut slot = self.session.lock().await;
        let was_running = slot.retire(&self.stores);
        self.zend.stop_receiving().await;
        self.stores
            .receive
            .update(|receive| receive.stop_listening(None));
        self.stores.sync_activity_selection();
        if was_running {
            tracing::info!("receive session stopped");
        }
        was_running
    }

    pub async fn toggle(&self) -> CoreResult<()> {
        if self.stores.is_listening() {
            self.stop().await;
            Ok(())
        } else {
            self.start_default().await
        }
    }

    pub async fn is_running(&self) -> bool {
        self.zend.is_receiving().await
    }

    pub async fn active_transfer_id(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .reducer
            .active_transfer_id()
            .map(str::to_owned)
    }
}

async fn consume_session(
    stores: Arc<AppStores>,
    session: Arc<AsyncMutex<SessionSlot>>,
    generation: u64,
    mut handle: ReceiveHandle,
) {
    loop {
        let next: IpcResult<Option<IpcEvent>> = handle.next_event().await;
        let mut slot = session.lock().await;
        if slot.generation != generation {
            return;
        }
        match next {
            Ok(Some(event)) => slot.reducer.apply(&stores, &event),
            Ok(None) => {
                tracing::info!(generation, "receive stream ended");
                slot.reducer.finish(&stores, None);
                slot.killer = None;
                slot.consumer = None;
                return;
            }
            Err(error) => {
                tracing::warn!(generation, error = %error, "receive stream failed");
                slot.reducer.finish(&stores, Some(error.user_message()));
                slot.killer = None;
                slot.consumer = None;
                return;
            }
        }
    }
}
