//! Named-event dispatch over a [`Connection`].

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::connection::{Connection, Inbound, LinkLifecycle};
use crate::error::LinkError;
use crate::protocol::{self, ChannelEvent};

pub type Handler = Box<dyn FnMut(&ChannelEvent) + Send + 'static>;

struct Registration {
    name: String,
    handler: Handler,
}

/// Runs handlers for inbound events on one task, one at a time, in the
/// order events arrived.
///
/// Lifecycle transitions are dispatched as the reserved events
/// [`protocol::CONNECT`] (`{"session": n}`) and [`protocol::DISCONNECT`]
/// (`{"reason": "..."}`).
pub struct EventRouter {
    connection: Connection,
    registrations: mpsc::UnboundedSender<Registration>,
    task: JoinHandle<()>,
}

impl EventRouter {
    pub fn spawn(connection: Connection, inbox: mpsc::Receiver<Inbound>) -> Self {
        Self::spawn_with(connection, inbox, Vec::new())
    }

    /// Like [`EventRouter::spawn`], with handlers installed before the first
    /// event can be dispatched.
    pub fn spawn_with(
        connection: Connection,
        inbox: mpsc::Receiver<Inbound>,
        initial: Vec<(String, Handler)>,
    ) -> Self {
        let mut handlers: HashMap<String, Vec<Handler>> = HashMap::new();
        for (name, handler) in initial {
            handlers.entry(name).or_default().push(handler);
        }
        let (registrations, pending) = mpsc::unbounded_channel();
        let task = tokio::spawn(dispatch(inbox, pending, handlers));
        Self {
            connection,
            registrations,
            task,
        }
    }

    /// Call `handler` for every event named `name` that arrives after this
    /// call. Handlers for the same name run in registration order.
    pub fn on<F>(&self, name: impl Into<String>, handler: F)
    where
        F: FnMut(&ChannelEvent) + Send + 'static,
    {
        let registration = Registration {
            name: name.into(),
            handler: Box::new(handler),
        };
        if self.registrations.send(registration).is_err() {
            debug!("router stopped; handler not registered");
        }
    }

    /// Send `payload` as event `name`. Fails with
    /// [`LinkError::NotConnected`] when the channel is down.
    pub async fn emit<T: Serialize + ?Sized>(&self, name: &str, payload: &T) -> Result<(), LinkError> {
        let event = ChannelEvent::from_payload(name, payload)?;
        let result = self.connection.send(&event).await;
        if let Err(e) = &result {
            debug!(event = name, error = %e, "emit failed");
        }
        result
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl Drop for EventRouter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn dispatch(
    mut inbox: mpsc::Receiver<Inbound>,
    mut pending: mpsc::UnboundedReceiver<Registration>,
    mut handlers: HashMap<String, Vec<Handler>>,
) {
    loop {
        tokio::select! {
            biased;
            Some(reg) = pending.recv() => {
                handlers.entry(reg.name).or_default().push(reg.handler);
            }
            inbound = inbox.recv() => {
                let Some(inbound) = inbound else { break };
                // Registrations queued before this event was taken must see it.
                while let Ok(reg) = pending.try_recv() {
                    handlers.entry(reg.name).or_default().push(reg.handler);
                }
                let event = match inbound {
                    Inbound::Event(event) => event,
                    Inbound::Lifecycle(transition) => lifecycle_event(transition),
                };
                run_handlers(&mut handlers, &event);
            }
        }
    }
    trace!("router inbox closed");
}

fn lifecycle_event(transition: LinkLifecycle) -> ChannelEvent {
    match transition {
        LinkLifecycle::Connected { session } => {
            ChannelEvent::new(protocol::CONNECT, json!({ "session": session }))
        }
        LinkLifecycle::Disconnected { reason } => {
            ChannelEvent::new(protocol::DISCONNECT, json!({ "reason": reason }))
        }
    }
}

fn run_handlers(handlers: &mut HashMap<String, Vec<Handler>>, event: &ChannelEvent) {
    let Some(list) = handlers.get_mut(&event.event) else {
        trace!(event = %event.event, "no handler");
        return;
    };
    for handler in list.iter_mut() {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
        if outcome.is_err() {
            error!(event = %event.event, "event handler panicked");
        }
    }
}
