//! RpcGateway: synchronous and asynchronous remote method calls.
//!
//! `call_sync` awaits the reply in place, suspending the interpreter.
//! `call_async` returns immediately; the reply is delivered through the
//! completion channel and the registered continuation runs on the event loop
//! (see `Session`), in delivery order. There is no timeout and no retry.

use std::collections::HashMap;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{Bus, MethodCall, RemoteError, Value};
use crate::console::Console;
use crate::log_trace;

/// Decoded reply body, or the peer's error message.
pub type CallOutcome = Result<Vec<Value>, RemoteError>;

/// Continuation for an asynchronous call: `(outcome, context, console)`.
pub type Continuation = Box<dyn FnOnce(CallOutcome, &str, &mut Console)>;

/// In-flight asynchronous call. Released right after its continuation runs.
struct PendingCall {
    context: String,
    continuation: Continuation,
}

/// Completion token handed from the transport task back to the loop.
#[derive(Debug)]
pub struct Completion {
    id: u64,
    outcome: CallOutcome,
}

pub struct RpcGateway<B: Bus> {
    bus: B,
    next_id: u64,
    pending: HashMap<u64, PendingCall>,
    done_tx: UnboundedSender<Completion>,
    done_rx: UnboundedReceiver<Completion>,
}

impl<B: Bus> RpcGateway<B> {
    pub fn new(bus: B) -> Self {
        let (done_tx, done_rx) = unbounded_channel();
        Self {
            bus,
            next_id: 0,
            pending: HashMap::new(),
            done_tx,
            done_rx,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Blocking call: waits for exactly one reply or error.
    pub async fn call_sync(&self, call: MethodCall) -> CallOutcome {
        log_trace!("call {call}");
        self.bus.call(call).await
    }

    /// Fire the call and register `continuation` with its `context`.
    pub fn call_async(
        &mut self,
        call: MethodCall,
        context: impl Into<String>,
        continuation: Continuation,
    ) {
        let id = self.next_id;
        self.next_id += 1;
        log_trace!("async call #{id} {call}");

        self.pending.insert(
            id,
            PendingCall {
                context: context.into(),
                continuation,
            },
        );

        let bus = self.bus.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = bus.call(call).await;
            // Receiver lives as long as the gateway; nothing to do if it is gone.
            let _ = done.send(Completion { id, outcome });
        });
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Wait for the next asynchronous reply.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.done_rx.recv().await
    }

    /// Run and release the continuation belonging to `completion`.
    pub fn complete(&mut self, completion: Completion, console: &mut Console) {
        let Some(pending) = self.pending.remove(&completion.id) else {
            log_trace!("completion #{} has no pending call", completion.id);
            return;
        };
        (pending.continuation)(completion.outcome, &pending.context, console);
    }

    /// Resolve every outstanding call.
    #[cfg(test)]
    pub async fn drain(&mut self, console: &mut Console) {
        while self.has_pending() {
            match self.next_completion().await {
                Some(completion) => self.complete(completion, console),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;

    #[tokio::test]
    async fn sync_call_returns_reply() {
        let bus = MockBus::new();
        bus.reply("GetProperties", vec![Value::dict([("State", Value::str("online"))])]);
        let gw = RpcGateway::new(bus.clone());
        let reply = gw.call_sync(MethodCall::manager("GetProperties")).await.unwrap();
        assert_eq!(reply[0].get("State"), Some(&Value::str("online")));
        assert_eq!(bus.calls().len(), 1);
    }

    #[tokio::test]
    async fn async_continuation_receives_context_once() {
        let bus = MockBus::new();
        bus.fail("Connect", "Already connected");
        let mut gw = RpcGateway::new(bus);
        let (mut console, captured) = Console::capture();

        gw.call_async(
            MethodCall::new("/net/connman/service/a", "net.connman.Service", "Connect"),
            "/net/connman/service/a",
            Box::new(|outcome: CallOutcome, ctx: &str, console: &mut Console| {
                let err = outcome.unwrap_err();
                console.error(format!("{ctx}: {err}"));
            }),
        );
        assert!(gw.has_pending());
        gw.drain(&mut console).await;
        assert!(!gw.has_pending());
        assert_eq!(
            captured.stderr(),
            "/net/connman/service/a: Already connected\n"
        );
    }
}
