//! Recording in-memory bus for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;

use super::{Bus, CallOutcome, MethodCall, RemoteError, Signal, Value};

#[derive(Default)]
struct MockState {
    calls: Vec<MethodCall>,
    replies: HashMap<String, CallOutcome>,
    matches_added: Vec<String>,
    matches_removed: Vec<String>,
    match_error: Option<String>,
    filters_added: usize,
    filters_removed: usize,
    sink: Option<UnboundedSender<Signal>>,
}

#[derive(Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned reply for every call of `method`.
    pub fn reply(&self, method: &str, body: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .replies
            .insert(method.to_string(), Ok(body));
    }

    /// Canned error for every call of `method`.
    pub fn fail(&self, method: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .replies
            .insert(method.to_string(), Err(RemoteError::new(message)));
    }

    pub fn fail_matches(&self, message: &str) {
        self.state.lock().unwrap().match_error = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<MethodCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    pub fn matches_added(&self) -> Vec<String> {
        self.state.lock().unwrap().matches_added.clone()
    }

    pub fn matches_removed(&self) -> Vec<String> {
        self.state.lock().unwrap().matches_removed.clone()
    }

    /// `(installed, removed)` filter counts.
    pub fn filter_counts(&self) -> (usize, usize) {
        let st = self.state.lock().unwrap();
        (st.filters_added, st.filters_removed)
    }

    /// Deliver a signal through the installed filter; false if none installed.
    pub fn emit(&self, signal: Signal) -> bool {
        let st = self.state.lock().unwrap();
        match &st.sink {
            Some(sink) => sink.send(signal).is_ok(),
            None => false,
        }
    }

    /// Services reply shaped like `GetServices`: `a(oa{sv})`.
    pub fn services_reply(names: &[&str]) -> Vec<Value> {
        let entries = names
            .iter()
            .map(|name| {
                Value::Struct(vec![
                    Value::path(format!("/net/connman/service/{name}")),
                    Value::dict([("Name", Value::str(*name))]),
                ])
            })
            .collect();
        vec![Value::Array(entries)]
    }
}

impl Bus for MockBus {
    fn call(
        &self,
        call: MethodCall,
    ) -> impl std::future::Future<Output = Result<Vec<Value>, RemoteError>> + Send {
        let outcome = {
            let mut st = self.state.lock().unwrap();
            let outcome = st
                .replies
                .get(&call.method)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()));
            st.calls.push(call);
            outcome
        };
        async move { outcome }
    }

    fn add_match(
        &self,
        rule: String,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send {
        let result = {
            let mut st = self.state.lock().unwrap();
            st.matches_added.push(rule);
            match &st.match_error {
                Some(msg) => Err(RemoteError::new(msg.clone())),
                None => Ok(()),
            }
        };
        async move { result }
    }

    fn remove_match(
        &self,
        rule: String,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send {
        self.state.lock().unwrap().matches_removed.push(rule);
        async { Ok(()) }
    }

    fn add_filter(&self, sink: UnboundedSender<Signal>) {
        let mut st = self.state.lock().unwrap();
        st.filters_added += 1;
        st.sink = Some(sink);
    }

    fn remove_filter(&self) {
        let mut st = self.state.lock().unwrap();
        st.filters_removed += 1;
        st.sink = None;
    }
}
