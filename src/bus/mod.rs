//! IPC bus capability consumed by the interpreter.
//!
//! Bus -> call / add_match / remove_match / add_filter / remove_filter
//! MethodCall, Signal, RemoteError, object path helpers.
//! The real transport lives in `dbus`; tests use `mock`.

use std::fmt;
use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

pub mod dbus;
pub mod gateway;
pub mod value;

#[cfg(test)]
pub mod mock;

pub use gateway::{CallOutcome, RpcGateway};
pub use value::Value;

pub const DEFAULT_DESTINATION: &str = "net.connman";
pub const NAMESPACE_PREFIX: &str = "net.connman.";
pub const MANAGER_PATH: &str = "/";
pub const MANAGER_INTERFACE: &str = "net.connman.Manager";
pub const TECHNOLOGY_INTERFACE: &str = "net.connman.Technology";
pub const SERVICE_INTERFACE: &str = "net.connman.Service";

const TECHNOLOGY_PREFIX: &str = "/net/connman/technology/";
const SERVICE_PREFIX: &str = "/net/connman/service/";

/// Error reported by the peer (or by the transport on its behalf).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Invalid object path element (the call object cannot be built).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid object path element")]
pub struct InvalidPath(pub String);

/// A remote method invocation request.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub path: String,
    pub interface: String,
    pub method: String,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(path: impl Into<String>, interface: &str, method: &str) -> Self {
        Self {
            path: path.into(),
            interface: interface.to_string(),
            method: method.to_string(),
            args: Vec::new(),
        }
    }

    /// Manager-level call on `/`.
    pub fn manager(method: &str) -> Self {
        Self::new(MANAGER_PATH, MANAGER_INTERFACE, method)
    }

    /// `SetProperty(name, variant value)` on `interface` at `path`.
    pub fn set_property(path: impl Into<String>, interface: &str, name: &str, value: Value) -> Self {
        let mut call = Self::new(path, interface, "SetProperty");
        call.args = vec![Value::str(name), value];
        call
    }

    /// The property name if this is a `SetProperty` call.
    pub fn property_name(&self) -> Option<&str> {
        if self.method != "SetProperty" {
            return None;
        }
        self.args.first().and_then(Value::as_str)
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.path, self.interface, self.method)?;
        if let Some(name) = self.property_name() {
            write!(f, "({name})")?;
        }
        Ok(())
    }
}

/// An incoming broadcast notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub path: String,
    pub interface: String,
    pub member: String,
    pub args: Vec<Value>,
}

/// Transport capability. Implementations must be cheap to clone; futures are
/// spawned onto the runtime for asynchronous calls.
pub trait Bus: Clone + Send + Sync + 'static {
    /// Invoke a method and wait for its reply body.
    fn call(
        &self,
        call: MethodCall,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send;

    /// Ask the bus daemon to route signals matching `rule` to us.
    fn add_match(&self, rule: String) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn remove_match(&self, rule: String)
    -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Start forwarding every incoming signal into `sink`.
    fn add_filter(&self, sink: UnboundedSender<Signal>);

    /// Stop forwarding signals.
    fn remove_filter(&self);
}

/// Signal match rule for one management interface (e.g. `Service`).
pub fn match_rule(interface: &str) -> String {
    format!("type='signal',interface='{NAMESPACE_PREFIX}{interface}'")
}

/// Last `/`-separated segment of an object path.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn technology_path(name: &str) -> Result<String, InvalidPath> {
    object_path(TECHNOLOGY_PREFIX, name)
}

pub fn service_path(name: &str) -> Result<String, InvalidPath> {
    object_path(SERVICE_PREFIX, name)
}

fn object_path(prefix: &str, name: &str) -> Result<String, InvalidPath> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(InvalidPath(name.to_string()));
    }
    Ok(format!("{prefix}{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_derived_from_names() {
        assert_eq!(
            service_path("wifi_home").unwrap(),
            "/net/connman/service/wifi_home"
        );
        assert_eq!(
            technology_path("wifi").unwrap(),
            "/net/connman/technology/wifi"
        );
    }

    #[test]
    fn invalid_path_elements_rejected() {
        assert!(service_path("").is_err());
        assert!(service_path("wifi-home").is_err());
        assert!(technology_path("a/b").is_err());
    }

    #[test]
    fn last_segment_of_paths() {
        assert_eq!(last_segment("/net/connman/service/eth0"), "eth0");
        assert_eq!(last_segment("/"), "");
        assert_eq!(last_segment("plain"), "plain");
    }

    #[test]
    fn match_rule_format() {
        assert_eq!(
            match_rule("Service"),
            "type='signal',interface='net.connman.Service'"
        );
    }

    #[test]
    fn set_property_call_shape() {
        let call = MethodCall::set_property(
            "/net/connman/service/x",
            SERVICE_INTERFACE,
            "AutoConnect",
            Value::Bool(true),
        );
        assert_eq!(call.property_name(), Some("AutoConnect"));
        assert_eq!(call.args[1], Value::Bool(true));
        assert_eq!(MethodCall::manager("GetProperties").property_name(), None);
    }
}
