//! zbus-backed implementation of the `Bus` capability.
//!
//! connect(system|session, destination) -> DbusBus
//! Arguments are limited to the shapes the interpreter issues: no arguments,
//! or `(s name, v value)` for `SetProperty`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use zbus::zvariant;

use super::{Bus, MethodCall, RemoteError, Signal, Value};
use crate::{log_debug, log_error, log_trace};

/// Which message bus to attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BusKind {
    System,
    Session,
}

#[derive(Clone)]
pub struct DbusBus {
    conn: zbus::Connection,
    destination: String,
    filter: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DbusBus {
    pub async fn connect(kind: BusKind, destination: &str) -> Result<Self> {
        let conn = match kind {
            BusKind::System => zbus::Connection::system().await,
            BusKind::Session => zbus::Connection::session().await,
        }
        .with_context(|| format!("Failed to connect to the {kind:?} bus"))?;
        log_debug!("connected to {kind:?} bus, destination={destination}");
        Ok(Self {
            conn,
            destination: destination.to_string(),
            filter: Arc::new(Mutex::new(None)),
        })
    }
}

impl From<zbus::Error> for RemoteError {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, detail, _) => {
                RemoteError::new(detail.unwrap_or_else(|| name.to_string()))
            }
            other => RemoteError::new(other.to_string()),
        }
    }
}

impl From<zbus::fdo::Error> for RemoteError {
    fn from(err: zbus::fdo::Error) -> Self {
        RemoteError::new(err.to_string())
    }
}

impl Bus for DbusBus {
    fn call(
        &self,
        call: MethodCall,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send {
        let conn = self.conn.clone();
        let destination = self.destination.clone();
        async move {
            let dest = Some(destination.as_str());
            let path = call.path.as_str();
            let iface = Some(call.interface.as_str());
            let method = call.method.as_str();
            let reply = match call.args.as_slice() {
                [] => conn.call_method(dest, path, iface, method, &()).await?,
                [Value::Str(name), value] => {
                    let body = (name.as_str(), to_variant(value)?);
                    conn.call_method(dest, path, iface, method, &body).await?
                }
                _ => return Err(RemoteError::new("unsupported argument list")),
            };
            Ok(decode_body(&reply))
        }
    }

    fn add_match(&self, rule: String) -> impl Future<Output = Result<(), RemoteError>> + Send {
        let conn = self.conn.clone();
        async move {
            let parsed = zbus::MatchRule::try_from(rule.as_str())?;
            let proxy = zbus::fdo::DBusProxy::new(&conn).await?;
            proxy.add_match_rule(parsed).await?;
            log_debug!("added match {rule}");
            Ok(())
        }
    }

    fn remove_match(
        &self,
        rule: String,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        let conn = self.conn.clone();
        async move {
            let parsed = zbus::MatchRule::try_from(rule.as_str())?;
            let proxy = zbus::fdo::DBusProxy::new(&conn).await?;
            proxy.remove_match_rule(parsed).await?;
            log_debug!("removed match {rule}");
            Ok(())
        }
    }

    fn add_filter(&self, sink: UnboundedSender<Signal>) {
        let mut stream = zbus::MessageStream::from(&self.conn);
        let task = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        log_error!("signal stream: {e}");
                        continue;
                    }
                };
                let Some(signal) = decode_signal(&msg) else {
                    continue;
                };
                if sink.send(signal).is_err() {
                    break;
                }
            }
        });
        if let Ok(mut slot) = self.filter.lock()
            && let Some(previous) = slot.replace(task)
        {
            previous.abort();
        }
    }

    fn remove_filter(&self) {
        if let Ok(mut slot) = self.filter.lock()
            && let Some(task) = slot.take()
        {
            task.abort();
        }
    }
}

/* ---- Value conversion ---- */

fn to_variant(value: &Value) -> Result<zvariant::Value<'static>, RemoteError> {
    let converted = match value {
        Value::Bool(b) => zvariant::Value::Bool(*b),
        Value::Byte(n) => zvariant::Value::U8(*n),
        Value::Int(n) => zvariant::Value::I64(*n),
        Value::UInt(n) => zvariant::Value::U64(*n),
        Value::Double(n) => zvariant::Value::F64(*n),
        Value::Str(s) => zvariant::Value::from(s.clone()),
        Value::Path(p) => zvariant::ObjectPath::try_from(p.clone())
            .map_err(|e| RemoteError::new(e.to_string()))?
            .into(),
        Value::Array(items) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|v| match v {
                    Value::Str(s) => Some(s.clone()),
                    _ => None,
                })
                .collect();
            match strings {
                // `as`, including the empty list
                Some(list) => zvariant::Value::from(list),
                None => {
                    let variants = items
                        .iter()
                        .map(to_variant)
                        .collect::<Result<Vec<_>, _>>()?;
                    zvariant::Value::from(variants)
                }
            }
        }
        Value::Dict(entries) => {
            let mut map: HashMap<String, zvariant::Value<'static>> = HashMap::new();
            for (k, v) in entries {
                map.insert(k.clone(), to_variant(v)?);
            }
            zvariant::Value::from(map)
        }
        Value::Struct(_) => return Err(RemoteError::new("structures cannot be sent")),
    };
    Ok(converted)
}

fn from_variant(value: &zvariant::Value<'_>) -> Value {
    match value {
        zvariant::Value::U8(n) => Value::Byte(*n),
        zvariant::Value::Bool(b) => Value::Bool(*b),
        zvariant::Value::I16(n) => Value::Int(i64::from(*n)),
        zvariant::Value::U16(n) => Value::UInt(u64::from(*n)),
        zvariant::Value::I32(n) => Value::Int(i64::from(*n)),
        zvariant::Value::U32(n) => Value::UInt(u64::from(*n)),
        zvariant::Value::I64(n) => Value::Int(*n),
        zvariant::Value::U64(n) => Value::UInt(*n),
        zvariant::Value::F64(n) => Value::Double(*n),
        zvariant::Value::Str(s) => Value::Str(s.to_string()),
        zvariant::Value::Signature(s) => Value::Str(s.to_string()),
        zvariant::Value::ObjectPath(p) => Value::path(p.to_string()),
        zvariant::Value::Value(inner) => from_variant(inner),
        zvariant::Value::Array(array) => Value::Array(array.iter().map(from_variant).collect()),
        zvariant::Value::Dict(dict) => Value::Dict(
            dict.iter()
                .map(|(k, v)| (from_variant(k).to_string(), from_variant(v)))
                .collect(),
        ),
        zvariant::Value::Structure(s) => {
            Value::Struct(s.fields().iter().map(from_variant).collect())
        }
        _ => Value::Str(String::from("<unsupported>")),
    }
}

/// Decode a whole message body into its top-level arguments.
fn decode_body(msg: &zbus::Message) -> Vec<Value> {
    let body = msg.body();
    match body.deserialize::<zvariant::Structure<'_>>() {
        Ok(structure) => structure.fields().iter().map(from_variant).collect(),
        Err(e) => {
            // Empty bodies land here too.
            log_trace!("body not decoded: {e}");
            Vec::new()
        }
    }
}

fn decode_signal(msg: &zbus::Message) -> Option<Signal> {
    if msg.message_type() != zbus::message::Type::Signal {
        return None;
    }
    let header = msg.header();
    let signal = Signal {
        path: header.path()?.to_string(),
        interface: header.interface()?.to_string(),
        member: header.member()?.to_string(),
        args: decode_body(msg),
    };
    log_trace!("signal {}.{} from {}", signal.interface, signal.member, signal.path);
    Some(signal)
}
