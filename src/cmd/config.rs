/*!
ConfigEditor: `config <service> <directive> [values...] [<directive> ...]`.

Each directive is handled in two steps:
  1. parse_directive(code, cursor) looks only at the tokens and returns how
     many it consumed plus the change it wants (or an argument error);
  2. apply(change) resolves the service through GetServices and issues one
     SetProperty / Remove call.

A directive always consumes its whole value group, even on failure, so its
values are never re-read as directives. A group ends at the next token that
names a directive. Failures are reported per directive and never stop the
ones that follow; the command itself always succeeds.
*/

use super::args::{Arity, OptionSpec, Resolved, TokenCursor, parse_boolean, resolve};
use super::{CommandError, CommandResult, Outcome, find_object, report};
use crate::bus::{Bus, MethodCall, SERVICE_INTERFACE, Value};
use crate::log_trace;
use crate::session::Session;

pub const CONFIG_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("nameservers", Arity::Required, 'n', "<dns1> [<dns2>] [<dns3>]"),
    OptionSpec::new("timeservers", Arity::Required, 't', "<ntp1> [<ntp2>] [...]"),
    OptionSpec::new("domains", Arity::Required, 'd', "<domain1> [<domain2>] [...]"),
    OptionSpec::new(
        "ipv6",
        Arity::Required,
        'v',
        "off|auto|manual <address> <prefixlength> <gateway> <privacy>",
    ),
    OptionSpec::new(
        "proxy",
        Arity::Required,
        'x',
        "direct|auto <URL>|manual <URL1> [<URL2>] [...]\n                   [exclude <exclude1> [<exclude2>] [...]]",
    ),
    OptionSpec::new("autoconnect", Arity::Required, 'a', "yes|no"),
    OptionSpec::new(
        "ipv4",
        Arity::Required,
        'i',
        "off|dhcp|manual <address> <prefixlength> <gateway>",
    ),
    OptionSpec::new("remove", Arity::None, 'r', "                 Remove service"),
];

const IPV4_FIELDS: &[&str] = &["Method", "Address", "Netmask", "Gateway"];
const IPV6_FIELDS: &[&str] = &["Method", "Address", "PrefixLength", "Gateway", "Privacy"];
const PROXY_SIMPLE_FIELDS: &[&str] = &["Method", "URL"];

/// What a directive asks the service to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Set { property: &'static str, value: Value },
    Remove,
}

/// Result of parsing one directive: tokens consumed after the directive
/// token itself, and the change (or why there is none).
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub consumed: usize,
    pub change: Result<Change, CommandError>,
}

impl Directive {
    fn set(consumed: usize, property: &'static str, value: Value) -> Self {
        Self {
            consumed,
            change: Ok(Change::Set { property, value }),
        }
    }

    fn invalid(consumed: usize) -> Self {
        Self {
            consumed,
            change: Err(CommandError::InvalidArgument),
        }
    }
}

pub async fn cmd_config<B: Bus>(
    session: &mut Session<B>,
    args: &[String],
    options: &[OptionSpec],
) -> CommandResult {
    let service = &args[1];
    let mut cursor = TokenCursor::new(args, 2);

    while let Some(token) = cursor.peek() {
        let code = resolve(Some(token), options);
        let values = cursor.advanced(1);
        let directive = parse_directive(code, values, options);
        log_trace!(
            "config {service}: '{token}' at {} consumes {}",
            cursor.position(),
            directive.consumed
        );

        let result = match directive.change {
            Ok(change) => apply(session, service, change).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            report(session, token, &err);
        }
        cursor = values.advanced(directive.consumed);
    }

    Ok(Outcome::Done)
}

/// Parse the values of one directive. `cursor` sits on the first value.
pub fn parse_directive(code: Resolved, cursor: TokenCursor<'_>, table: &[OptionSpec]) -> Directive {
    let Resolved::Option(code) = code else {
        return Directive::invalid(0);
    };
    let arity = table
        .iter()
        .find(|opt| opt.code == code)
        .map_or(Arity::None, |opt| opt.arity);
    if arity == Arity::Required && cursor.group(table, 1).is_empty() {
        return Directive::invalid(0);
    }

    match code {
        'a' => {
            let group = cursor.group(table, 1);
            match parse_boolean(&group[0]) {
                Some(on) => Directive::set(1, "AutoConnect", Value::Bool(on)),
                None => Directive::invalid(1),
            }
        }
        'i' => {
            let group = cursor.group(table, IPV4_FIELDS.len());
            let value = schema(IPV4_FIELDS, group, |_, token| Some(Value::str(token)));
            fixed(group.len(), "IPv4.Configuration", value)
        }
        'v' => {
            let group = cursor.group(table, IPV6_FIELDS.len());
            let value = schema(IPV6_FIELDS, group, |field, token| match field {
                "PrefixLength" => token.parse::<u8>().ok().map(Value::Byte),
                _ => Some(Value::str(token)),
            });
            fixed(group.len(), "IPv6.Configuration", value)
        }
        'n' => list(cursor, table, "Nameservers.Configuration"),
        't' => list(cursor, table, "Timeservers.Configuration"),
        'd' => list(cursor, table, "Domains.Configuration"),
        'x' => proxy(cursor, table),
        'r' => Directive {
            consumed: 0,
            change: Ok(Change::Remove),
        },
        _ => Directive::invalid(0),
    }
}

/// Map positional tokens onto field names; `None` if a token does not convert.
fn schema(
    fields: &[&str],
    tokens: &[String],
    convert: impl Fn(&str, &str) -> Option<Value>,
) -> Option<Value> {
    let entries = fields
        .iter()
        .zip(tokens)
        .map(|(field, token)| convert(field, token.as_str()).map(|v| (*field, v)))
        .collect::<Option<Vec<_>>>()?;
    Some(Value::dict(entries))
}

fn fixed(consumed: usize, property: &'static str, value: Option<Value>) -> Directive {
    match value {
        Some(value) => Directive::set(consumed, property, value),
        None => Directive::invalid(consumed),
    }
}

fn list(cursor: TokenCursor<'_>, table: &[OptionSpec], property: &'static str) -> Directive {
    let group = cursor.group(table, usize::MAX);
    Directive::set(group.len(), property, Value::str_array(group))
}

/// `direct|auto [<URL>]` or
/// `manual [servers] <URL>... [exclude <host>...]`.
fn proxy(cursor: TokenCursor<'_>, table: &[OptionSpec]) -> Directive {
    let group = cursor.group(table, usize::MAX);
    match group[0].as_str() {
        "direct" | "auto" => {
            let group = cursor.group(table, PROXY_SIMPLE_FIELDS.len());
            let value = schema(PROXY_SIMPLE_FIELDS, group, |_, token| Some(Value::str(token)));
            fixed(group.len(), "Proxy.Configuration", value)
        }
        "manual" => {
            let mut rest = &group[1..];
            if rest.first().map(String::as_str) == Some("servers") {
                rest = &rest[1..];
            }
            let (servers, excludes) = match rest.iter().position(|t| t == "exclude") {
                Some(at) => (&rest[..at], Some(&rest[at + 1..])),
                None => (rest, None),
            };
            if servers.is_empty() || excludes.is_some_and(<[String]>::is_empty) {
                return Directive::invalid(group.len());
            }

            let mut entries = vec![
                ("Method", Value::str("manual")),
                ("Servers", Value::str_array(servers)),
            ];
            if let Some(excludes) = excludes {
                entries.push(("Excludes", Value::str_array(excludes)));
            }
            Directive::set(group.len(), "Proxy.Configuration", Value::dict(entries))
        }
        _ => Directive::invalid(1),
    }
}

/// Resolve the service and push one change to it.
async fn apply<B: Bus>(
    session: &Session<B>,
    service: &str,
    change: Change,
) -> Result<(), CommandError> {
    let reply = session
        .gateway
        .call_sync(MethodCall::manager("GetServices"))
        .await?;
    let path = find_object(reply.first(), service).ok_or_else(|| CommandError::NotFound {
        kind: "Service",
        name: service.to_string(),
    })?;

    let call = match change {
        Change::Set { property, value } => {
            MethodCall::set_property(path, SERVICE_INTERFACE, property, value)
        }
        Change::Remove => MethodCall::new(path, SERVICE_INTERFACE, "Remove"),
    };
    session.gateway.call_sync(call).await?;
    Ok(())
}
