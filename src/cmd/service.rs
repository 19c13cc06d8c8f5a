//! Service commands: services, connect, disconnect.

use super::format::{object_entries, render_dict, render_json, render_object_list};
use super::{Arity, CommandError, CommandResult, OptionSpec, Outcome, Resolved, resolve};
use crate::bus::{
    Bus, CallOutcome, MethodCall, SERVICE_INTERFACE, Value, last_segment, service_path,
};
use crate::console::Console;
use crate::session::Session;

pub const SERVICE_OPTIONS: &[OptionSpec] = &[OptionSpec::new(
    "properties",
    Arity::Required,
    'p',
    "[<service>]      (obsolete)",
)];

pub async fn cmd_services<B: Bus>(
    session: &mut Session<B>,
    args: &[String],
    options: &[OptionSpec],
) -> CommandResult {
    let wanted = match resolve(args.get(1).map(String::as_str), options) {
        Resolved::NoOption => None,
        Resolved::Option(_) => Some(args.get(2).ok_or(CommandError::InvalidArgument)?),
        Resolved::Unrecognized if args.len() > 2 => {
            return Err(CommandError::ArgumentListTooLong);
        }
        Resolved::Unrecognized => Some(&args[1]),
    };

    let reply = session
        .gateway
        .call_sync(MethodCall::manager("GetServices"))
        .await?;
    let Some(list) = reply.first() else {
        return Ok(Outcome::Done);
    };

    let Some(name) = wanted else {
        if session.json {
            session.console.line(render_json(&reply));
        } else {
            session.console.write(render_object_list(list, "  "));
        }
        return Ok(Outcome::Done);
    };

    let (path, props) = object_entries(list)
        .into_iter()
        .find(|(path, _)| last_segment(path) == name.as_str())
        .ok_or_else(|| CommandError::NotFound {
            kind: "Service",
            name: name.clone(),
        })?;

    if session.json {
        session
            .console
            .line(render_json(&[Value::Dict(props.to_vec())]));
    } else {
        session.console.line(path);
        session.console.write(render_dict(props, "  ", " = ", "\n"));
        session.console.line("");
    }
    Ok(Outcome::Done)
}

pub fn cmd_connect<B: Bus>(
    session: &mut Session<B>,
    args: &[String],
    _options: &[OptionSpec],
) -> CommandResult {
    transition(session, &args[1], "Connect", "Connected")
}

pub fn cmd_disconnect<B: Bus>(
    session: &mut Session<B>,
    args: &[String],
    _options: &[OptionSpec],
) -> CommandResult {
    transition(session, &args[1], "Disconnect", "Disconnected")
}

/// Fire `method` on the service and report from the continuation.
fn transition<B: Bus>(
    session: &mut Session<B>,
    name: &str,
    method: &str,
    done: &'static str,
) -> CommandResult {
    let path = service_path(name)?;
    let call = MethodCall::new(path.as_str(), SERVICE_INTERFACE, method);
    session.gateway.call_async(
        call,
        path,
        Box::new(move |outcome: CallOutcome, path: &str, console: &mut Console| {
            match outcome {
                Ok(_) => console.line(format!("{done} {}", last_segment(path))),
                Err(err) => console.error(format!("Error {path}: {err}")),
            }
        }),
    );
    Ok(Outcome::InProgress)
}

#[cfg(test)]
mod tests {
    use crate::bus::mock::MockBus;
    use crate::bus::{SERVICE_INTERFACE, Value};
    use crate::cmd::tests::{session, toks};
    use crate::cmd::{CommandError, Outcome, dispatch};

    #[tokio::test]
    async fn four_tokens_is_too_long_without_calls() {
        let (mut s, bus, out) = session();
        let result = dispatch(&mut s, &toks("services a b c")).await;
        assert_eq!(result, Err(CommandError::ArgumentListTooLong));
        assert!(bus.calls().is_empty());
        assert_eq!(out.stderr(), "Error 'services': Argument list too long\n");
    }

    #[tokio::test]
    async fn unrecognized_first_token_with_extra_is_too_long() {
        let (mut s, bus, _out) = session();
        let result = dispatch(&mut s, &toks("services wifi_a extra")).await;
        assert_eq!(result, Err(CommandError::ArgumentListTooLong));
        assert!(bus.calls().is_empty());
    }

    #[tokio::test]
    async fn properties_option_needs_a_service() {
        let (mut s, bus, _out) = session();
        let result = dispatch(&mut s, &toks("services --properties")).await;
        assert_eq!(result, Err(CommandError::InvalidArgument));
        assert!(bus.calls().is_empty());
    }

    #[tokio::test]
    async fn lists_all_services() {
        let (mut s, bus, out) = session();
        bus.reply("GetServices", MockBus::services_reply(&["wifi_a", "eth_b"]));
        assert_eq!(dispatch(&mut s, &toks("services")).await, Ok(Outcome::Done));
        assert_eq!(
            out.stdout(),
            "/net/connman/service/wifi_a\n  Name = wifi_a\n\n\
             /net/connman/service/eth_b\n  Name = eth_b\n\n"
        );
    }

    #[tokio::test]
    async fn one_service_by_name_or_option() {
        let (mut s, bus, out) = session();
        bus.reply("GetServices", MockBus::services_reply(&["wifi_a", "eth_b"]));
        dispatch(&mut s, &toks("services eth_b")).await.unwrap();
        dispatch(&mut s, &toks("services --properties eth_b"))
            .await
            .unwrap();
        let block = "/net/connman/service/eth_b\n  Name = eth_b\n\n";
        assert_eq!(out.stdout(), format!("{block}{block}"));
    }

    #[tokio::test]
    async fn missing_service_is_reported() {
        let (mut s, bus, out) = session();
        bus.reply("GetServices", MockBus::services_reply(&["wifi_a"]));
        let result = dispatch(&mut s, &toks("services nope")).await;
        assert!(matches!(result, Err(CommandError::NotFound { .. })));
        assert_eq!(out.stderr(), "Error 'services': Service 'nope' not found\n");
    }

    #[tokio::test]
    async fn one_service_as_json() {
        let (mut s, bus, out) = session();
        s.json = true;
        bus.reply("GetServices", MockBus::services_reply(&["wifi_a"]));
        dispatch(&mut s, &toks("services wifi_a")).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out.stdout()).unwrap();
        assert_eq!(parsed, serde_json::json!({"Name": "wifi_a"}));
    }

    #[tokio::test]
    async fn connect_reports_trailing_segment() {
        let (mut s, bus, out) = session();
        let result = dispatch(&mut s, &toks("connect wifi_home")).await;
        assert_eq!(result, Ok(Outcome::InProgress));
        s.drain().await;

        let calls = bus.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/net/connman/service/wifi_home");
        assert_eq!(calls[0].interface, SERVICE_INTERFACE);
        assert_eq!(calls[0].method, "Connect");
        assert_eq!(out.stdout(), "Connected wifi_home\n");
    }

    #[tokio::test]
    async fn connect_error_prints_path_and_message() {
        let (mut s, bus, out) = session();
        bus.fail("Connect", "Already connected");
        dispatch(&mut s, &toks("connect wifi_home")).await.unwrap();
        s.drain().await;
        assert_eq!(out.stdout(), "");
        assert_eq!(
            out.stderr(),
            "Error /net/connman/service/wifi_home: Already connected\n"
        );
    }

    #[tokio::test]
    async fn disconnect_success() {
        let (mut s, bus, out) = session();
        dispatch(&mut s, &toks("disconnect eth0")).await.unwrap();
        s.drain().await;
        assert_eq!(bus.calls_to("Disconnect").len(), 1);
        assert_eq!(out.stdout(), "Disconnected eth0\n");
    }

    #[tokio::test]
    async fn invalid_service_name_builds_no_call() {
        let (mut s, bus, out) = session();
        let result = dispatch(&mut s, &toks("connect wifi-home")).await;
        assert!(matches!(result, Err(CommandError::CallSetup(_))));
        assert!(bus.calls().is_empty());
        assert!(!s.gateway.has_pending());
        assert!(out.stderr().starts_with("Error 'connect': Cannot build call"));
    }

    #[test]
    fn services_reply_shape() {
        let reply = MockBus::services_reply(&["x"]);
        assert!(matches!(reply[0], Value::Array(_)));
    }
}
