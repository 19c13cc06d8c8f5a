//! Manager and technology commands: state, technologies, enable, disable, scan.

use super::format::{render_dict, render_json, render_object_list};
use super::{CommandError, CommandResult, OptionSpec, Outcome, find_object};
use crate::bus::{
    Bus, CallOutcome, MANAGER_INTERFACE, MANAGER_PATH, MethodCall, TECHNOLOGY_INTERFACE, Value,
    last_segment, technology_path,
};
use crate::console::Console;
use crate::session::Session;

/// Accepted spellings for the global offline switch.
const OFFLINE_WORDS: [&str; 2] = ["offlinemode", "offline"];

pub async fn cmd_state<B: Bus>(
    session: &mut Session<B>,
    _args: &[String],
    _options: &[OptionSpec],
) -> CommandResult {
    let reply = session
        .gateway
        .call_sync(MethodCall::manager("GetProperties"))
        .await?;

    if session.json {
        session.console.line(render_json(&reply));
        return Ok(Outcome::Done);
    }

    let entries = reply.first().and_then(Value::as_dict).unwrap_or_default();
    session.console.write(render_dict(entries, "  ", " = ", "\n"));
    session.console.line("");
    Ok(Outcome::Done)
}

pub async fn cmd_technologies<B: Bus>(
    session: &mut Session<B>,
    _args: &[String],
    _options: &[OptionSpec],
) -> CommandResult {
    let reply = session
        .gateway
        .call_sync(MethodCall::manager("GetTechnologies"))
        .await?;

    if session.json {
        session.console.line(render_json(&reply));
    } else if let Some(list) = reply.first() {
        session.console.write(render_object_list(list, "  "));
    }
    Ok(Outcome::Done)
}

pub async fn cmd_enable<B: Bus>(
    session: &mut Session<B>,
    args: &[String],
    _options: &[OptionSpec],
) -> CommandResult {
    switch(session, &args[1], true).await
}

pub async fn cmd_disable<B: Bus>(
    session: &mut Session<B>,
    args: &[String],
    _options: &[OptionSpec],
) -> CommandResult {
    switch(session, &args[1], false).await
}

/// Offline mode on the manager, or `Powered` on one technology.
async fn switch<B: Bus>(session: &mut Session<B>, target: &str, on: bool) -> CommandResult {
    let state = if on { "enabled" } else { "disabled" };

    if OFFLINE_WORDS.contains(&target) {
        let call = MethodCall::set_property(
            MANAGER_PATH,
            MANAGER_INTERFACE,
            "OfflineMode",
            Value::Bool(on),
        );
        session.gateway.call_sync(call).await?;
        session.console.line(format!("OfflineMode {state}"));
        return Ok(Outcome::Done);
    }

    let reply = session
        .gateway
        .call_sync(MethodCall::manager("GetTechnologies"))
        .await?;
    let path = find_object(reply.first(), target).ok_or_else(|| CommandError::NotFound {
        kind: "Technology",
        name: target.to_string(),
    })?;

    let call = MethodCall::set_property(path, TECHNOLOGY_INTERFACE, "Powered", Value::Bool(on));
    session.gateway.call_sync(call).await?;
    let verb = if on { "Enabled" } else { "Disabled" };
    session.console.line(format!("{verb} {target}"));
    Ok(Outcome::Done)
}

pub fn cmd_scan<B: Bus>(
    session: &mut Session<B>,
    args: &[String],
    _options: &[OptionSpec],
) -> CommandResult {
    let path = technology_path(&args[1])?;
    let call = MethodCall::new(path.as_str(), TECHNOLOGY_INTERFACE, "Scan");
    session.gateway.call_async(
        call,
        path,
        Box::new(|outcome: CallOutcome, path: &str, console: &mut Console| {
            match outcome {
                Ok(_) => console.line(format!("Scan completed for {}", last_segment(path))),
                Err(err) => console.error(format!("Error {path}: {err}")),
            }
        }),
    );
    Ok(Outcome::InProgress)
}
