/*!
EventMonitor: `monitor [services|tech|manager] [on|off]`.

Three independent channels, one match rule each. The shared signal filter
is installed when the first channel turns on and removed when the last one
turns off; enabling an enabled channel (or disabling a disabled one) does
nothing at all.

`classify` turns an incoming signal into the text printed for it, or `None`
for signals outside the `net.connman.` namespace. The session prints that
text inside the save/redraw bracket.
*/

use tokio::sync::mpsc::UnboundedSender;

use super::args::{Arity, OptionSpec, Resolved, parse_boolean, resolve};
use super::format::{Role, StyleOptions, color, render_args, render_services_changed};
use super::{CommandError, CommandResult, Outcome};
use crate::bus::{Bus, MANAGER_INTERFACE, NAMESPACE_PREFIX, Signal, last_segment, match_rule};
use crate::console::Console;
use crate::session::Session;
use crate::{log_debug, log_info};

pub const MONITOR_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new(
        "services",
        Arity::None,
        's',
        "[off]            Monitor only services",
    ),
    OptionSpec::new(
        "tech",
        Arity::None,
        'c',
        "[off]            Monitor only technologies",
    ),
    OptionSpec::new(
        "manager",
        Arity::None,
        'm',
        "[off]            Monitor only manager interface",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Service,
    Technology,
    Manager,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Service, Channel::Technology, Channel::Manager];

    /// Interface name below the `net.connman.` namespace.
    pub fn interface(self) -> &'static str {
        match self {
            Channel::Service => "Service",
            Channel::Technology => "Technology",
            Channel::Manager => "Manager",
        }
    }

    fn from_code(code: char) -> Option<Self> {
        match code {
            's' => Some(Channel::Service),
            'c' => Some(Channel::Technology),
            'm' => Some(Channel::Manager),
            _ => None,
        }
    }
}

/// Which channels are on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionState {
    pub service: bool,
    pub technology: bool,
    pub manager: bool,
}

impl SubscriptionState {
    pub fn get(&self, channel: Channel) -> bool {
        match channel {
            Channel::Service => self.service,
            Channel::Technology => self.technology,
            Channel::Manager => self.manager,
        }
    }

    fn set(&mut self, channel: Channel, on: bool) {
        match channel {
            Channel::Service => self.service = on,
            Channel::Technology => self.technology = on,
            Channel::Manager => self.manager = on,
        }
    }

    pub fn any(&self) -> bool {
        self.service || self.technology || self.manager
    }
}

pub struct EventMonitor {
    state: SubscriptionState,
    sink: UnboundedSender<Signal>,
}

impl EventMonitor {
    /// Signals accepted by the filter are forwarded into `sink`.
    pub fn new(sink: UnboundedSender<Signal>) -> Self {
        Self {
            state: SubscriptionState::default(),
            sink,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.any()
    }

    pub async fn enable<B: Bus>(&mut self, bus: &B, channel: Channel, console: &mut Console) {
        if self.state.get(channel) {
            return;
        }
        if !self.state.any() {
            log_debug!("installing signal filter");
            bus.add_filter(self.sink.clone());
        }
        // Flagged on even if the rule is refused, so `off` stays symmetric.
        self.state.set(channel, true);

        if let Err(err) = bus.add_match(match_rule(channel.interface())).await {
            console.error(format!("Error: {err}"));
        }
        log_info!("monitoring {}", channel.interface());
    }

    pub async fn disable<B: Bus>(&mut self, bus: &B, channel: Channel) {
        if !self.state.get(channel) {
            return;
        }
        self.state.set(channel, false);

        if let Err(err) = bus.remove_match(match_rule(channel.interface())).await {
            log_debug!("remove_match {}: {err}", channel.interface());
        }
        if !self.state.any() {
            log_debug!("removing signal filter");
            bus.remove_filter();
        }
        log_info!("stopped monitoring {}", channel.interface());
    }
}

pub async fn cmd_monitor<B: Bus>(
    session: &mut Session<B>,
    args: &[String],
    options: &[OptionSpec],
) -> CommandResult {
    let add = match args.get(2) {
        Some(token) => parse_boolean(token).ok_or(CommandError::InvalidArgument)?,
        None => true,
    };

    let (channels, on) = match resolve(args.get(1).map(String::as_str), options) {
        Resolved::NoOption => (Channel::ALL.to_vec(), add),
        Resolved::Option(code) => {
            let channel = Channel::from_code(code).ok_or(CommandError::InvalidArgument)?;
            (vec![channel], add)
        }
        Resolved::Unrecognized => {
            let on = parse_boolean(&args[1]).ok_or(CommandError::InvalidArgument)?;
            (Channel::ALL.to_vec(), on)
        }
    };

    let bus = session.gateway.bus();
    for channel in channels {
        if on {
            session
                .monitor
                .enable(bus, channel, &mut session.console)
                .await;
        } else {
            session.monitor.disable(bus, channel).await;
        }
    }
    log_debug!("monitor state {:?}", session.monitor.state());

    Ok(if on { Outcome::InProgress } else { Outcome::Done })
}

/// Render one notification, or `None` if it is not ours.
pub fn classify(signal: &Signal, style: &StyleOptions) -> Option<String> {
    let short = signal.interface.strip_prefix(NAMESPACE_PREFIX)?;
    let interface = short.rsplit('.').next().unwrap_or(short);
    let from_manager = signal.interface == MANAGER_INTERFACE;

    if from_manager && signal.member == "ServicesChanged" {
        let label = color(
            Role::Primary,
            format!("{interface:<12} {:<20}", "ServicesChanged"),
            style,
        );
        return Some(format!(
            "{label} = {{\n{}\n}}\n",
            render_services_changed(&signal.args)
        ));
    }

    let label = match signal.member.as_str() {
        member @ ("TechnologyAdded" | "TechnologyRemoved") if from_manager => member,
        _ => last_segment(&signal.path),
    };
    let label = color(Role::Primary, format!("{interface:<12} {label:<20}"), style);
    Some(format!(
        "{label} {}\n",
        render_args(&signal.args, "", " = ", " = ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Value;
    use crate::bus::mock::MockBus;
    use crate::cmd::dispatch;
    use crate::cmd::tests::{session, toks};

    fn signal(interface: &str, path: &str, member: &str, args: Vec<Value>) -> Signal {
        Signal {
            path: path.to_string(),
            interface: interface.to_string(),
            member: member.to_string(),
            args,
        }
    }

    #[tokio::test]
    async fn channel_on_then_off_restores_state_and_filter() {
        let (mut s, bus, _out) = session();
        assert_eq!(
            dispatch(&mut s, &toks("monitor tech")).await,
            Ok(Outcome::InProgress)
        );
        assert!(s.monitor.state().technology);
        assert_eq!(bus.filter_counts(), (1, 0));

        assert_eq!(
            dispatch(&mut s, &toks("monitor tech off")).await,
            Ok(Outcome::Done)
        );
        assert_eq!(s.monitor.state(), SubscriptionState::default());
        assert_eq!(bus.filter_counts(), (1, 1));
        assert_eq!(
            bus.matches_removed(),
            vec!["type='signal',interface='net.connman.Technology'".to_string()]
        );
    }

    #[tokio::test]
    async fn filter_stays_while_another_channel_is_on() {
        let (mut s, bus, _out) = session();
        dispatch(&mut s, &toks("monitor services")).await.unwrap();
        dispatch(&mut s, &toks("monitor manager on")).await.unwrap();
        dispatch(&mut s, &toks("monitor manager off")).await.unwrap();
        assert_eq!(bus.filter_counts(), (1, 0));
        assert!(s.monitor.is_active());
        dispatch(&mut s, &toks("monitor --services off")).await.unwrap();
        assert_eq!(bus.filter_counts(), (1, 1));
        assert!(!s.monitor.is_active());
    }

    #[tokio::test]
    async fn disabling_idle_channel_is_a_no_op() {
        let (mut s, bus, out) = session();
        assert_eq!(
            dispatch(&mut s, &toks("monitor services off")).await,
            Ok(Outcome::Done)
        );
        assert_eq!(bus.filter_counts(), (0, 0));
        assert!(bus.matches_removed().is_empty());
        assert_eq!(out.stderr(), "");
    }

    #[tokio::test]
    async fn bulk_enable_and_disable() {
        let (mut s, bus, _out) = session();
        dispatch(&mut s, &toks("monitor")).await.unwrap();
        assert_eq!(bus.matches_added().len(), 3);
        dispatch(&mut s, &toks("monitor on")).await.unwrap();
        assert_eq!(bus.matches_added().len(), 3);
        assert_eq!(bus.filter_counts(), (1, 0));

        assert_eq!(dispatch(&mut s, &toks("monitor off")).await, Ok(Outcome::Done));
        assert_eq!(bus.matches_removed().len(), 3);
        assert_eq!(bus.filter_counts(), (1, 1));
    }

    #[tokio::test]
    async fn malformed_arguments_rejected() {
        let (mut s, bus, _out) = session();
        assert_eq!(
            dispatch(&mut s, &toks("monitor sometimes")).await,
            Err(CommandError::InvalidArgument)
        );
        assert_eq!(
            dispatch(&mut s, &toks("monitor tech maybe")).await,
            Err(CommandError::InvalidArgument)
        );
        assert_eq!(bus.filter_counts(), (0, 0));
    }

    #[tokio::test]
    async fn refused_match_rule_is_reported() {
        let (mut s, bus, out) = session();
        bus.fail_matches("Access denied");
        dispatch(&mut s, &toks("monitor manager")).await.unwrap();
        assert_eq!(out.stderr(), "Error: Access denied\n");
        assert!(s.monitor.state().manager);
    }

    #[test]
    fn foreign_signals_ignored() {
        let sig = signal("org.freedesktop.DBus", "/", "NameOwnerChanged", vec![]);
        assert_eq!(classify(&sig, &StyleOptions::plain()), None);
    }

    #[test]
    fn property_changed_is_labelled_by_path() {
        let sig = signal(
            "net.connman.Service",
            "/net/connman/service/wifi_home",
            "PropertyChanged",
            vec![Value::str("State"), Value::str("ready")],
        );
        assert_eq!(
            classify(&sig, &StyleOptions::plain()).as_deref(),
            Some("Service      wifi_home            State = ready\n")
        );
    }

    #[test]
    fn technology_lifecycle_uses_event_name() {
        let sig = signal(
            "net.connman.Manager",
            "/",
            "TechnologyRemoved",
            vec![Value::path("/net/connman/technology/wifi")],
        );
        assert_eq!(
            classify(&sig, &StyleOptions::plain()).as_deref(),
            Some("Manager      TechnologyRemoved    /net/connman/technology/wifi\n")
        );
    }

    #[test]
    fn services_changed_is_a_block() {
        let mut args = MockBus::services_reply(&["wifi_a"]);
        args.push(Value::Array(vec![Value::path("/net/connman/service/old")]));
        let sig = signal("net.connman.Manager", "/", "ServicesChanged", args);
        assert_eq!(
            classify(&sig, &StyleOptions::plain()).as_deref(),
            Some(
                "Manager      ServicesChanged      = {\n  /net/connman/service/wifi_a\n    Name = wifi_a\n  removed /net/connman/service/old\n}\n"
            )
        );
    }
}
