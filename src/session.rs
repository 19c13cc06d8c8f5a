//! Interpreter context and the event loop.
//!
//! One `Session` per run owns everything the commands share: the gateway
//! (bus connection + pending async calls), the monitor subscriptions, the
//! console and the output style. The loop is a single task multiplexing
//! stdin lines, async call completions and bus signals; whatever arrives
//! first is handled to completion before the next wait.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use crate::bus::gateway::Completion;
use crate::bus::{Bus, RpcGateway, Signal};
use crate::cmd::format::StyleOptions;
use crate::cmd::monitor::{EventMonitor, classify};
use crate::cmd::{CommandResult, Outcome, dispatch};
use crate::console::Console;
use crate::{log_debug, log_info};

pub struct Session<B: Bus> {
    pub(crate) gateway: RpcGateway<B>,
    pub(crate) monitor: EventMonitor,
    pub(crate) console: Console,
    pub(crate) style: StyleOptions,
    /// Print replies as JSON instead of the dictionary layout.
    pub(crate) json: bool,
    signals: UnboundedReceiver<Signal>,
}

enum Event {
    /// Bytes read into the line buffer; 0 at end of input.
    Line(usize),
    Completion(Completion),
    Signal(Signal),
    Interrupt,
}

impl<B: Bus> Session<B> {
    pub fn new(bus: B, console: Console, style: StyleOptions, json: bool) -> Self {
        let (signal_tx, signals) = unbounded_channel();
        Self {
            gateway: RpcGateway::new(bus),
            monitor: EventMonitor::new(signal_tx),
            console,
            style,
            json,
            signals,
        }
    }

    /// Dispatch one tokenized command.
    pub async fn execute(&mut self, tokens: &[String]) -> CommandResult {
        let result = dispatch(self, tokens).await;
        self.console.flush();
        result
    }

    /// Split an input line shell-style and dispatch it. Errors are already
    /// reported on the console, so only the outcome is returned.
    pub async fn execute_line(&mut self, line: &str) -> Outcome {
        let tokens = match shell_words::split(line) {
            Ok(tokens) => tokens,
            Err(err) => {
                self.console.error(format!("Error: {err}"));
                return Outcome::Done;
            }
        };
        self.execute(&tokens).await.unwrap_or(Outcome::Done)
    }

    /// Wait for every outstanding async call and run its continuation.
    #[cfg(test)]
    pub async fn drain(&mut self) {
        self.gateway.drain(&mut self.console).await;
        self.console.flush();
    }

    fn handle_completion(&mut self, completion: Completion) {
        self.console.save_line();
        self.gateway.complete(completion, &mut self.console);
        self.console.redraw_prompt();
    }

    fn handle_signal(&mut self, signal: Signal) {
        let Some(text) = classify(&signal, &self.style) else {
            log_debug!("ignoring signal {}.{}", signal.interface, signal.member);
            return;
        };
        self.console.save_line();
        self.console.write(text);
        self.console.redraw_prompt();
    }

    /// Prompt-driven loop over stdin until EOF, `exit`, `quit` or Ctrl-C.
    pub async fn run_interactive(&mut self) -> Result<()> {
        self.run_lines(BufReader::new(tokio::io::stdin())).await
    }

    async fn run_lines<R: AsyncBufRead + Unpin>(&mut self, mut input: R) -> Result<()> {
        // Partial reads stay in `buf` when another branch wins the select.
        let mut buf = Vec::new();
        self.console.redraw_prompt();

        loop {
            let event = tokio::select! {
                read = input.read_until(b'\n', &mut buf) => {
                    Event::Line(read.context("Failed to read standard input")?)
                }
                Some(done) = self.gateway.next_completion() => Event::Completion(done),
                Some(signal) = self.signals.recv() => Event::Signal(signal),
                _ = tokio::signal::ctrl_c() => Event::Interrupt,
            };

            match event {
                Event::Line(0) if buf.is_empty() => {
                    self.console.line("");
                    break;
                }
                Event::Line(_) => {
                    match String::from_utf8(std::mem::take(&mut buf)) {
                        Ok(line) => {
                            let line = line.trim_end_matches(['\n', '\r']);
                            if self.execute_line(line).await == Outcome::Exit {
                                break;
                            }
                        }
                        Err(err) => self.console.error(format!("Error: {err}")),
                    }
                    self.console.redraw_prompt();
                }
                Event::Completion(done) => self.handle_completion(done),
                Event::Signal(signal) => self.handle_signal(signal),
                Event::Interrupt => {
                    log_info!("interrupted");
                    self.console.line("");
                    break;
                }
            }
        }
        self.console.flush();
        Ok(())
    }

    /// Run one command. An in-progress command keeps the loop alive until
    /// no async call is pending and no monitor channel is on, or Ctrl-C.
    /// Returns false if the command failed.
    pub async fn run_once(&mut self, tokens: &[String]) -> bool {
        match self.execute(tokens).await {
            Ok(Outcome::InProgress) => {}
            Ok(_) => return true,
            Err(_) => return false,
        }

        while self.gateway.has_pending() || self.monitor.is_active() {
            let event = tokio::select! {
                Some(done) = self.gateway.next_completion() => Event::Completion(done),
                Some(signal) = self.signals.recv() => Event::Signal(signal),
                _ = tokio::signal::ctrl_c() => Event::Interrupt,
            };

            match event {
                Event::Completion(done) => self.handle_completion(done),
                Event::Signal(signal) => self.handle_signal(signal),
                Event::Interrupt => {
                    log_info!("interrupted");
                    break;
                }
                Event::Line(_) => {}
            }
        }
        true
    }
}
