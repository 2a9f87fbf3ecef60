// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A small driver around [`transact_engine_rs::registry::ContextRegistry`]:
//! issue one GET against a host given on the command line and print the
//! result. Exercises the same `StdTcpPal` + `ImmediateNotifier`-style
//! wiring a real embedder would use, minus the concurrency.

use std::{thread, time::Duration};

use anyhow::Result;
use tracing::info;
use transact_engine_rs::{
    cfg::{cli::resolve_config_path, config::EngineConfig, logger::init_logger},
    context::{Context, TransactionKind},
    error::TransactResult,
    fsm::states::State,
    notifier::{EnqueueStatus, Notifier},
    pal::tcp::StdTcpPal,
    registry::ContextRegistry,
};

/// Records the single terminal outcome of the one transaction this demo
/// drives, so the poll loop below can read it without fighting the borrow
/// checker over a closure-captured variable.
struct DemoNotifier {
    outcome: Option<(TransactResult, State)>,
}

impl Notifier for DemoNotifier {
    fn enqueue_for_processing(&mut self, _ctx: &mut Context) -> EnqueueStatus {
        EnqueueStatus::Immediate
    }

    fn requeue_for_processing(&mut self, _ctx: &mut Context) {}

    fn trans_outcome(&mut self, ctx: &mut Context, terminal_state: State) {
        let result = ctx.last_result.unwrap_or(TransactResult::InternalError);
        ctx.state = terminal_state;
        self.outcome = Some((result, terminal_state));
    }
}

fn main() -> Result<()> {
    let _guard = resolve_config_path("demos/config_logger.yaml")
        .ok()
        .and_then(|p| p.to_str().map(str::to_owned))
        .and_then(|p| init_logger(&p).ok());

    let config = resolve_config_path("demos/config.engine.yaml")
        .ok()
        .and_then(|p| EngineConfig::load_from_file(p).ok())
        .unwrap_or_default();

    let mut args = std::env::args().skip(1);
    let origin = args.next().unwrap_or_else(|| "example.com:80".to_string());
    let path = args.next().unwrap_or_else(|| "/".to_string());

    let mut registry = ContextRegistry::new(10_000);
    let id = registry.create(origin.clone(), &config);

    let mut pal = StdTcpPal::new();
    let mut notifier = DemoNotifier { outcome: None };

    registry.start(id, TransactionKind::Get, path, &mut pal, &mut notifier);

    let poll_interval = Duration::from_millis(20);
    while notifier.outcome.is_none() {
        thread::sleep(poll_interval);
        registry.drive(id, &mut pal, &mut notifier);
        registry.tick(poll_interval.as_millis() as i64, &mut pal, &mut notifier);
    }

    let (result, state) = notifier.outcome.expect("loop only exits once an outcome is set");
    info!(%origin, ?result, ?state, "transaction finished");
    println!("{origin}: {result} ({state:?})");

    Ok(())
}
