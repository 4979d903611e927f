// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Propagation stress test.
//!
//! Builds a chain of inverters, each also driving a row of buffers, then
//! toggles the chain input and runs every resulting event.
//!
//! Usage:
//!   cargo run -r --bin gatesim_stress -- --depth 1000 --width 8 --cycles 100

use std::path::PathBuf;
use std::rc::Rc;

use gatesim::config::SimConfig;
use gatesim::delay::DelayTable;
use gatesim::functor::{Functor, FunctorKind};
use gatesim::gates::{Gate, GateOp};
use gatesim::ipoint::Ipoint;
use gatesim::sim::Simulation;
use gatesim::strength::{Bit4, Drive, Strength};

#[derive(clap::Parser, Debug)]
#[command(name = "gatesim_stress")]
#[command(about = "Drive a synthetic inverter chain through the gate-level kernel")]
struct Args {
    /// Inverters in the chain.
    #[clap(long, default_value = "1000")]
    depth: u32,

    /// Buffers hanging off each inverter output.
    #[clap(long, default_value = "4")]
    width: u32,

    /// Rise delay of every inverter.
    #[clap(long, default_value = "2")]
    rise: u64,

    /// Fall delay of every inverter.
    #[clap(long, default_value = "1")]
    fall: u64,

    /// Input toggles.
    #[clap(long, default_value = "100")]
    cycles: usize,

    /// Simulation options (JSON).
    #[clap(long)]
    config: Option<PathBuf>,
}

fn build(sim: &mut Simulation, args: &Args) -> (Ipoint, Ipoint) {
    let delay = Rc::new(DelayTable::rise_fall(args.rise, args.fall));
    let chain = sim.allocate(args.depth);
    for i in 0..args.depth {
        let inv = Functor::new(FunctorKind::Gate(Gate::new(GateOp::Not, 1))).with_delay(Rc::clone(&delay));
        sim.define(chain.offset(i), inv);
    }
    for i in 1..args.depth {
        sim.connect(chain.offset(i - 1), chain.offset(i));
    }
    if args.width > 0 {
        for i in 0..args.depth {
            let row = sim.allocate(args.width);
            for j in 0..args.width {
                sim.define(row.offset(j), Functor::new(FunctorKind::Gate(Gate::new(GateOp::Buf, 1))));
                sim.connect(chain.offset(i), row.offset(j));
            }
        }
    }
    (chain, chain.offset(args.depth - 1))
}

fn main() {
    clilog::init_stderr_color_debug();

    let args = <Args as clap::Parser>::parse();
    clilog::info!("Stress args:\n{:#?}", args);
    if args.depth == 0 {
        clilog::error!("--depth must be at least 1");
        std::process::exit(1);
    }

    let config = match &args.config {
        Some(path) => match SimConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                clilog::error!("{}", e);
                std::process::exit(1);
            }
        },
        None => SimConfig::default(),
    };

    let mut sim = Simulation::new(config);
    let timer_build = clilog::stimer!("build");
    let (input, output) = build(&mut sim, &args);
    clilog::finish!(timer_build);
    clilog::info!(
        "{} functors in {} chunks",
        sim.space().limit(),
        sim.space().chunks_in_use()
    );

    let timer_sim = clilog::stimer!("simulation");
    let mut level = Bit4::Zero;
    let mut events = 0;
    for _ in 0..args.cycles {
        let str = Strength::from_drive(level, Drive::Strong, Drive::Strong);
        sim.functor_set(input, level, str, true);
        events += sim.run();
        level = level.not();
    }
    clilog::finish!(timer_sim);

    let stats = sim.stats();
    clilog::info!(
        "time {}: {} events, {} sets, {} propagations, {} deferred pushes",
        sim.now(),
        events,
        stats.sets,
        stats.propagations,
        stats.deferred_pushes
    );
    clilog::info!("chain output = {}", sim.functor_get(output));
}
