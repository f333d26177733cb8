//! ARQ Bench - reliable transfer benchmark over UDP
//!
//! Run without a server name to act as the server (responder); run with one
//! to act as the client (initiator). Both sides must pick the same test.

use anyhow::Context;
use arq_cli::{
    display_receiver_summary, display_report, display_sweep_table, BenchConfig, RunReport,
    TestMode,
};
use arq_io::UdpChannel;
use arq_protocol::config::MAX_SWEEP_WINDOW;
use arq_protocol::{
    answer_stragglers, linger, DatagramChannel, EngineConfig, LingerConfig, Segment,
    SlidingWindowReceiver, SlidingWindowSender, StopWaitReceiver, StopWaitSender,
    UnreliableReceiver, UnreliableSender,
};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "arq-bench")]
#[command(about = "Unreliable, stop-and-wait and sliding-window transfer benchmark", long_about = None)]
struct Args {
    /// Server host name; omit to run as the server
    server: Option<String>,

    /// Test to run; prompts on stdin when omitted
    #[arg(short, long, value_enum)]
    mode: Option<TestMode>,

    /// UDP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Segments per run
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Sliding window size
    #[arg(short, long)]
    window: Option<usize>,

    /// Repeat the sliding-window test for every window size from 1 to 30
    #[arg(long)]
    sweep: bool,

    /// Retransmission timeout in microseconds
    #[arg(long)]
    rto_us: Option<u64>,

    /// Receiver ack policy (cumulative, early-retransmit)
    #[arg(long)]
    policy: Option<String>,

    /// Times the server repeats its final ack
    #[arg(long)]
    linger_count: Option<u32>,

    /// Milliseconds between final ack repeats
    #[arg(long)]
    linger_interval_ms: Option<u64>,

    /// Server gives up after this many milliseconds without a datagram
    #[arg(long)]
    idle_timeout_ms: Option<u64>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut BenchConfig) {
        if let Some(server) = &self.server {
            config.server = Some(server.clone());
        }
        if let Some(mode) = self.mode {
            config.mode = Some(mode);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(count) = self.count {
            config.engine.segment_count = count;
        }
        if let Some(window) = self.window {
            config.engine.window_size = window;
        }
        if self.sweep {
            config.sweep = true;
        }
        if let Some(rto_us) = self.rto_us {
            config.engine.rto_us = rto_us;
        }
        if let Some(policy) = &self.policy {
            config.engine.ack_policy = policy.clone();
        }
        if let Some(count) = self.linger_count {
            config.linger.count = count;
        }
        if let Some(interval) = self.linger_interval_ms {
            config.linger.interval_ms = interval;
        }
        if let Some(idle) = self.idle_timeout_ms {
            config.engine.idle_timeout_ms = Some(idle);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Show the test menu on stderr and read the choice from stdin
fn prompt_mode() -> anyhow::Result<TestMode> {
    let mut stderr = io::stderr();
    writeln!(stderr, "Choose a testcase")?;
    writeln!(stderr, "   1: unreliable test")?;
    writeln!(stderr, "   2: stop-and-wait test")?;
    writeln!(stderr, "   3: sliding windows")?;
    write!(stderr, "--> ")?;
    stderr.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let choice: u32 = line
        .trim()
        .parse()
        .with_context(|| format!("no such test case: '{}'", line.trim()))?;

    TestMode::from_menu(choice).ok_or_else(|| anyhow::anyhow!("no such test case: {}", choice))
}

fn window_sizes(config: &BenchConfig, engine: &EngineConfig) -> RangeInclusive<usize> {
    if config.sweep {
        1..=MAX_SWEEP_WINDOW
    } else {
        engine.window_size..=engine.window_size
    }
}

/// Throw away datagrams left over from a previous run
fn discard_stale<C: DatagramChannel>(channel: &mut C) -> io::Result<usize> {
    let mut buf = [0u8; arq_protocol::packet::RECV_BUFFER_SIZE];
    let mut discarded = 0;
    while channel.poll_ready()? {
        channel.recv(&mut buf)?;
        discarded += 1;
    }
    if discarded > 0 {
        tracing::debug!("Discarded {} stale datagrams", discarded);
    }
    Ok(discarded)
}

fn run_client(
    channel: &mut UdpChannel,
    mode: TestMode,
    config: &BenchConfig,
    engine: &EngineConfig,
) -> anyhow::Result<()> {
    tracing::info!("client: {} test", mode);

    match mode {
        TestMode::Unreliable => {
            let start = Instant::now();
            let stats = UnreliableSender::new(engine.clone())?.send(channel)?;
            display_report(&RunReport::new(mode, None, start.elapsed(), stats));
        }
        TestMode::StopWait => {
            let start = Instant::now();
            let stats = StopWaitSender::new(engine.clone())?.send(channel)?;
            display_report(&RunReport::new(mode, None, start.elapsed(), stats));
        }
        TestMode::SlidingWindow => {
            let mut reports = Vec::new();
            for window_size in window_sizes(config, engine) {
                discard_stale(channel)?;
                let run = engine.clone().with_window_size(window_size);

                let start = Instant::now();
                let stats = SlidingWindowSender::new(run)?.send(channel)?;
                let report = RunReport::new(mode, Some(window_size), start.elapsed(), stats);
                display_report(&report);
                reports.push(report);
            }
            if config.sweep {
                display_sweep_table(&reports);
            }
        }
    }
    Ok(())
}

fn check_pattern(segment: Segment) {
    if !segment.has_pattern() {
        tracing::warn!(seq = %segment.seq_number(), "payload does not match its sequence number");
    }
}

fn run_server(
    channel: &mut UdpChannel,
    mode: TestMode,
    config: &BenchConfig,
    engine: &EngineConfig,
    linger_config: &LingerConfig,
) -> anyhow::Result<()> {
    tracing::info!("server: {} test", mode);

    match mode {
        TestMode::Unreliable => {
            let stats = UnreliableReceiver::new(engine.clone())?.receive(channel, check_pattern)?;
            display_receiver_summary(mode, &stats, engine.segment_count);
        }
        TestMode::StopWait => {
            let stats = StopWaitReceiver::new(engine.clone())?.receive(channel, check_pattern)?;
            display_receiver_summary(mode, &stats, engine.segment_count);
        }
        TestMode::SlidingWindow => {
            let mut previous: Option<EngineConfig> = None;
            for window_size in window_sizes(config, engine) {
                let run = engine.clone().with_window_size(window_size);
                // The last run's final ack may have been lost; keep answering
                // its sender until this run's first segment arrives
                let first = match &previous {
                    Some(previous) => Some(answer_stragglers(channel, previous)?),
                    None => None,
                };
                let stats = SlidingWindowReceiver::new(run.clone())?.receive_from(
                    channel,
                    first,
                    check_pattern,
                )?;
                tracing::info!(window_size, "window run complete");
                display_receiver_summary(mode, &stats, engine.segment_count);
                previous = Some(run);
            }
        }
    }

    // The final ack may have been lost; keep answering for a while
    if let Err(e) = linger(channel, engine.final_seq(), linger_config) {
        tracing::warn!("Final ack repetition failed: {}", e);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => BenchConfig::from_file(path)
            .with_context(|| format!("cannot load configuration from {}", path.display()))?,
        None => BenchConfig::default(),
    };
    args.apply(&mut config);

    if args.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let engine = config.engine_config()?;
    let linger_config = config.linger_config();

    // The server owns the well-known port; the client takes any free one
    let local_port = if config.server.is_some() { 0 } else { config.port };
    let mut channel = UdpChannel::bind(SocketAddr::from(([0, 0, 0, 0], local_port)))?;

    if let Some(host) = &config.server {
        let dest = channel.set_dest_address(host, config.port)?;
        tracing::info!("Client sending to {}", dest);
    } else {
        tracing::info!("Server listening on {}", channel.local_addr()?);
    }

    let mode = match config.mode {
        Some(mode) => mode,
        None => prompt_mode()?,
    };

    if config.server.is_some() {
        run_client(&mut channel, mode, &config, &engine)?;
    } else {
        run_server(&mut channel, mode, &config, &engine, &linger_config)?;
    }

    eprintln!("finished");
    Ok(())
}
