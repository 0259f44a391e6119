//! uiprobe CLI entry point.

mod args;
mod device;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::error;

use uiprobe_core::bridge::DeviceBridge;
use uiprobe_core::config::SessionConfig;
use uiprobe_core::error::ApiError;
use uiprobe_core::format::{format_node, format_tree, FormatOptions};
use uiprobe_core::handle::{ElementHandle, HandleSummary};
use uiprobe_core::node::Point;
use uiprobe_core::session::{DeviceSession, DEFAULT_LONG_PRESS};
use uiprobe_core::Selector;

use crate::args::{parse_key_code, Cli, Commands, DumpFormat};
use crate::device::{AdbBridge, FileBridge};

fn main() {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Examples = cli.command {
        println!("{}", crate::args::EXAMPLES_TEXT);
        return;
    }

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let config = SessionConfig::from_env();

    runtime.block_on(async {
        match &cli.file {
            Some(path) => {
                let session = DeviceSession::with_config(FileBridge::new(path), config);
                execute(&session, &cli.command).await
            }
            None => {
                let bridge = AdbBridge::new(cli.adb.clone(), cli.serial.clone());
                let session = DeviceSession::with_config(bridge, config);
                execute(&session, &cli.command).await
            }
        }
    })
}

async fn execute<B: DeviceBridge>(
    session: &DeviceSession<B>,
    command: &Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Dump(args) => {
            if args.format == DumpFormat::Raw {
                let raw = session.bridge().capture_hierarchy().await?;
                println!("{}", raw.trim_end());
                return Ok(());
            }
            let snapshot = session.snapshot(true).await?;
            if args.format == DumpFormat::Json {
                print_json(&*snapshot)?;
            } else {
                let options = FormatOptions {
                    max_text_width: args.width,
                    visible_only: args.visible_only,
                };
                print!("{}", format_tree(&snapshot, &options));
            }
        }
        Commands::Find(args) => {
            let selector = Selector::from_input(&args.selector)?;
            let handles = match &args.within {
                Some(scope) => {
                    let scope = session.require(&Selector::from_input(scope)?).await?;
                    if args.all {
                        scope.find_all_within(&selector)
                    } else {
                        scope.find_within(&selector).into_iter().collect()
                    }
                }
                None if args.all => session.find_all(&selector).await?,
                None => vec![session.require(&selector).await?],
            };
            if handles.is_empty() {
                return Err(ApiError::not_found(&selector.to_string()).into());
            }
            if args.json {
                let summaries: Vec<HandleSummary> = handles.iter().map(|h| h.summary()).collect();
                if args.all {
                    print_json(&summaries)?;
                } else {
                    print_json(&summaries[0])?;
                }
            } else {
                for handle in &handles {
                    print_handle(handle);
                }
            }
        }
        Commands::Tap(args) => {
            if let Some(at) = &args.at {
                let point = Point::new(at[0], at[1]);
                match args.hold {
                    Some(ms) => session.swipe(point, point, hold_duration(ms)).await?,
                    None => session.tap_point(point).await?,
                }
                return Ok(());
            }
            let raw = args
                .selector
                .as_deref()
                .context("a selector or --at is required")?;
            let selector = Selector::from_input(raw)?;
            let mut options = session.wait_options();
            if let Some(ms) = args.timeout {
                options = options.with_timeout(Duration::from_millis(ms));
            }
            let handle = match args.hold {
                Some(ms) => {
                    let handle = session.wait_for(&selector, &options).await?;
                    session.long_press(&handle, hold_duration(ms)).await?;
                    handle
                }
                None => session.tap_selector(&selector, &options).await?,
            };
            print_json(&handle.summary())?;
        }
        Commands::WaitFor(args) => {
            let selector = Selector::from_input(&args.selector)?;
            let mut options = session.wait_options();
            if let Some(ms) = args.timeout {
                options = options.with_timeout(Duration::from_millis(ms));
            }
            if args.hidden {
                session.wait_for_hidden(&selector, &options).await?;
                print_json(&serde_json::json!({ "hidden": selector.to_string() }))?;
            } else {
                let handle = session.wait_for(&selector, &options).await?;
                print_json(&handle.summary())?;
            }
        }
        Commands::Type(args) => session.type_text(&args.text).await?,
        Commands::Key(args) => {
            let code = parse_key_code(&args.key).ok_or_else(|| {
                ApiError::invalid_input_with_suggestion(
                    format!("Unknown key '{}'", args.key),
                    "Use a key name like 'back', 'home', 'enter', or a numeric Android key code",
                )
            })?;
            session.press_key(code).await?;
        }
        Commands::Swipe(args) => {
            session
                .swipe(
                    Point::new(args.x1, args.y1),
                    Point::new(args.x2, args.y2),
                    Duration::from_millis(args.duration),
                )
                .await?;
        }
        Commands::Examples => println!("{}", crate::args::EXAMPLES_TEXT),
    }
    Ok(())
}

fn hold_duration(ms: Option<u64>) -> Duration {
    ms.map(Duration::from_millis).unwrap_or(DEFAULT_LONG_PRESS)
}

fn print_handle(handle: &ElementHandle) {
    let center = handle.center();
    println!(
        "{}  @({},{})  {}",
        format_node(handle.node(), &FormatOptions::default()),
        center.x,
        center.y,
        handle.describe()
    );
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
