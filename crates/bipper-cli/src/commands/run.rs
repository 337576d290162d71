use std::io::{self, BufRead};
use std::path::PathBuf;

use bipper_core::document::{self, Document};
use bipper_core::storage::CueConfig;
use bipper_core::timer::{CountdownSnapshot, EngineOptions};
use bipper_core::{Config, CountdownEngine, PauseHandle, RunOutcome};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::cues;
use crate::render::{self, Mode, Renderer};

#[derive(Args)]
pub struct RunArgs {
    /// Countdown document (.toml, .yaml or .json)
    pub document: PathBuf,
    /// Sound file for the warning beeps (overrides config)
    #[arg(long)]
    pub warning_cue: Option<String>,
    /// Sound file for the end of each section (overrides config)
    #[arg(long)]
    pub end_cue: Option<String>,
    /// Do not play any cues
    #[arg(long)]
    pub silent: bool,
    /// Write updates as JSON lines instead of a status line
    #[arg(long)]
    pub json: bool,
    /// Echo the document before the countdown starts
    #[arg(long)]
    pub show_document: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let document = document::load(&args.document)?;

    let mut cue_config = config.cues.clone();
    if let Some(path) = args.warning_cue {
        cue_config.warning_sound = path;
    }
    if let Some(path) = args.end_cue {
        cue_config.end_sound = path;
    }
    let mode = if args.json {
        Mode::Json
    } else {
        Mode::Text {
            show_document: args.show_document,
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let (outcome, snapshot) = runtime.block_on(play(
        document,
        config.engine_options(),
        &cue_config,
        args.silent,
        mode,
    ))?;

    if args.json {
        let summary = serde_json::json!({ "outcome": outcome, "final": snapshot });
        println!("{summary}");
    } else {
        match (outcome, snapshot) {
            (RunOutcome::Completed, _) => println!("Done."),
            (RunOutcome::Cancelled, Some(s)) if s.lap > 0 => {
                println!("Stopped during {} (lap {}).", s.section_name, s.lap + 1)
            }
            (RunOutcome::Cancelled, Some(s)) => println!("Stopped during {}.", s.section_name),
            (RunOutcome::Cancelled, None) => println!("Stopped."),
            (RunOutcome::NotConfigured, _) => println!("Nothing to play."),
        }
    }
    Ok(())
}

async fn play(
    document: Document,
    options: EngineOptions,
    cue_config: &CueConfig,
    silent: bool,
    mode: Mode,
) -> Result<(RunOutcome, Option<CountdownSnapshot>), Box<dyn std::error::Error>> {
    let (mut engine, observer) = CountdownEngine::new(options);
    let (warning, end) = cues::build(cue_config, silent)?;
    engine.init(document, warning, end)?;

    let cancel = engine.cancellation_token();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupted");
                cancel.cancel();
            }
        }
    });
    spawn_input_reader(observer.pause_handle(), cancel)?;

    let renderer = tokio::spawn(render::drive(observer, Renderer::new(io::stdout(), mode)));
    let outcome = engine.run().await;
    let snapshot = engine.snapshot();
    // Closing joins the cue workers.
    tokio::task::block_in_place(|| engine.close());
    renderer.await??;
    Ok((outcome, snapshot))
}

/// Forward keyboard input: `p` toggles pause, `q` quits.
///
/// The thread is left blocked on stdin when the run ends.
fn spawn_input_reader(pause: PauseHandle, cancel: CancellationToken) -> io::Result<()> {
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if cancel.is_cancelled() {
                    break;
                }
                match parse_key(&line) {
                    Some(Key::Quit) => {
                        cancel.cancel();
                        break;
                    }
                    Some(Key::Pause) => {
                        if !pause.toggle() {
                            eprintln!("(pause is not available right now)");
                        }
                    }
                    None => eprintln!("(p + Enter to pause or resume, q + Enter to quit)"),
                }
            }
        })?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Pause,
    Quit,
}

fn parse_key(line: &str) -> Option<Key> {
    match line.trim() {
        "p" | "P" => Some(Key::Pause),
        "q" | "Q" | "quit" => Some(Key::Quit),
        _ => None,
    }
}
