use std::path::PathBuf;

use bipper_core::document::{self, format_duration};
use bipper_core::timer::CountdownOptions;
use bipper_core::{Config, Countdown};
use clap::Args;

#[derive(Args)]
pub struct CheckArgs {
    /// Countdown document (.toml, .yaml or .json)
    pub document: PathBuf,
    /// Print the parsed document and initial state as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let doc = document::load(&args.document)?;

    if args.json {
        let options: CountdownOptions = Config::load()?.engine_options().countdown;
        let countdown = Countdown::new(doc.clone(), options)?;
        let out = serde_json::json!({
            "document": &doc,
            "total_secs": doc.total().as_secs(),
            "initial": countdown.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let width = doc
        .sections()
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0);
    for (i, section) in doc.sections().iter().enumerate() {
        println!(
            "{:>3}. {:<width$}  {}",
            i + 1,
            section.name,
            format_duration(section.duration)
        );
    }
    println!(
        "{} sections, {} total{}",
        doc.sections().len(),
        format_duration(doc.total()),
        if doc.looping() { ", looping" } else { "" }
    );
    Ok(())
}
