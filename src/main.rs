use anyhow::Result;
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use page_mirror::archive::create_zip_archive;
use page_mirror::delivery::TelegramDelivery;
use page_mirror::url_normalizer::project_name;
use page_mirror::{MirrorCommand, MirrorConfig, MirrorReport, WebsiteMirror};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "page_mirror=debug" } else { "page_mirror=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(report: &MirrorReport) {
    println!("📊 Files written: {}", report.files_written);
    println!("   🎨 Stylesheets: {}", report.counts.stylesheets);
    println!("   📜 Scripts: {}", report.counts.scripts);
    println!("   🖼️  Images: {}", report.counts.images);
    println!("   🔤 Fonts: {}", report.counts.fonts);

    if !report.indicators.is_empty() {
        println!(
            "{} Client-rendered page detected ({}); only the static markup was mirrored",
            "⚠️ ".yellow(),
            report.indicators.join(", ")
        );
    }

    if report.is_complete() {
        return;
    }
    println!("{} {} resources failed:", "❌".red(), report.failures.len());
    for failure in &report.failures {
        println!("   {} {}", failure.url.red(), failure.reason);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MirrorCommand::parse();
    init_tracing(args.verbose);

    let mut config = MirrorConfig::load_or_default(&args.config);
    args.apply_to(&mut config);

    let target = WebsiteMirror::parse_target(&args.url)?;
    let name = project_name(&target);
    let project_dir = args.output_dir.join(&name);

    println!("🚀 Starting page mirroring for: {}", target.as_str().blue());
    println!("📁 Output directory: {:?}", project_dir);
    println!("⚡ Max concurrent downloads: {}", config.max_concurrent);

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    progress_bar.enable_steady_tick(Duration::from_millis(120));
    progress_bar.set_message(format!("Mirroring: {}", target));

    let mirror = WebsiteMirror::new(&config)?;
    let result = mirror.mirror(target.as_str(), &project_dir).await;
    progress_bar.finish_and_clear();
    let report = result?;

    print_summary(&report);

    if args.wants_archive() {
        let zip_path = args.output_dir.join(format!("{}.zip", name));
        create_zip_archive(&project_dir, &zip_path)?;
        println!("📦 Archive created: {:?}", zip_path);

        if args.deliver {
            let delivery = TelegramDelivery::from_config(&config)?;
            delivery.send_document(&zip_path).await?;
            println!("📨 Archive sent to Telegram");
        }
    }

    println!("✅ Page mirroring completed: {}", report.project_dir.display().to_string().green());
    Ok(())
}
