use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use docsight::config::DocsightConfig;
use docsight::error::DocsightError;
use docsight::fields::fields_by_page;
use docsight::geometry::{self, OverlayPlacement, PageMetrics};
use docsight::logging::{init_logging, LoggingConfig};
use docsight::ocr::ReadModelClient;
use docsight::overlay::OverlayState;
use docsight::render::SimulatedSurface;
use docsight::session::SelectionOutcome;
use docsight::workspace::DocumentWorkspace;

#[derive(Parser)]
#[command(
    name = "docsight",
    version,
    about = "OCR-backed PDF field viewer with coordinate-accurate highlight overlays"
)]
struct Cli {
    /// Path to a docsight.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a PDF with the OCR backend and print a summary
    Analyze {
        /// PDF file to analyze
        pdf: PathBuf,

        /// Analyze from a URL instead of uploading the file bytes
        #[arg(long)]
        from_url: Option<String>,

        /// Print the display JSON instead of the summary
        #[arg(long)]
        json: bool,
    },

    /// Print the page-grouped, classified field list
    Fields {
        /// PDF file to analyze
        pdf: PathBuf,
    },

    /// Print the display JSON view of the analysis
    Json {
        /// PDF file to analyze
        pdf: PathBuf,
    },

    /// Run the highlight path headlessly and print the overlay rectangle
    Highlight {
        /// PDF file to analyze
        pdf: PathBuf,

        /// Zero-based index into the extracted field list
        #[arg(long)]
        field: usize,

        /// Simulated rendered page width in pixels
        #[arg(long, default_value_t = 612.0)]
        page_width: f64,

        /// Simulated rendered page height in pixels
        #[arg(long, default_value_t = 792.0)]
        page_height: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        quiet: false,
    });

    let config = load_config(cli.config.as_deref())?;

    let outcome = match cli.command {
        Commands::Analyze { pdf, from_url, json } => {
            analyze_command(config, pdf, from_url, json).await
        }
        Commands::Fields { pdf } => fields_command(config, pdf).await,
        Commands::Json { pdf } => json_command(config, pdf).await,
        Commands::Highlight {
            pdf,
            field,
            page_width,
            page_height,
        } => highlight_command(config, pdf, field, page_width, page_height).await,
    };

    if let Err(err) = outcome {
        if let Some(docsight_err) = err.downcast_ref::<DocsightError>() {
            eprintln!("{}", docsight_err.user_message());
            std::process::exit(1);
        }
        return Err(err);
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DocsightConfig> {
    let mut config = match path {
        Some(path) => DocsightConfig::load_from_file(path)?,
        None => DocsightConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

async fn analyze_command(
    config: DocsightConfig,
    pdf: PathBuf,
    from_url: Option<String>,
    json: bool,
) -> Result<()> {
    let mut workspace = DocumentWorkspace::new(config.clone());

    if let Some(url) = from_url {
        let backend = ReadModelClient::new(&config.ocr);
        workspace.analyze_url(&backend, &url).await?;
    } else {
        run_analysis_with(&mut workspace, &config, &pdf).await?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&workspace.json_view())?);
        return Ok(());
    }

    let field_count = workspace.fields().len();
    let pages = workspace
        .result()
        .map(|r| r.pages)
        .unwrap_or_default();

    println!("📄 Analysis complete");
    println!("   Document: {}", pdf.display());
    println!(
        "   Completed: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("   Pages analyzed: {}", pages);
    println!("   Fields extracted: {}", field_count);
    Ok(())
}

async fn fields_command(config: DocsightConfig, pdf: PathBuf) -> Result<()> {
    let mut workspace = DocumentWorkspace::new(config.clone());
    run_analysis_with(&mut workspace, &config, &pdf).await?;

    let fields = workspace.fields();
    if fields.is_empty() {
        println!("No text content extracted");
        return Ok(());
    }

    for (page, entries) in fields_by_page(fields) {
        println!("Page {}", page);
        println!("--------");
        for field in entries {
            println!(
                "{} {} [{}]  ✓ {:.0}%",
                field.kind.display_icon(),
                field.name,
                field.id,
                field.confidence * 100.0
            );
            println!("   {}", field.value);
            println!(
                "   ({:.1}, {:.1})",
                field.span.bounding_box.x_min, field.span.bounding_box.y_min
            );
        }
        println!();
    }
    Ok(())
}

async fn json_command(config: DocsightConfig, pdf: PathBuf) -> Result<()> {
    let mut workspace = DocumentWorkspace::new(config.clone());
    run_analysis_with(&mut workspace, &config, &pdf).await?;
    println!("{}", serde_json::to_string_pretty(&workspace.json_view())?);
    Ok(())
}

async fn highlight_command(
    config: DocsightConfig,
    pdf: PathBuf,
    field_index: usize,
    page_width: f64,
    page_height: f64,
) -> Result<()> {
    let mut workspace = DocumentWorkspace::new(config.clone());
    run_analysis_with(&mut workspace, &config, &pdf).await?;

    let field = workspace
        .fields()
        .get(field_index)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "field index {} out of range ({} fields)",
                field_index,
                workspace.fields().len()
            )
        })?
        .clone();

    let total_pages = workspace.result().map(|r| r.pages as usize).unwrap_or(1);
    let metrics = PageMetrics::new(page_width, page_height);
    let mut surface = SimulatedSurface::new(total_pages.max(1), metrics);

    workspace.field_clicked(&field.span, &mut surface);

    match workspace.overlay_state() {
        OverlayState::Visible { page_index, rect, .. } => {
            // Recompute the pixel rect alongside the percentage rect the
            // machine stored
            let reference = docsight::pdf::probe(&pdf)
                .ok()
                .and_then(|p| p.reference)
                .unwrap_or_else(|| config.page_reference());
            let pixels = match geometry::place(
                &field.span.bounding_box,
                reference,
                Some(metrics),
                config.ocr.unit_scale,
                config.overlay.padding_pct,
            ) {
                OverlayPlacement::Visible { pixels, .. } => Some(pixels),
                OverlayPlacement::NotVisible => None,
            };

            println!("🔦 Highlight attached");
            println!("   Field: {} ({})", field.name, field.value);
            println!("   Page index: {}", page_index);
            println!(
                "   Percent: left {:.2}% top {:.2}% width {:.2}% height {:.2}%",
                rect.left_pct, rect.top_pct, rect.width_pct, rect.height_pct
            );
            if let Some(px) = pixels {
                println!(
                    "   Pixels:  left {:.1} top {:.1} width {:.1} height {:.1}",
                    px.left, px.top, px.width, px.height
                );
            }
        }
        other => {
            println!("Overlay not attachable: {:?}", other);
        }
    }
    Ok(())
}

/// Select + analyze the document, reusing the session cache when possible
async fn run_analysis_with(
    workspace: &mut DocumentWorkspace,
    config: &DocsightConfig,
    pdf: &Path,
) -> Result<()> {
    let backend = ReadModelClient::new(&config.ocr);

    match workspace.select_document(pdf)? {
        SelectionOutcome::CacheHit(_) => {
            info!("analysis served from cache");
        }
        SelectionOutcome::NeedsAnalysis => {
            let bytes = tokio::fs::read(pdf)
                .await
                .map_err(|e| DocsightError::file_io(pdf.display().to_string(), e))?;
            workspace.analyze_selected(&backend, &bytes).await?;
        }
    }
    Ok(())
}
