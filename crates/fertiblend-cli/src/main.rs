use clap::{Args, Parser, Subcommand};
use fertiblend_engine::{
    BatchResult, BlendEngine, FieldOutcome, FieldRequirement, InputDocument, ProductRegistry, ScenarioComparison,
    Settings,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fertiblend")]
#[command(about = "Least-cost N-P-K fertilizer blends per field", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate an input document
    Check {
        /// The JSON input document
        file: PathBuf,
    },
    /// Optimize the blend of every field
    Solve {
        /// The JSON input document
        file: PathBuf,
        /// Output format (json, pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
        #[command(flatten)]
        overrides: Overrides,
        /// Decimals shown for doses
        #[arg(long)]
        precision: Option<u32>,
        /// Solve fields one after another
        #[arg(long)]
        sequential: bool,
    },
    /// Compare two settings scenarios over the same fields
    Compare {
        /// The JSON input document
        file: PathBuf,
        /// Output format (json, pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
        /// Nitrogen ceiling in scenario A (0 for none)
        #[arg(long)]
        a_nmax: Option<f64>,
        /// Mix ceiling in scenario A (0 for none)
        #[arg(long)]
        a_mixmax: Option<f64>,
        /// Target tolerance in scenario A
        #[arg(long)]
        a_tol: Option<f64>,
        /// Application cost in scenario A
        #[arg(long)]
        a_costoap: Option<f64>,
        /// Nitrogen ceiling in scenario B (0 for none)
        #[arg(long)]
        b_nmax: Option<f64>,
        /// Mix ceiling in scenario B (0 for none)
        #[arg(long)]
        b_mixmax: Option<f64>,
        /// Target tolerance in scenario B
        #[arg(long)]
        b_tol: Option<f64>,
        /// Application cost in scenario B
        #[arg(long)]
        b_costoap: Option<f64>,
    },
}

/// Settings overrides taking precedence over the document
#[derive(Args, Clone, Default)]
struct Overrides {
    /// Ceiling on nitrogen per hectare (0 for none)
    #[arg(long)]
    nmax: Option<f64>,
    /// Ceiling on total product per hectare (0 for none)
    #[arg(long)]
    mixmax: Option<f64>,
    /// Relative relaxation of minimum targets, e.g. 0.02
    #[arg(long)]
    tol: Option<f64>,
    /// Cost of spreading one ton of product
    #[arg(long)]
    costoap: Option<f64>,
}

impl Overrides {
    fn apply(&self, mut settings: Settings) -> Settings {
        let ceiling = |v: f64| (v > 0.0).then_some(v);
        if let Some(v) = self.nmax {
            settings.max_nitrogen = ceiling(v);
        }
        if let Some(v) = self.mixmax {
            settings.max_mix = ceiling(v);
        }
        if let Some(v) = self.tol {
            settings.tolerance = v;
        }
        if let Some(v) = self.costoap {
            settings.application_cost = v / 1000.0;
        }
        settings
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "fertiblend=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { file } => {
            let (doc, registry, requirements) = load(&file);
            let engine = BlendEngine::new(doc.settings());
            if let Err(e) = engine.validate(&registry, &requirements) {
                eprintln!("✗ {} has errors:", file.display());
                eprintln!("  {}", e);
                std::process::exit(1);
            }

            println!("✓ {} is valid", file.display());
            println!("  {} products", registry.len());
            println!("  {} crops", doc.crops.len());
            println!("  {} fields", requirements.len());
        }
        Commands::Solve {
            file,
            format,
            overrides,
            precision,
            sequential,
        } => {
            let (doc, registry, requirements) = load(&file);
            let mut settings = overrides.apply(doc.settings());
            if let Some(p) = precision {
                settings.display_precision = p;
            }
            if sequential {
                settings.parallel = false;
            }
            let precision = settings.display_precision as usize;

            let batch = match BlendEngine::new(settings).optimize(&registry, &requirements) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("Invalid input: {}", e);
                    std::process::exit(1);
                }
            };

            if format == "json" {
                print_json(&batch);
            } else {
                print_batch(&batch, precision);
            }

            if !batch.all_solved() {
                std::process::exit(2);
            }
        }
        Commands::Compare {
            file,
            format,
            a_nmax,
            a_mixmax,
            a_tol,
            a_costoap,
            b_nmax,
            b_mixmax,
            b_tol,
            b_costoap,
        } => {
            let (doc, registry, requirements) = load(&file);
            let a = Overrides {
                nmax: a_nmax,
                mixmax: a_mixmax,
                tol: a_tol,
                costoap: a_costoap,
            };
            let b = Overrides {
                nmax: b_nmax,
                mixmax: b_mixmax,
                tol: b_tol,
                costoap: b_costoap,
            };
            let settings = doc.settings();
            let precision = settings.display_precision as usize;
            let engine_a = BlendEngine::new(a.apply(settings.clone()));
            let engine_b = BlendEngine::new(b.apply(settings));

            let comparison = match fertiblend_engine::compare(&engine_a, &engine_b, &registry, &requirements) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Invalid input: {}", e);
                    std::process::exit(1);
                }
            };

            if format == "json" {
                print_json(&comparison);
            } else {
                print_comparison(&comparison, precision);
            }

            if !comparison.a.all_solved() || !comparison.b.all_solved() {
                std::process::exit(2);
            }
        }
    }
}

fn load(file: &Path) -> (InputDocument, ProductRegistry, Vec<FieldRequirement>) {
    let doc = match InputDocument::load(file) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let resolved = doc.registry().and_then(|r| Ok((r, doc.requirements()?)));
    match resolved {
        Ok((registry, requirements)) => {
            tracing::debug!(
                file = %file.display(),
                products = registry.len(),
                fields = requirements.len(),
                "loaded input document"
            );
            (doc, registry, requirements)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error writing JSON: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_batch(batch: &BatchResult, precision: usize) {
    for outcome in batch.outcomes.values() {
        println!("Field: {}", outcome.field_id());
        println!("Status: {}", outcome.label());

        match outcome {
            FieldOutcome::Solved(plan) => {
                println!("Cost per ha: {:.2}", plan.total_cost);
                if let Some(total) = plan.field_total_cost {
                    println!("Field cost: {:.2}", total);
                }
                println!("Products (kg/ha):");
                for dose in &plan.doses {
                    println!("  {:20} {:10.*}", dose.product_id, precision, dose.display_quantity);
                }
                println!("Nutrients (kg/ha):");
                for c in &plan.nutrients {
                    let required = c.required_min.map_or("-".to_string(), |v| format!("{:.2}", v));
                    let marker = if c.binding { " *" } else { "" };
                    println!(
                        "  {:5} required {:>8}  achieved {:8.2}  surplus {:8.2}{}",
                        c.nutrient.symbol(),
                        required,
                        c.achieved,
                        c.surplus,
                        marker
                    );
                }
            }
            FieldOutcome::Infeasible {
                diagnostic_message, ..
            } => println!("{}", diagnostic_message),
            FieldOutcome::ConfigurationError { reason, .. } | FieldOutcome::SolverError { reason, .. } => {
                println!("{}", reason)
            }
        }
        println!();
    }

    println!(
        "Total cost: {:.2} ({} solved, {} infeasible, {} errors)",
        batch.total_cost(),
        batch.solved_count(),
        batch.infeasible_count(),
        batch.error_count()
    );
}

fn print_comparison(cmp: &ScenarioComparison, precision: usize) {
    println!("Cost A: {:.2}", cmp.cost_a);
    println!("Cost B: {:.2}", cmp.cost_b);
    println!("Difference (B - A): {:+.2}", cmp.cost_difference);
    println!();

    println!("Dose per field (kg/ha):");
    for f in &cmp.fields {
        println!(
            "  {:12} A {:10.*}  B {:10.*}  diff {:+.*}",
            f.field_id, precision, f.dose_a, precision, f.dose_b, precision, f.dose_difference
        );
    }
    if let Some(id) = &cmp.largest_increase {
        println!("Largest increase: {}", id);
    }
    if let Some(id) = &cmp.largest_decrease {
        println!("Largest decrease: {}", id);
    }
    println!();

    println!("Product changes (kg/ha, B - A):");
    for f in &cmp.fields {
        for p in f.products.iter().filter(|p| p.difference.abs() > 1e-6) {
            println!("  {:12} {:20} {:+.*}", f.field_id, p.product_id, precision, p.difference);
        }
    }
}
