use bar_cut_optimizer::config::{ExactConfig, OptimizeConfig};
use bar_cut_optimizer::input;
use bar_cut_optimizer::solver::optimize;
use bar_cut_optimizer::types::{CuttingPlan, DemandRow, GapPolicy, Objective, format_length};
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "bar_cut_optimizer",
    about = "1D cutting stock optimizer for aluminum profiles"
)]
struct Cli {
    /// Candidate stock bar lengths in mm (e.g. 6000 6500)
    #[arg(long, num_args = 1.., required = true)]
    stock: Vec<f64>,

    /// Pieces as PROFILE:LENGTH:QTY[:DOOR] (e.g. XF55:1450:4 XF55:900:2:D01)
    #[arg(long = "cuts", num_args = 1.., required_unless_present = "input")]
    cuts: Vec<String>,

    /// CSV file with Profile Code, Length, Quantity (English or Vietnamese headers)
    #[arg(long, conflicts_with = "cuts")]
    input: Option<std::path::PathBuf>,

    /// Blade kerf in mm (default: 0)
    #[arg(long, default_value_t = 0.0)]
    gap: f64,

    /// Objective: max-efficiency, min-bar-count, flexible, or exact
    #[arg(long, default_value = "max-efficiency", value_parser = parse_objective)]
    objective: Objective,

    /// Charge one gap per piece instead of one per cut between pieces
    #[arg(long)]
    legacy_gap: bool,

    /// Time budget for the exact solver in ms (0: unlimited)
    #[arg(long, default_value_t = 30_000)]
    time_limit_ms: u64,

    /// Print the full plan as JSON
    #[arg(long)]
    json: bool,

    /// Log solver decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn parse_objective(s: &str) -> Result<Objective, String> {
    match s {
        "max-efficiency" => Ok(Objective::MaxEfficiency),
        "min-bar-count" => Ok(Objective::MinBarCount),
        "flexible" => Ok(Objective::FlexibleMultiLength),
        "exact" => Ok(Objective::Exact),
        _ => Err(format!(
            "invalid objective '{}', expected: max-efficiency, min-bar-count, flexible, or exact",
            s
        )),
    }
}

fn parse_cut(s: &str) -> Result<DemandRow, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(format!(
            "invalid cut '{}', expected PROFILE:LENGTH:QTY[:DOOR]",
            s
        ));
    }
    let length = parts[1]
        .parse::<f64>()
        .map_err(|_| format!("invalid length in '{}'", s))?;
    let quantity = parts[2]
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    let row = DemandRow::new(parts[0], length, quantity);
    Ok(match parts.get(3) {
        Some(door) if !door.is_empty() => row.with_door_code(*door),
        _ => row,
    })
}

fn print_plan(plan: &CuttingPlan) {
    for summary in &plan.summaries {
        println!("Profile {}:", summary.profile_code);
        for bar in plan.bars_for(&summary.profile_code) {
            let upsized = if bar.upsized { " [upsized]" } else { "" };
            println!(
                "  Bar {} ({}mm){}: {}  remaining {}mm, {:.1}%",
                bar.bar_number,
                format_length(bar.stock_length),
                upsized,
                bar.pattern(),
                format_length(bar.remaining_length),
                bar.efficiency * 100.0
            );
        }
        println!(
            "  Summary: {} piece{} on {} bar{}, {:.1}% efficiency, {}mm waste",
            summary.total_pieces,
            if summary.total_pieces == 1 { "" } else { "s" },
            summary.total_bars_used,
            if summary.total_bars_used == 1 { "" } else { "s" },
            summary.overall_efficiency * 100.0,
            format_length(summary.waste),
        );
        println!();
    }

    for unassigned in &plan.unassigned {
        println!(
            "Unassigned {} ({}mm): {}",
            unassigned.item.item_id,
            format_length(unassigned.item.length),
            unassigned.note
        );
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let demand: Vec<DemandRow> = match &cli.input {
        Some(path) => input::read_demand_file(path).map_err(|e| e.to_string()),
        None => cli.cuts.iter().map(|c| parse_cut(c)).collect(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let config = OptimizeConfig::new(cli.stock.clone())
        .with_gap(cli.gap)
        .with_gap_policy(if cli.legacy_gap {
            GapPolicy::PerPiece
        } else {
            GapPolicy::BetweenPieces
        })
        .with_objective(cli.objective)
        .with_exact(ExactConfig::new().with_time_limit_ms(cli.time_limit_ms));

    let plan = optimize(&demand, &config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    for warning in &plan.warnings {
        eprintln!("Warning: {}", warning);
    }

    if cli.json {
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    print_plan(&plan);
    println!(
        "Total: {} bar{} across {} profile{}",
        plan.bar_count(),
        if plan.bar_count() == 1 { "" } else { "s" },
        plan.summaries.len(),
        if plan.summaries.len() == 1 { "" } else { "s" },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cut() {
        let row = parse_cut("XF55:1450:4").unwrap();
        assert_eq!(row, DemandRow::new("XF55", 1450.0, 4));
        let row = parse_cut("XF55:900.5:2:D01").unwrap();
        assert_eq!(row.door_code.as_deref(), Some("D01"));
        assert_eq!(row.length, 900.5);
        assert!(parse_cut("XF55:1450").is_err());
        assert!(parse_cut("XF55:abc:1").is_err());
        assert!(parse_cut("XF55:1450:-1").is_err());
    }

    #[test]
    fn test_parse_objective() {
        assert_eq!(parse_objective("exact").unwrap(), Objective::Exact);
        assert_eq!(
            parse_objective("flexible").unwrap(),
            Objective::FlexibleMultiLength
        );
        assert!(parse_objective("fastest").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
