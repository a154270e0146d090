//! Lists the deterministic rule table and the category taxonomy.

use anyhow::Result;
use clap::Args;
use colored::*;
use pyguard_engine::{Category, RULES};

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Machine-readable output
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: RulesArgs) -> Result<()> {
    if args.json {
        let rules: Vec<_> = RULES
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "id": rule.id,
                    "category": rule.category.as_str(),
                    "severity": rule.severity.as_str(),
                    "confidence": rule.confidence,
                    "summary": rule.summary,
                })
            })
            .collect();
        let taxonomy: Vec<_> = Category::TAXONOMY.iter().map(|c| c.as_str().to_string()).collect();
        let output = serde_json::json!({ "rules": rules, "taxonomy": taxonomy });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Deterministic rules".bold());
    println!("{}", "─".repeat(78));
    for rule in RULES {
        println!(
            "{:<20} {:<24} {:<10} {}",
            rule.id,
            rule.category.as_str(),
            rule.severity.to_string().color(rule.severity.color()),
            rule.summary
        );
    }

    println!("\n{}", "Finding taxonomy".bold());
    println!("{}", "─".repeat(78));
    for category in &Category::TAXONOMY {
        println!("  {}", category.as_str());
    }
    println!(
        "\nThe model pass reports against the same taxonomy; categories it\n\
         invents are kept verbatim at reduced confidence. Parse and response\n\
         problems surface as the synthetic categories {} and {}.",
        Category::Unparseable.as_str(),
        Category::ModelResponseError.as_str()
    );

    Ok(())
}
