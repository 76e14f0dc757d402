//! Generate command presentation.

use crate::generation::GenerateOutcome;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_generate_outcome(outcome: &GenerateOutcome) -> String {
    let mut out = String::new();
    match outcome {
        GenerateOutcome::Single(records) => {
            out.push_str(&format!("{}\n", "Generated".bold().underline()));
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Id", "Credits", "Url"]);
            for record in records {
                table.add_row(vec![
                    record.id.to_string(),
                    record.credits_used.to_string(),
                    record.url.clone().unwrap_or_default(),
                ]);
            }
            out.push_str(&format!("{}\n", table));
        }
        GenerateOutcome::Pipeline(summary) => {
            out.push_str(&format!(
                "{} {} ({} steps, {} variations, {} credits)\n",
                "Pipeline".bold().underline(),
                summary.chain_id,
                summary.total_steps,
                summary.total_variations,
                summary.credits_used
            ));
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Step", "Var", "Final", "Url"]);
            for record in &summary.records {
                let Some(chain) = &record.chain else {
                    continue;
                };
                table.add_row(vec![
                    format!("{}/{}", chain.step_number, chain.total_steps),
                    format!("{}/{}", chain.variation_index + 1, chain.total_variations),
                    if chain.is_final { "yes" } else { "" }.to_string(),
                    record.url.clone().unwrap_or_default(),
                ]);
            }
            out.push_str(&format!("{}\n", table));
        }
    }
    out
}
