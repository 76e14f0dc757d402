//! Gallery command presentation: list and stats.

use crate::error::GenerationError;
use crate::gallery::{GalleryStore, GenerationRecord};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde_json::json;

pub fn format_gallery_text(records: &[GenerationRecord]) -> String {
    if records.is_empty() {
        return "Gallery is empty.\n\nUse 'genchain generate' to create images.".to_string();
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Id", "Created", "Chain", "Credits", "Tags", "Url"]);
    for record in records {
        let chain = record
            .chain
            .as_ref()
            .map(|c| {
                format!(
                    "{} s{}/{} v{}",
                    c.chain_id,
                    c.step_number,
                    c.total_steps,
                    c.variation_index
                )
            })
            .unwrap_or_default();
        table.add_row(vec![
            record.id.to_string(),
            record.created_at.format("%Y-%m-%d %H:%M").to_string(),
            chain,
            record.credits_used.to_string(),
            record.tags.join(", "),
            record.url.clone().unwrap_or_else(|| "(pending)".to_string()),
        ]);
    }
    format!("{}\n\nTotal: {} record(s)", table, records.len())
}

pub fn format_gallery_json(records: &[GenerationRecord]) -> Result<String, GenerationError> {
    let out = json!({ "records": records, "total": records.len() });
    serde_json::to_string_pretty(&out)
        .map_err(|e| GenerationError::InvalidResponse(format!("Failed to render json: {}", e)))
}

pub fn format_gallery_stats_text(gallery: &dyn GalleryStore) -> String {
    let chains = gallery.unique_chains();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Images".to_string(), gallery.total_images().to_string()]);
    table.add_row(vec![
        "Credits used".to_string(),
        gallery.total_credits_used().to_string(),
    ]);
    table.add_row(vec!["Chains".to_string(), chains.len().to_string()]);
    table.to_string()
}
