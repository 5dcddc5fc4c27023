//! Renders scored candidates into the context block handed to a prompt.


use std::fmt::Write as _;

use crate::models::{CompanyRecord, ScoredCandidate};

/// Returned by [`render`] when there is nothing to show
pub const NO_SIMILAR_COMPANIES: &str = "No similar companies found in the knowledge base.";

const HEADER: &str = "Similar companies in our database:";

fn or_not_available(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Render one numbered block per candidate, in input order.
///
/// An empty slice renders [`NO_SIMILAR_COMPANIES`].
#[inline]
pub fn render(candidates: &[ScoredCandidate]) -> String {
    if candidates.is_empty() {
        return NO_SIMILAR_COMPANIES.to_string();
    }

    let mut context = format!("{}\n", HEADER);
    for (position, candidate) in candidates.iter().enumerate() {
        let record = &candidate.record;
        let _ = write!(
            context,
            "\n{}. {} ({})\n",
            position + 1,
            record.name,
            or_not_available(&record.industry)
        );
        let _ = writeln!(
            context,
            "   - Business Model: {}",
            or_not_available(&record.business_model)
        );
        let _ = writeln!(
            context,
            "   - Key Advantage: {}",
            or_not_available(&record.competitive_advantage)
        );
        let _ = writeln!(
            context,
            "   - Monetization: {}",
            or_not_available(&record.monetization)
        );
        let _ = writeln!(
            context,
            "   - Key Metrics: {}",
            or_not_available(&record.key_metrics)
        );
        let _ = writeln!(
            context,
            "   - Relevance Score: {}/10",
            candidate.relevance_score
        );
    }

    context
}

/// Full detail block for a single record, as returned by the search tool
#[inline]
pub fn render_record(record: &CompanyRecord) -> String {
    let mut block = format!("{} ({})\n", record.name, or_not_available(&record.industry));

    let funding = match (&record.funding_amount, &record.funding_stage, &record.year) {
        (None, None, None) => None,
        (amount, stage, year) => {
            let details: Vec<&str> = [stage, year]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect();
            let amount = amount.as_deref().unwrap_or("Undisclosed");
            Some(if details.is_empty() {
                amount.to_string()
            } else {
                format!("{} ({})", amount, details.join(", "))
            })
        }
    };
    if let Some(funding) = funding {
        let _ = writeln!(block, "Funding: {}", funding);
    }

    for (label, value) in [
        ("Problem", &record.problem),
        ("Solution", &record.solution),
        ("Business Model", &record.business_model),
        ("Target Market", &record.target_market),
        ("Competitive Advantage", &record.competitive_advantage),
        ("Key Metrics", &record.key_metrics),
    ] {
        let _ = writeln!(block, "{}: {}", label, or_not_available(value));
    }

    if !record.success_factors.is_empty() {
        let _ = writeln!(block, "Success Factors: {}", record.success_factors.join(", "));
    }
    if !record.lessons.is_empty() {
        let _ = writeln!(block, "Key Lessons: {}", record.lessons);
    }
    if let Some(source) = &record.source_document {
        let _ = writeln!(
            block,
            "Source: {} (chunk {})",
            source.file_name, source.chunk_index
        );
    }

    block
}
