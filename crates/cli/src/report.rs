//! Farmer-facing field report

use matengine_core::{FieldAnalysis, StressLabel, TrendLabel};
use std::fmt::Write;

/// Advice for the field walk, from the stress label and signature trend.
pub fn recommendation(analysis: &FieldAnalysis) -> &'static str {
    let declining = matches!(
        analysis.trend.as_ref().map(|t| t.label),
        Some(TrendLabel::Declining)
    );
    match (analysis.stress_label, declining) {
        (StressLabel::Healthy, _) => {
            "Field looks strong. Focus on routine scouting and plan the next irrigation window."
        }
        (StressLabel::Emerging, false) => {
            "Early deviation from the seasonal pattern. Keep the field on the next scouting round."
        }
        (StressLabel::Emerging, true) => {
            "Early stress signs with a declining index trend. Scout the field within the week."
        }
        (StressLabel::Moderate, true) => {
            "Moderate stress with a declining index trend. Schedule a scouting pass in the next 48 hours."
        }
        (StressLabel::Moderate, false) => {
            "Moderate stress. Validate irrigation and tissue samples before the next weather swing."
        }
        (StressLabel::Severe, true) => {
            "High stress and a falling index. Walk the field now and check water, pests and equipment."
        }
        (StressLabel::Severe, false) => {
            "High stress but a stable index. Prioritize targeted scouting and review fertigation plans."
        }
    }
}

/// Trend line for the report, e.g. `-0.080 over 4 scene(s) (20 days, declining)`.
pub fn trend_line(analysis: &FieldAnalysis) -> String {
    match &analysis.trend {
        Some(t) => format!(
            "{:+.3} over {} scene(s) ({} days, {})",
            t.delta, t.window, t.days, t.label
        ),
        None => "n/a".to_string(),
    }
}

/// Markdown report for one analysis.
pub fn markdown(analysis: &FieldAnalysis) -> String {
    let mut out = String::new();
    let signature = &analysis.temporal_signature;
    let latest = signature.last().copied().unwrap_or(f64::NAN);
    let lo = signature.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = signature.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let dates: Vec<String> = analysis.dates.iter().map(|d| d.to_string()).collect();
    let first_mode = analysis.explained_variance.first().copied().unwrap_or(0.0);

    let _ = writeln!(out, "# Field Report · {}", analysis.field_id);
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Date:** {}", analysis.date);
    let _ = writeln!(
        out,
        "- **Health score:** {:.2} ({}, z = {:.2})",
        analysis.health_score, analysis.stress_label, analysis.z_score
    );
    let _ = writeln!(out, "- **Latest index:** {:.2}", latest);
    let _ = writeln!(out, "- **Index range:** {:.2} – {:.2}", lo, hi);
    let _ = writeln!(out, "- **Trend:** {}", trend_line(analysis));
    let _ = writeln!(out, "- **Scenes:** {} ({})", dates.len(), dates.join(", "));
    let _ = writeln!(
        out,
        "- **SVD rank:** {} (first mode captures {:.1}% of variance)",
        analysis.chosen_rank,
        first_mode * 100.0
    );
    if !analysis.warnings.is_empty() {
        let _ = writeln!(out, "- **Warnings:** {}", analysis.warnings.len());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "## Recommendation");
    let _ = writeln!(out, "{}", recommendation(analysis));
    out
}
