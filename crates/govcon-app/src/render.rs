//! Plain-text rendering of the dashboard and RFP summaries.

use govcon_core::{DueUrgency, Opportunity, RfpSummary, NO_DUE_DATE_DAYS};

use crate::controller::{DashboardView, OpportunityCard};

const NOT_SPECIFIED: &str = "Not specified";

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn render_dashboard(view: &DashboardView) -> String {
    if let Some(error) = &view.error {
        return finish(vec![
            "Failed to load opportunities".to_string(),
            format!("  {}", error.message),
            "  Run the command again to retry.".to_string(),
        ]);
    }

    let stats = &view.stats;
    let search = if view.search.is_empty() {
        String::new()
    } else {
        format!("  search: \"{}\"", view.search)
    };
    let mut lines = vec![
        format!(
            "Total: {}  High matches: {}  Due in 14 days: {}  Saved: {}",
            stats.total_opportunities, stats.high_matches, stats.due_soon, stats.saved_count
        ),
        format!("Tab: {} ({} shown){search}", view.tab, view.cards.len()),
        String::new(),
    ];

    if view.cards.is_empty() {
        lines.push(if view.loading {
            "Loading opportunities...".to_string()
        } else {
            "No opportunities match the current view.".to_string()
        });
        return finish(lines);
    }

    for card in &view.cards {
        card_lines(&mut lines, card);
    }
    finish(lines)
}

fn card_lines(lines: &mut Vec<String>, card: &OpportunityCard) {
    let opp = &card.opportunity;
    let marker = if card.saved { "*" } else { " " };
    lines.push(format!("[{marker}] {:<10} {}", opp.match_label(), opp.display_title()));
    lines.push(format!(
        "    {} | due {} ({}) | id {}",
        opp.display_agency(),
        opp.display_due_date(),
        due_phrase(card),
        opp.id
    ));
    if card.expanded {
        detail_lines(lines, opp);
    }
    lines.push(String::new());
}

fn due_phrase(card: &OpportunityCard) -> String {
    match card.urgency {
        DueUrgency::NoDueDate => DueUrgency::NoDueDate.label().to_string(),
        DueUrgency::PastDue => DueUrgency::PastDue.label().to_string(),
        urgency if card.days_until_due < NO_DUE_DATE_DAYS => {
            let unit = if card.days_until_due == 1 { "day" } else { "days" };
            format!("{} {unit}, {}", card.days_until_due, urgency.label())
        }
        urgency => urgency.label().to_string(),
    }
}

fn field(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(NOT_SPECIFIED)
}

fn detail_lines(lines: &mut Vec<String>, opp: &Opportunity) {
    let naics = match (opp.naics.as_deref(), opp.naics_description.as_deref()) {
        (Some(code), Some(desc)) => format!("{code} - {desc}"),
        (Some(code), None) => code.to_string(),
        (None, Some(desc)) => desc.to_string(),
        (None, None) => NOT_SPECIFIED.to_string(),
    };
    let contact = opp.contact_info.clone().unwrap_or_default();
    let mut rows = vec![
        ("Office", field(opp.office.as_deref()).to_string()),
        ("Solicitation", field(opp.solicitation_number.as_deref()).to_string()),
        ("Notice type", field(opp.notice_type.as_deref()).to_string()),
        ("NAICS", naics),
        ("Set-aside", field(opp.set_aside_type.as_deref()).to_string()),
        ("Est. value", field(opp.estimated_value.as_deref()).to_string()),
        ("Place", field(opp.place_of_performance.as_deref()).to_string()),
        ("Posted", field(opp.posted_date.as_deref()).to_string()),
        (
            "Contact",
            format!(
                "{} / {} / {}",
                field(contact.name.as_deref()),
                field(contact.email.as_deref()),
                field(contact.phone.as_deref())
            ),
        ),
    ];
    if let Some(info) = &opp.additional_info {
        rows.push((
            "Additional",
            format!(
                "class {} / org {} / state {}",
                field(info.classification_code.as_deref()),
                field(info.organization_type.as_deref()),
                field(info.state.as_deref())
            ),
        ));
    }
    rows.push(("Description", field(opp.description.as_deref()).to_string()));
    if let Some(url) = opp.url.as_deref() {
        rows.push(("Link", url.to_string()));
    }
    lines.extend(rows.into_iter().map(|(label, value)| format!("      {label:<13} {value}")));
}

/// Summary sections; absent fields render as empty.
pub fn render_summary(summary: Option<&RfpSummary>) -> String {
    let Some(summary) = summary else {
        return finish(vec!["No summary available.".to_string()]);
    };
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let mut lines = vec![
        format!("Title:        {}", text(&summary.opportunity_title)),
        format!("Agency:       {}", text(&summary.agency)),
        format!("Due date:     {}", text(&summary.due_date)),
        format!("Summary:      {}", text(&summary.summary)),
    ];
    for (label, items) in [
        ("Evaluation criteria:", &summary.evaluation_criteria),
        ("Key requirements:", &summary.key_requirements),
    ] {
        lines.push(label.to_string());
        lines.extend(items.iter().map(|item| format!("  - {item}")));
    }
    finish(lines)
}
