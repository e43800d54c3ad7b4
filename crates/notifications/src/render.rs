//! HTML digest assembly.
//!
//! The body is built as a list of fragments joined at the end, mirroring
//! the markup the application has always sent: a greeting, one
//! `<fieldset>` per project with per-kind headings and lists, a past-due
//! section with its own highlight color, and a footer.
//!
//! The renderer also reports which items it actually showed; muted
//! projects contribute nothing, so their reminders are left untouched by
//! the post-send bookkeeping.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{TimeZone, Utc};

use duewatch_core::{ItemId, ProjectId};
use duewatch_directory::User;
use duewatch_projects::{ItemKind, Project};

use crate::digest::{DigestEntry, ProjectDigest};
use crate::seams::SiteInfo;

const UPCOMING_COLOR: &str = "#E67E22";
const PAST_DUE_COLOR: &str = "#E74C3C";

/// A rendered digest body plus the items it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub html: String,
    pub touched: Vec<(ProjectId, ItemKind, ItemId)>,
}

/// Render one user's digest. `None` when nothing ends up in the body
/// (every project muted or every digest empty).
pub fn render_digest<S: SiteInfo + ?Sized>(
    user: &User,
    digests: &BTreeMap<ProjectId, ProjectDigest>,
    muted: &HashSet<ProjectId>,
    projects: &BTreeMap<ProjectId, Project>,
    milestone_titles: &HashMap<String, String>,
    site: &S,
) -> Option<RenderedDigest> {
    let mut html: Vec<String> = Vec::new();
    let mut touched: Vec<(ProjectId, ItemKind, ItemId)> = Vec::new();

    for (project_id, digest) in digests {
        if muted.contains(project_id) || digest.is_empty() {
            continue;
        }
        let Some(project) = projects.get(project_id) else {
            continue;
        };

        // Greeting goes in front of the first project that survives the
        // mute/empty checks.
        if html.is_empty() {
            html.push(format!("<p>Hello {},</p>", user.name));
            html.push(
                "<p>This email is to remind you about the following due dates:</p>".to_string(),
            );
        }

        html.push("<fieldset>".to_string());
        html.push(format!(
            "<legend><h1><a href=\"{}\">{}</a></h1></legend>",
            project.url, project.title
        ));

        let mut has_upcoming = false;
        for kind in ItemKind::ALL {
            let entries = digest.upcoming.entries(kind);
            if entries.is_empty() {
                continue;
            }
            has_upcoming = true;

            html.push(format!("<h3>{}</h3>", site.item_label_plural(kind)));
            html.push("<ul>".to_string());
            for entry in entries {
                html.push(format!(
                    "<li>{} (<span style=\"color: {}\">{}</span>)</li>",
                    display_title(kind, entry, milestone_titles),
                    UPCOMING_COLOR,
                    format_date(entry.display_timestamp(kind)),
                ));
                touched.push((*project_id, kind, entry.item_id.clone()));
            }
            html.push("</ul>".to_string());
        }

        if digest.past_due_count > 0 {
            if has_upcoming {
                html.push("<hr />".to_string());
            }
            html.push("<h2>Past Due Dates</h2>".to_string());

            for kind in ItemKind::ALL {
                let entries = digest.past_due.entries(kind);
                if entries.is_empty() {
                    continue;
                }

                html.push(format!("<h3>{}</h3>", site.item_label_plural(kind)));
                html.push("<ul>".to_string());
                for entry in entries {
                    html.push(format!(
                        "<li>{} (<small>due date</small> <span style=\"color: {};\">{}</span>)</li>",
                        display_title(kind, entry, milestone_titles),
                        PAST_DUE_COLOR,
                        format_date(entry.display_timestamp(kind)),
                    ));
                    touched.push((*project_id, kind, entry.item_id.clone()));
                }
                html.push("</ul>".to_string());
            }
        }

        html.push("</fieldset>".to_string());
    }

    if html.is_empty() {
        return None;
    }

    html.push("<p>&mdash;</p><p><small>Please do not reply to this message.</small></p>".to_string());

    Some(RenderedDigest {
        html: html.concat(),
        touched,
    })
}

/// Subject line for a digest email.
pub fn digest_subject<S: SiteInfo + ?Sized>(site: &S) -> String {
    format!("{} Notifications About Upcoming Due Dates", site.site_name())
}

fn display_title(
    kind: ItemKind,
    entry: &DigestEntry,
    milestone_titles: &HashMap<String, String>,
) -> String {
    match kind {
        // Milestone items carry a label reference, not a title of their own.
        ItemKind::Milestone => entry
            .milestone
            .as_ref()
            .map(|label| {
                milestone_titles
                    .get(label)
                    .cloned()
                    .unwrap_or_else(|| label.clone())
            })
            .unwrap_or_default(),
        ItemKind::Task | ItemKind::Bug => entry.title.clone().unwrap_or_default(),
    }
}

/// Display form of a stored unix timestamp, e.g. "November 14, 2023".
pub fn format_date(timestamp: Option<i64>) -> String {
    match timestamp.and_then(|ts| Utc.timestamp_opt(ts, 0).single()) {
        Some(dt) => dt.format("%B %-d, %Y").to_string(),
        None => String::new(),
    }
}
