//! Console traffic table.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use meter_stats::{TrafficState, TrafficTotals, format_bytes, format_speed};
use tabled::settings::Color;
use tabled::settings::object::Rows;
use tabled::{Table, Tabled};

/// Clear screen and move the cursor home.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Tabled)]
struct TrafficRow {
    #[tabled(rename = "Identity")]
    identity: String,
    #[tabled(rename = "Uplink")]
    uplink: String,
    #[tabled(rename = "Downlink")]
    downlink: String,
    #[tabled(rename = "Up Speed")]
    uplink_speed: String,
    #[tabled(rename = "Down Speed")]
    downlink_speed: String,
    #[tabled(rename = "Total")]
    total: String,
}

impl TrafficRow {
    fn new(identity: String, up: u64, down: u64, up_speed: f64, down_speed: f64) -> Self {
        Self {
            identity,
            uplink: format_bytes(up),
            downlink: format_bytes(down),
            uplink_speed: format_speed(up_speed),
            downlink_speed: format_speed(down_speed),
            total: format_bytes(up.saturating_add(down)),
        }
    }
}

/// Render the header line, table and legend for one poll.
///
/// Rows are ordered by combined speed, fastest first, then by identity descending.
/// Active identities are printed in green.
pub fn render_table(
    users: &HashMap<String, TrafficState>,
    totals: &TrafficTotals,
    unix_secs: u64,
) -> String {
    let mut entries: Vec<(&String, &TrafficState)> = users.iter().collect();
    entries.sort_by(|(a_id, a), (b_id, b)| {
        let a_speed = a.uplink_speed + a.downlink_speed;
        let b_speed = b.uplink_speed + b.downlink_speed;
        b_speed
            .partial_cmp(&a_speed)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b_id.cmp(a_id))
    });

    let active_rows: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, (_, s))| s.is_active())
        .map(|(i, _)| i + 1)
        .collect();
    let active = active_rows.len();

    let mut rows: Vec<TrafficRow> = entries
        .into_iter()
        .map(|(identity, s)| {
            TrafficRow::new(
                identity.clone(),
                s.uplink,
                s.downlink,
                s.uplink_speed,
                s.downlink_speed,
            )
        })
        .collect();
    rows.push(TrafficRow::new(
        "TOTAL".to_string(),
        totals.uplink,
        totals.downlink,
        totals.uplink_speed,
        totals.downlink_speed,
    ));

    let mut table = Table::new(rows);
    // Row 0 is the header.
    for row in active_rows {
        table.modify(Rows::single(row), Color::FG_GREEN);
    }

    format!(
        "Xray traffic  {} UTC  {} identities, {} active\n{}\n{}",
        clock(unix_secs),
        users.len(),
        active,
        table,
        legend(),
    )
}

/// Clear the terminal and print the table to stdout.
pub fn print_table(users: &HashMap<String, TrafficState>, totals: &TrafficTotals) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    println!("{CLEAR_SCREEN}{}", render_table(users, totals, now));
}

fn legend() -> String {
    let green = Color::FG_GREEN;
    format!(
        "Legend: {}green{} = active, plain = idle",
        green.get_prefix(),
        green.get_suffix()
    )
}

/// `HH:MM:SS` of a unix timestamp.
fn clock(unix_secs: u64) -> String {
    let secs = unix_secs % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}
