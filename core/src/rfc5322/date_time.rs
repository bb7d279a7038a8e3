/*
 * date_time.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Plico, a MIME message parsing and formatting library.
 *
 * Plico is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Plico is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Plico.  If not, see <http://www.gnu.org/licenses/>.
 */

//! RFC 5322 date parsing, including the obsolete forms of section 4.3:
//! two-digit years, named timezones and comments.

use chrono::{DateTime, FixedOffset, NaiveDateTime};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const OBSOLETE_ZONES: [(&str, &str); 11] = [
    ("UT", "+0000"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
];

/// Parse a Date header value, falling back through the obsolete grammar.
/// Returns `None` when nothing date-shaped can be recovered.
pub fn parse_date_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = strip_comments(value);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(cleaned) {
        return Some(dt);
    }
    parse_obsolete(cleaned)
}

/// Format for a Date header.
pub fn format_date_time(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc2822()
}

/// Remove `(comments)`, which chrono does not understand.
fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    let mut escaped = false;
    for c in value.chars() {
        if depth > 0 {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '(' {
                depth += 1;
            } else if c == ')' {
                depth -= 1;
            }
        } else if c == '(' {
            depth += 1;
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_obsolete(value: &str) -> Option<DateTime<FixedOffset>> {
    let mut tokens: Vec<String> = value.split_whitespace().map(str::to_owned).collect();
    if tokens.is_empty() {
        return None;
    }
    // Drop the optional day-of-week so one set of formats covers both.
    if tokens[0].ends_with(',') || tokens.first().map(|t| t.as_str()) == Some(",") {
        tokens.remove(0);
    } else if tokens.len() > 1 && tokens[1] == "," {
        tokens.drain(..2);
    }
    expand_two_digit_year(&mut tokens);
    convert_obsolete_zone(&mut tokens);

    let text = tokens.join(" ");
    for format in ["%d %b %Y %H:%M:%S %z", "%d %b %Y %H:%M %z"] {
        if let Ok(dt) = DateTime::parse_from_str(&text, format) {
            return Some(dt);
        }
    }
    // No zone at all: read as UTC.
    for format in ["%d %b %Y %H:%M:%S", "%d %b %Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    None
}

/// `97` becomes `1997`, `04` becomes `2004`. The year is the token after
/// the month name.
fn expand_two_digit_year(tokens: &mut [String]) {
    let month = tokens
        .iter()
        .position(|t| MONTHS.iter().any(|m| m.eq_ignore_ascii_case(t)));
    if let Some(i) = month {
        if let Some(year) = tokens.get(i + 1) {
            if year.len() == 2 && year.bytes().all(|b| b.is_ascii_digit()) {
                let century = if year.as_str() < "50" { "20" } else { "19" };
                tokens[i + 1] = format!("{century}{year}");
            }
        }
    }
}

/// Replace a trailing named zone with its numeric offset. Unknown
/// single-letter military zones read as +0000, as RFC 5322 directs.
fn convert_obsolete_zone(tokens: &mut [String]) {
    if let Some(last) = tokens.last_mut() {
        for (name, numeric) in OBSOLETE_ZONES {
            if name.eq_ignore_ascii_case(last) {
                *last = numeric.to_owned();
                return;
            }
        }
        if last.len() == 1 && last.bytes().all(|b| b.is_ascii_alphabetic()) {
            *last = "+0000".to_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_dates_parse() {
        let dt = parse_date_time("Tue, 1 Jul 2003 10:52:37 +0200").unwrap();
        assert_eq!(dt.to_rfc2822(), "Tue, 1 Jul 2003 10:52:37 +0200");
    }

    #[test]
    fn comments_are_ignored() {
        let dt = parse_date_time("Thu, 13 Feb 1969 23:32:00 -0330 (Newfoundland Time)").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -(3 * 3600 + 30 * 60));
    }

    #[test]
    fn two_digit_years_expand() {
        let dt = parse_date_time("25 Dec 97 10:30:00 GMT").unwrap();
        assert_eq!(dt.format("%Y").to_string(), "1997");
        let dt = parse_date_time("25 Dec 04 10:30:00 GMT").unwrap();
        assert_eq!(dt.format("%Y").to_string(), "2004");
    }

    #[test]
    fn named_zones_convert() {
        let dt = parse_date_time("Mon, 6 Jan 2020 08:00:00 PST").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -8 * 3600);
    }

    #[test]
    fn missing_seconds_and_zone_still_parse() {
        let dt = parse_date_time("6 Jan 2020 08:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!(dt.format("%H:%M:%S").to_string(), "08:00:00");
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_date_time("not a date").is_none());
        assert!(parse_date_time("").is_none());
    }
}
