use chrono::{DateTime, Utc};

use crate::batch::GeneratedCode;

/// Full codes one per line, in issue order, without a trailing newline.
pub fn to_plain_text(codes: &[GeneratedCode]) -> String {
    codes
        .iter()
        .map(|code| code.full_code.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("ean13-codes-{}.txt", now.format("%Y%m%d-%H%M%S"))
}
