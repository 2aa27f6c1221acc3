use std::io::Write;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::Result;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: impl AsRef<Path>, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Local time as RFC 3339, UTC when the local offset cannot be determined.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Report wrapper stamped with the time it was written.
#[derive(Serialize)]
struct Stamped<'a, T: Serialize> {
    timestamp: String,
    #[serde(flatten)]
    report: &'a T,
}

/// Writes a JSON report with a `timestamp` field prepended.
pub fn write_report<T: Serialize>(output_path: impl AsRef<Path>, report: &T) -> Result<()> {
    object_to_json(
        output_path,
        &Stamped {
            timestamp: timestamp(),
            report,
        },
    )
}
