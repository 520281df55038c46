pub mod env_reader;
pub mod exif;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Fixed-width UTC timestamp with microseconds, so that lexicographic order of
/// stored values matches chronological order.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    at.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    ))
    .or_else(|_| at.format(&Rfc3339))
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamps_are_fixed_width_utc() {
        assert_eq!(
            format_timestamp(datetime!(2024-03-04 05:06:07.5 +02:00)),
            "2024-03-04T03:06:07.500000Z"
        );
        assert!(
            format_timestamp(datetime!(2024-03-04 05:06:07 UTC))
                < format_timestamp(datetime!(2024-03-04 05:06:07.000001 UTC))
        );
    }
}
