use chrono::{Datelike, NaiveDate};

/// Lowercases, strips byte-order/zero-width marks, and collapses internal whitespace.
pub fn normalize_name(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Trims and collapses whitespace while keeping the original casing for display.
pub(crate) fn clean_text(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(clean_text).filter(|value| !value.is_empty())
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%Y/%m/%d"];

/// Birth information parsed from the roll's date-of-birth and birth-year columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ParsedBirth {
    pub(crate) dob: Option<NaiveDate>,
    pub(crate) birth_year: Option<i32>,
}

/// Parses the birth columns. A date column holding only a four digit year is read as a birth year.
pub(crate) fn parse_birth(
    dob: Option<&str>,
    birth_year: Option<&str>,
) -> Result<ParsedBirth, String> {
    let dob = dob.map(str::trim).filter(|value| !value.is_empty());
    let birth_year = birth_year.map(str::trim).filter(|value| !value.is_empty());

    if let Some(raw) = dob {
        if let Some(year) = parse_year(raw) {
            return Ok(ParsedBirth {
                dob: None,
                birth_year: Some(year),
            });
        }
        let date = parse_date(raw).ok_or_else(|| format!("unparseable date of birth '{raw}'"))?;
        return Ok(ParsedBirth {
            dob: Some(date),
            birth_year: Some(date.year()),
        });
    }

    match birth_year {
        Some(raw) => parse_year(raw)
            .map(|year| ParsedBirth {
                dob: None,
                birth_year: Some(year),
            })
            .ok_or_else(|| format!("unparseable birth year '{raw}'")),
        None => Ok(ParsedBirth::default()),
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

fn parse_year(value: &str) -> Option<i32> {
    if value.len() != 4 || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// A date is ambiguous when its day and month could have been transposed on entry.
pub fn is_ambiguous_dob(date: NaiveDate) -> bool {
    date.day() <= 12 && date.month() <= 12
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn normalize_name_removes_whitespace_and_case() {
        assert_eq!(normalize_name("\u{feff}  De  la   CRUZ "), "de la cruz");
        assert_eq!(normalize_name("Muña"), normalize_name("MUÑA"));
    }

    #[test]
    fn day_and_month_both_twelve_or_less_is_ambiguous() {
        assert!(is_ambiguous_dob(date(1990, 3, 5)));
        assert!(is_ambiguous_dob(date(1990, 12, 12)));
        assert!(is_ambiguous_dob(date(1990, 7, 7)));
        assert!(!is_ambiguous_dob(date(1990, 3, 25)));
        assert!(!is_ambiguous_dob(date(1990, 12, 13)));
    }

    #[test]
    fn parse_birth_supports_common_formats() {
        let iso = parse_birth(Some("1985-03-15"), None).expect("iso");
        assert_eq!(iso.dob, Some(date(1985, 3, 15)));
        assert_eq!(iso.birth_year, Some(1985));

        let us = parse_birth(Some("03/15/1985"), None).expect("us");
        assert_eq!(us.dob, Some(date(1985, 3, 15)));

        let dashed = parse_birth(Some("03-15-1985"), Some("1990")).expect("dashed");
        assert_eq!(dashed.birth_year, Some(1985), "dob wins over birth year column");
    }

    #[test]
    fn parse_birth_reads_bare_years() {
        let from_dob_column = parse_birth(Some("1985"), None).expect("year");
        assert_eq!(from_dob_column.dob, None);
        assert_eq!(from_dob_column.birth_year, Some(1985));

        let from_year_column = parse_birth(None, Some(" 1972 ")).expect("year");
        assert_eq!(from_year_column.birth_year, Some(1972));

        assert_eq!(parse_birth(Some(" "), None).expect("blank"), ParsedBirth::default());
    }

    #[test]
    fn parse_birth_rejects_garbage() {
        assert!(parse_birth(Some("15.03.85"), None).is_err());
        assert!(parse_birth(Some("1985-02-30"), None).is_err());
        assert!(parse_birth(None, Some("85")).is_err());
    }
}
