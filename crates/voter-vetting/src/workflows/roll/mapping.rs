use super::normalizer::normalize_name;
use std::collections::HashMap;
use std::sync::OnceLock;

static COLUMN_MAP: OnceLock<HashMap<String, &'static str>> = OnceLock::new();

pub(crate) const FIRST_NAME: &str = "first_name";
pub(crate) const LAST_NAME: &str = "last_name";

/// Maps a header as exported by the elections office to its canonical column name.
pub(crate) fn canonical_column(header: &str) -> Option<&'static str> {
    column_map().get(&normalize_header(header)).copied()
}

fn normalize_header(header: &str) -> String {
    normalize_name(&header.replace(['_', '.'], " "))
}

fn column_map() -> &'static HashMap<String, &'static str> {
    COLUMN_MAP.get_or_init(|| {
        const HEADER_TO_COLUMN: &[(&str, &str)] = &[
            ("first_name", FIRST_NAME),
            ("First Name", FIRST_NAME),
            ("FName", FIRST_NAME),
            ("Given Name", FIRST_NAME),
            ("last_name", LAST_NAME),
            ("Last Name", LAST_NAME),
            ("LName", LAST_NAME),
            ("Surname", LAST_NAME),
            ("Family Name", LAST_NAME),
            ("dob", "dob"),
            ("DOB", "dob"),
            ("Date of Birth", "dob"),
            ("Birth Date", "dob"),
            ("Birthdate", "dob"),
            ("birth_year", "birth_year"),
            ("Birth Year", "birth_year"),
            ("Year of Birth", "birth_year"),
            ("YOB", "birth_year"),
            ("jurisdiction_name", "jurisdiction_name"),
            ("Jurisdiction", "jurisdiction_name"),
            ("Village", "jurisdiction_name"),
            ("Precinct", "jurisdiction_name"),
            ("District", "jurisdiction_name"),
            ("registration_number", "registration_number"),
            ("Registration Number", "registration_number"),
            ("Reg No", "registration_number"),
            ("Voter ID", "registration_number"),
            ("Voter Number", "registration_number"),
        ];

        let mut map = HashMap::with_capacity(HEADER_TO_COLUMN.len());
        for (header, column) in HEADER_TO_COLUMN {
            map.insert(normalize_header(header), *column);
        }
        map
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_export_headers() {
        assert_eq!(canonical_column("First Name"), Some("first_name"));
        assert_eq!(canonical_column("\u{feff}FNAME"), Some("first_name"));
        assert_eq!(canonical_column("date_of_birth"), Some("dob"));
        assert_eq!(canonical_column(" Village "), Some("jurisdiction_name"));
        assert_eq!(canonical_column("Voter ID"), Some("registration_number"));
        assert_eq!(canonical_column("Party"), None);
    }
}
