use crate::config::ReconciliationConfig;

/// Reduces phone numbers to a comparable national form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNormalizer {
    country_prefix: String,
    national_number_length: usize,
}

impl PhoneNormalizer {
    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            country_prefix: config.country_prefix.clone(),
            national_number_length: config.national_number_length,
        }
    }

    /// Strips non-digits, then the country prefix when a full national number follows it.
    ///
    /// Returns `None` when no digits remain, so two missing phones never compare equal.
    pub fn normalize(&self, raw: Option<&str>) -> Option<String> {
        let digits: String = raw?.chars().filter(char::is_ascii_digit).collect();
        let prefix = self.country_prefix.as_str();

        let national = if !prefix.is_empty()
            && digits.starts_with(prefix)
            && digits.len() >= prefix.len() + self.national_number_length
        {
            &digits[prefix.len()..]
        } else {
            digits.as_str()
        };

        if national.is_empty() {
            None
        } else {
            Some(national.to_string())
        }
    }
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new(&ReconciliationConfig::default())
    }
}
