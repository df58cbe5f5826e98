//! Unknown-key warnings for `scope_config.toml`
//!
//! The config has three fixed sections. A misspelled field inside a known
//! section is matched against that section's fields only, and a misspelled
//! section name against the section names, so a suggestion always points at
//! something that can be written in the same place. Warnings never reject a
//! config; serde ignores the unknown keys.

/// Fields accepted in each section.
pub const SECTIONS: &[(&str, &[&str])] = &[
    (
        "time_domain",
        &["title", "capacity", "publish_period_ms", "initial_range"],
    ),
    (
        "spectral",
        &[
            "title",
            "window_size",
            "publish_period_ms",
            "initial_range",
            "sample_rate_hz",
        ],
    ),
    ("autoscale", &["interval_samples", "margin"]),
];

/// Fields of an `initial_range` table.
const RANGE_FIELDS: &[&str] = &["min", "max"];

/// Longest edit distance still offered as a suggestion.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// An unknown key found in a config document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey {
    /// Dotted path as written, e.g. `spectral.windw_size`
    pub path: String,
    /// Dotted path of the closest valid key
    pub suggestion: Option<String>,
}

impl std::fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown config key '{}'", self.path)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

/// Scan a TOML document for keys `ScopeConfig` does not know.
///
/// A document that does not parse yields no warnings; the deserializer
/// reports it instead.
pub fn unknown_keys(raw_toml: &str) -> Vec<UnknownKey> {
    let Ok(toml::Value::Table(root)) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let section_names: Vec<&str> = SECTIONS.iter().map(|(name, _)| *name).collect();
    let mut found = Vec::new();

    for (section, body) in &root {
        let Some(fields) = section_fields(section) else {
            found.push(UnknownKey {
                path: section.clone(),
                suggestion: closest(section, &section_names).map(str::to_string),
            });
            continue;
        };
        let Some(table) = body.as_table() else {
            continue;
        };

        for (field, value) in table {
            let path = format!("{section}.{field}");
            if !fields.contains(&field.as_str()) {
                found.push(UnknownKey {
                    suggestion: closest(field, fields).map(|f| format!("{section}.{f}")),
                    path,
                });
                continue;
            }
            if field == "initial_range" {
                if let Some(range) = value.as_table() {
                    for bound in range.keys() {
                        if !RANGE_FIELDS.contains(&bound.as_str()) {
                            found.push(UnknownKey {
                                path: format!("{path}.{bound}"),
                                suggestion: closest(bound, RANGE_FIELDS)
                                    .map(|b| format!("{path}.{b}")),
                            });
                        }
                    }
                }
            }
        }
    }

    found
}

fn section_fields(section: &str) -> Option<&'static [&'static str]> {
    SECTIONS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, fields)| *fields)
}

/// Nearest candidate within [`MAX_SUGGESTION_DISTANCE`], and strictly closer
/// than rewriting `key` from scratch. Ties go to the earlier candidate.
fn closest<'a>(key: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let limit = MAX_SUGGESTION_DISTANCE.min(key.chars().count().saturating_sub(1));
    candidates
        .iter()
        .map(|c| (*c, edit_distance(key, c)))
        .filter(|(_, d)| *d <= limit)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

/// Levenshtein distance in chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitute = diagonal + usize::from(ca != *cb);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }

    row[b.len()]
}
