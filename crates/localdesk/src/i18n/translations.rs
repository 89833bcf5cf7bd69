//! Translation-file verification for the landing page

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use super::locales::{locale_codes, DEFAULT_LOCALE};

/// Keys the landing page cannot render without.
pub const REQUIRED_KEYS: &[&str] = &[
    "HomePage.Hero.established",
    "HomePage.Hero.advisor",
    "HomePage.Hero.heritage",
    "HomePage.Hero.title",
    "HomePage.Hero.titleDenmark",
    "HomePage.Hero.titleFeelLikeHome",
    "HomePage.Hero.missionLabel",
    "HomePage.Hero.missionTitle",
    "HomePage.Hero.missionTitleEmphasis",
    "HomePage.Hero.missionTitleEnd",
    "HomePage.Hero.description",
    "HomePage.Hero.cta",
    "HomePage.Hero.topicSkat",
    "HomePage.Hero.topicVisas",
    "HomePage.Hero.topicSiri",
    "HomePage.Hero.topicHousing",
    "HomePage.Features.sectionLabel",
    "HomePage.Features.title",
    "HomePage.Features.titleEmphasis",
    "HomePage.Features.titleEnd",
    "HomePage.Features.madeFor",
    "HomePage.Features.feature1.id",
    "HomePage.Features.feature1.category",
    "HomePage.Features.feature1.title",
    "HomePage.Features.feature1.description",
    "HomePage.Features.feature2.id",
    "HomePage.Features.feature2.category",
    "HomePage.Features.feature2.title",
    "HomePage.Features.feature2.description",
    "HomePage.Features.feature3.id",
    "HomePage.Features.feature3.category",
    "HomePage.Features.feature3.title",
    "HomePage.Features.feature3.description",
    "HomePage.Features.feature4.id",
    "HomePage.Features.feature4.category",
    "HomePage.Features.feature4.title",
    "HomePage.Features.feature4.description",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct LocaleReport {
    pub locale: String,
    pub load_error: Option<String>,
    pub missing_required: Vec<String>,
    /// Leaf keys of the reference locale absent here
    pub missing_from_reference: Vec<String>,
}

impl LocaleReport {
    pub fn is_complete(&self) -> bool {
        self.load_error.is_none() && self.missing_required.is_empty() && self.missing_from_reference.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub locales: Vec<LocaleReport>,
    pub keys_checked: usize,
}

impl TranslationReport {
    pub fn is_complete(&self) -> bool {
        self.locales.iter().all(LocaleReport::is_complete)
    }
}

pub fn load_messages(dir: &Path, locale: &str) -> anyhow::Result<Value> {
    let path = dir.join(format!("{}.json", locale));
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), e))
}

/// Follows a dotted key path through nested objects.
pub fn resolve<'a>(messages: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(messages, |node, part| node.get(part))
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Dotted paths of every non-object value.
pub fn leaf_keys(messages: &Value) -> Vec<String> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() { key.clone() } else { format!("{}.{}", prefix, key) };
                    walk(&path, child, out);
                }
            }
            _ if !prefix.is_empty() => out.push(prefix.to_string()),
            _ => {}
        }
    }
    let mut keys = Vec::new();
    walk("", messages, &mut keys);
    keys
}

/// Checks every supported locale in `dir` against `required` and against
/// the reference locale's key set.
pub fn verify_translations(dir: &Path, required: &[&str]) -> TranslationReport {
    let reference_keys = match load_messages(dir, DEFAULT_LOCALE) {
        Ok(messages) => leaf_keys(&messages),
        Err(e) => {
            warn!("Reference locale unavailable, skipping key comparison: {}", e);
            Vec::new()
        }
    };

    let locales = locale_codes()
        .map(|locale| {
            let mut report = LocaleReport { locale: locale.to_string(), ..Default::default() };
            match load_messages(dir, locale) {
                Ok(messages) => {
                    report.missing_required = required
                        .iter()
                        .filter(|key| !is_present(resolve(&messages, key)))
                        .map(|key| key.to_string())
                        .collect();
                    if locale != DEFAULT_LOCALE {
                        report.missing_from_reference = reference_keys
                            .iter()
                            .filter(|key| resolve(&messages, key).is_none())
                            .cloned()
                            .collect();
                    }
                    debug!("{}: {} required missing, {} reference keys missing",
                        locale, report.missing_required.len(), report.missing_from_reference.len());
                }
                Err(e) => report.load_error = Some(e.to_string()),
            }
            report
        })
        .collect();

    TranslationReport { locales, keys_checked: required.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_messages() -> Value {
        let mut root = json!({});
        for key in REQUIRED_KEYS {
            let mut node = &mut root;
            let parts: Vec<&str> = key.split('.').collect();
            for part in &parts[..parts.len() - 1] {
                node = node.as_object_mut().unwrap().entry(*part).or_insert_with(|| json!({}));
            }
            node[parts[parts.len() - 1]] = json!("text");
        }
        root
    }

    fn write_all(dir: &Path, messages: &Value) {
        for locale in locale_codes() {
            std::fs::write(dir.join(format!("{}.json", locale)), messages.to_string()).unwrap();
        }
    }

    #[test]
    fn test_resolve_dotted_keys() {
        let messages = json!({ "HomePage": { "Hero": { "cta": "Start" } } });
        assert_eq!(resolve(&messages, "HomePage.Hero.cta"), Some(&json!("Start")));
        assert_eq!(resolve(&messages, "HomePage.Hero.missing"), None);
        assert_eq!(resolve(&messages, "HomePage.Hero.cta.deeper"), None);
    }

    #[test]
    fn test_leaf_keys() {
        let messages = json!({ "A": { "b": "x", "c": { "d": 1 } }, "E": "y" });
        let mut keys = leaf_keys(&messages);
        keys.sort();
        assert_eq!(keys, vec!["A.b", "A.c.d", "E"]);
    }

    #[test]
    fn test_complete_translations_pass() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path(), &complete_messages());

        let report = verify_translations(dir.path(), REQUIRED_KEYS);

        assert!(report.is_complete());
        assert_eq!(report.locales.len(), 7);
        assert_eq!(report.keys_checked, REQUIRED_KEYS.len());
    }

    #[test]
    fn test_empty_and_missing_values_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path(), &complete_messages());
        let mut danish = complete_messages();
        danish["HomePage"]["Hero"]["cta"] = json!("");
        danish["HomePage"]["Features"]["feature4"]
            .as_object_mut()
            .unwrap()
            .remove("title");
        std::fs::write(dir.path().join("da.json"), danish.to_string()).unwrap();
        std::fs::remove_file(dir.path().join("ru.json")).unwrap();

        let report = verify_translations(dir.path(), REQUIRED_KEYS);

        assert!(!report.is_complete());
        let da = report.locales.iter().find(|l| l.locale == "da").unwrap();
        assert_eq!(da.missing_required, vec!["HomePage.Hero.cta", "HomePage.Features.feature4.title"]);
        assert_eq!(da.missing_from_reference, vec!["HomePage.Features.feature4.title"]);
        let ru = report.locales.iter().find(|l| l.locale == "ru").unwrap();
        assert!(ru.load_error.is_some());
        assert!(report.locales.iter().find(|l| l.locale == "de").unwrap().is_complete());
    }
}
