//! Supported site locales

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocaleConfig {
    pub code: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
    pub direction: TextDirection,
}

pub const DEFAULT_LOCALE: &str = "en";

pub const LOCALES: &[LocaleConfig] = &[
    LocaleConfig { code: "en", name: "English", native_name: "English", direction: TextDirection::Ltr },
    LocaleConfig { code: "da", name: "Danish", native_name: "Dansk", direction: TextDirection::Ltr },
    LocaleConfig { code: "de", name: "German", native_name: "Deutsch", direction: TextDirection::Ltr },
    LocaleConfig { code: "uk", name: "Ukrainian", native_name: "Українська", direction: TextDirection::Ltr },
    LocaleConfig { code: "pl", name: "Polish", native_name: "Polski", direction: TextDirection::Ltr },
    LocaleConfig { code: "ro", name: "Romanian", native_name: "Română", direction: TextDirection::Ltr },
    LocaleConfig { code: "ru", name: "Russian", native_name: "Русский", direction: TextDirection::Ltr },
];

pub fn locale_codes() -> impl Iterator<Item = &'static str> {
    LOCALES.iter().map(|locale| locale.code)
}

pub fn locale_config(code: &str) -> Option<&'static LocaleConfig> {
    LOCALES.iter().find(|locale| locale.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_table() {
        let codes: Vec<_> = locale_codes().collect();
        assert_eq!(codes, vec!["en", "da", "de", "uk", "pl", "ro", "ru"]);
        assert!(locale_config(DEFAULT_LOCALE).is_some());
        assert_eq!(locale_config("da").unwrap().native_name, "Dansk");
        assert!(locale_config("fr").is_none());
    }

    #[test]
    fn test_all_locales_are_left_to_right() {
        assert!(LOCALES.iter().all(|l| l.direction == TextDirection::Ltr));
        let json = serde_json::to_value(locale_config("uk").unwrap()).unwrap();
        assert_eq!(json["direction"], "ltr");
        assert_eq!(json["nativeName"], "Українська");
    }
}
