//! Locales and translation-file checks
pub mod locales;
pub mod translations;

pub use locales::{locale_config, LocaleConfig, DEFAULT_LOCALE, LOCALES};
pub use translations::{verify_translations, TranslationReport, REQUIRED_KEYS};
