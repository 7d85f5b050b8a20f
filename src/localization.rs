use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::OnceLock;
use unic_langid::LanguageIdentifier;

/// Languages with a message catalog, in fallback order
pub const SUPPORTED_LANGUAGES: &[&str] = &["ru", "en"];

/// Language used when the user's language is unknown or unsupported
pub const DEFAULT_LANGUAGE: &str = "ru";

const CATALOGS: &[(&str, &str)] = &[
    ("ru", include_str!("../locales/ru/main.ftl")),
    ("en", include_str!("../locales/en/main.ftl")),
];

/// Localization manager for the currency bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
    default_language: String,
}

impl LocalizationManager {
    /// Create a manager falling back to [`DEFAULT_LANGUAGE`]
    pub fn new() -> Result<Self> {
        Self::with_default_language(DEFAULT_LANGUAGE)
    }

    /// Create a manager with a specific fallback language
    pub fn with_default_language(default_language: &str) -> Result<Self> {
        if !SUPPORTED_LANGUAGES.contains(&default_language) {
            return Err(anyhow!("Unsupported default language: {}", default_language));
        }

        let mut bundles = HashMap::new();
        for (language, source) in CATALOGS {
            let locale: LanguageIdentifier = language.parse()?;
            bundles.insert(language.to_string(), Self::create_bundle(locale, source)?);
        }

        Ok(Self {
            bundles,
            default_language: default_language.to_string(),
        })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Chat clients render the unicode isolation marks literally
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid catalog for {}: {:?}", locale, errors))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate messages for {}: {:?}", locale, errors))?;

        Ok(bundle)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Map a Telegram language code ("en-US", "ru") to a supported language
    pub fn detect_language<'a>(&'a self, language_code: Option<&str>) -> &'a str {
        language_code
            .and_then(|code| code.split(['-', '_']).next())
            .map(|code| code.to_lowercase())
            .and_then(|code| {
                self.bundles
                    .keys()
                    .find(|supported| **supported == code)
                    .map(String::as_str)
            })
            .unwrap_or(self.default_language.as_str())
    }

    /// Get a localized message in the given language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(&self.default_language))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .into_owned()
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager; later calls keep the first manager
pub fn init_localization(default_language: &str) -> Result<()> {
    let manager = LocalizationManager::with_default_language(default_language)?;
    let _ = LOCALIZATION_MANAGER.set(manager);
    Ok(())
}

/// Get the global localization manager, initializing it with defaults if needed
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().expect("embedded message catalogs must parse")
    })
}

/// Map a Telegram language code to a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    get_localization_manager().detect_language(language_code)
}

/// Convenience function to get a localized message
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    let manager = get_localization_manager();
    manager.get_message_in_language(key, manager.detect_language(language_code), None)
}

/// Convenience function to get a localized message with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let manager = get_localization_manager();
    let args: HashMap<&str, &str> = args.iter().cloned().collect();
    manager.get_message_in_language(key, manager.detect_language(language_code), Some(&args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_default_language_is_rejected() {
        assert!(LocalizationManager::with_default_language("de").is_err());
        assert!(LocalizationManager::with_default_language("en").is_ok());
    }

    #[test]
    fn test_detect_language_strips_region() {
        let manager = LocalizationManager::new().unwrap();
        assert_eq!(manager.detect_language(Some("en-US")), "en");
        assert_eq!(manager.detect_language(Some("RU")), "ru");
        assert_eq!(manager.detect_language(Some("de")), "ru");
        assert_eq!(manager.detect_language(None), "ru");
    }
}
