//! Parser registry: maps a city's parser selector to its [`CsvParser`].
//!
//! Adding a city is a matter of adding its constructor to
//! [`DEFAULT_PARSERS`].

use std::collections::BTreeMap;

use crate::CsvParser;

/// Errors returned when resolving a parser.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No parser is registered under this selector.
    #[error("No CSV parser registered for city '{city}'")]
    UnsupportedCity {
        /// Selector that was looked up.
        city: String,
    },
}

/// Builds a parser.
pub type ParserConstructor = fn() -> CsvParser;

/// Parsers available out of the box, keyed by city.
const DEFAULT_PARSERS: &[(&str, ParserConstructor)] = &[
    ("Bordeaux", || CsvParser::Bordeaux),
    ("Camden", CsvParser::camden),
    ("Nantes", || CsvParser::Nantes),
    ("Paris", || CsvParser::Paris),
    ("Rennes", || CsvParser::Rennes),
    ("Strasbourg", || CsvParser::Strasbourg),
];

/// City selector to parser constructor.
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: BTreeMap<String, ParserConstructor>,
}

impl ParserRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in city parser.
    #[must_use]
    pub fn with_default_parsers() -> Self {
        let mut registry = Self::new();
        for (city, constructor) in DEFAULT_PARSERS {
            registry.register(*city, *constructor);
        }
        registry
    }

    /// Registers `constructor` under `city`, replacing any previous entry.
    pub fn register(&mut self, city: impl Into<String>, constructor: ParserConstructor) {
        self.parsers.insert(city.into(), constructor);
    }

    /// Returns whether a parser is registered for `city`.
    #[must_use]
    pub fn supports(&self, city: &str) -> bool {
        self.parsers.contains_key(city)
    }

    /// Builds the parser registered for `city`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnsupportedCity`] if nothing is registered
    /// under `city`.
    pub fn get(&self, city: &str) -> Result<CsvParser, RegistryError> {
        self.parsers
            .get(city)
            .map(|constructor| constructor())
            .ok_or_else(|| RegistryError::UnsupportedCity {
                city: city.to_string(),
            })
    }

    /// Registered selectors, in sorted order.
    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }
}
