use crate::lut::{HygroscopicClass, OpticalTable, SpeciesColumn};

use std::collections::BTreeSet;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SpeciesError {
    #[error("no species variables configured")]
    Empty,
    #[error("variable {0} does not start with a two-letter species code")]
    InvalidVariable(String),
    #[error("unknown species {code} (from variable {variable}) in optical table")]
    UnknownSpecies { code: String, variable: String },
    #[error("species {0} is configured twice")]
    DuplicateSpecies(String),
}

/// Species code of a model AOD variable, e.g. `du` for `duaod550`.
pub fn species_code(variable: &str) -> Result<&str, SpeciesError> {
    match variable.get(..2) {
        Some(code) if code.chars().all(|c| c.is_ascii_lowercase()) => Ok(code),
        _ => Err(SpeciesError::InvalidVariable(variable.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesRecord {
    code: String,
    variable: String,
    table: SpeciesColumn,
}

impl SpeciesRecord {
    pub fn new(variable: &str, table: &OpticalTable) -> Result<Self, SpeciesError> {
        let code = species_code(variable)?;
        let column = table
            .species_column(code)
            .ok_or_else(|| SpeciesError::UnknownSpecies {
                code: code.to_string(),
                variable: variable.to_string(),
            })?;

        Ok(Self {
            code: code.to_string(),
            variable: variable.to_string(),
            table: column,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn class(&self) -> HygroscopicClass {
        self.table.class
    }

    pub fn table_column(&self) -> SpeciesColumn {
        self.table
    }
}

impl Display for SpeciesRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {}, column {})",
            self.code,
            self.variable,
            self.table.class,
            self.table.column + 1
        )
    }
}

/// The ordered species of a run and the total AOD variable they divide.
///
/// The order is the summation order of the mixing model.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesSet {
    total_variable: String,
    species: Vec<SpeciesRecord>,
}

impl SpeciesSet {
    /// Resolves every variable against the table, failing on the first
    /// unknown species.
    pub fn resolve(
        variables: &[String],
        total_variable: &str,
        table: &OpticalTable,
    ) -> Result<Self, SpeciesError> {
        if variables.is_empty() {
            return Err(SpeciesError::Empty);
        }

        let mut seen = BTreeSet::new();
        let mut species = Vec::with_capacity(variables.len());
        for variable in variables {
            let record = SpeciesRecord::new(variable, table)?;
            if !seen.insert(record.code.clone()) {
                return Err(SpeciesError::DuplicateSpecies(record.code));
            }
            species.push(record);
        }

        Ok(Self {
            total_variable: total_variable.to_string(),
            species,
        })
    }

    pub fn total_variable(&self) -> &str {
        &self.total_variable
    }

    pub fn species(&self) -> &[SpeciesRecord] {
        &self.species
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpeciesRecord> {
        self.species.iter()
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::optical_table::tests::fixture;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_species_code() {
        assert_eq!(species_code("duaod550"), Ok("du"));
        assert_eq!(species_code("ss"), Ok("ss"));
        assert!(species_code("d").is_err());
        assert!(species_code("DUaod550").is_err());
        assert!(species_code("1uaod550").is_err());
    }

    #[test]
    fn test_resolve_keeps_configured_order() {
        let table = fixture();
        let variables = vars(&["suaod550", "bcaod550", "ssaod550"]);
        let set = SpeciesSet::resolve(&variables, "aod550", &table).unwrap();

        let codes: Vec<&str> = set.iter().map(SpeciesRecord::code).collect();
        assert_eq!(codes, ["su", "bc", "ss"]);
        assert_eq!(set.total_variable(), "aod550");
        assert_eq!(set.species()[1].class(), HygroscopicClass::Hydrophobic);
        assert_eq!(set.species()[0].table_column().column, 1);
    }

    #[test]
    fn test_resolve_fails_closed_on_unknown_species() {
        let table = fixture();
        let variables = vars(&["duaod550", "niaod550"]);
        let err = SpeciesSet::resolve(&variables, "aod550", &table).unwrap_err();
        assert_eq!(
            err,
            SpeciesError::UnknownSpecies {
                code: "ni".into(),
                variable: "niaod550".into()
            }
        );
    }

    #[test]
    fn test_resolve_rejects_empty_and_duplicates() {
        let table = fixture();
        assert_eq!(
            SpeciesSet::resolve(&[], "aod550", &table).unwrap_err(),
            SpeciesError::Empty
        );
        assert_eq!(
            SpeciesSet::resolve(&vars(&["duaod550", "duaod865"]), "aod550", &table).unwrap_err(),
            SpeciesError::DuplicateSpecies("du".into())
        );
    }
}
