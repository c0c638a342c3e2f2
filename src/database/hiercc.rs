use serde::{Deserialize, Serialize};

use crate::core::HierCcRow;

/// Default prefix of HierCC level labels
pub const DEFAULT_HIERCC_PREFIX: &str = "d";

/// HierCC cluster codes for every reference, aligned with the profile order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierCcTable {
    prefix: String,
    thresholds: Vec<u32>,
    rows: Vec<HierCcRow>,
}

impl HierCcTable {
    #[must_use]
    pub fn new(prefix: impl Into<String>, thresholds: Vec<u32>, rows: Vec<HierCcRow>) -> Self {
        Self {
            prefix: prefix.into(),
            thresholds,
            rows,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Allele-distance thresholds, ascending
    #[must_use]
    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    /// Label of a level, e.g. `d50`
    #[must_use]
    pub fn label(&self, threshold: u32) -> String {
        format!("{}{threshold}", self.prefix)
    }

    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.thresholds.iter().map(|&t| self.label(t)).collect()
    }

    #[must_use]
    pub fn row(&self, position: usize) -> Option<&HierCcRow> {
        self.rows.get(position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check the table is internally consistent, returning a description of
    /// the first problem found.
    pub(crate) fn check_consistency(&self) -> Result<(), String> {
        if let Some(pair) = self.thresholds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(format!(
                "HierCC thresholds are not strictly ascending ({} then {})",
                pair[0], pair[1]
            ));
        }

        if let Some((position, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.thresholds.len())
        {
            return Err(format!(
                "HierCC row {position} has {} codes but there are {} thresholds",
                row.len(),
                self.thresholds.len()
            ));
        }

        Ok(())
    }
}
