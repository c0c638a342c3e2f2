use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::HierCcRow;
use crate::database::hiercc::HierCcTable;

/// One HierCC level of a result, serialized as `[label, code]` with a null
/// code when the level could not be assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierCcSlot {
    pub label: String,
    pub code: Option<String>,
}

impl Serialize for HierCcSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.label)?;
        tuple.serialize_element(&self.code)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for HierCcSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (label, code) = <(String, Option<String>)>::deserialize(deserializer)?;
        Ok(Self { label, code })
    }
}

/// Infer the HierCC codes of a query from its closest reference.
///
/// A level takes the reference's code only when `distance` is within its
/// threshold; every other level is left unassigned.
#[must_use]
pub fn infer_hiercc(distance: usize, table: &HierCcTable, row: Option<&HierCcRow>) -> Vec<HierCcSlot> {
    table
        .thresholds()
        .iter()
        .enumerate()
        .map(|(slot, &threshold)| {
            let within = usize::try_from(threshold).is_ok_and(|t| distance <= t);
            HierCcSlot {
                label: table.label(threshold),
                code: if within {
                    row.and_then(|r| r.code(slot)).map(str::to_string)
                } else {
                    None
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HierCcTable {
        HierCcTable::new("d", vec![0, 2, 5, 10], Vec::new())
    }

    fn row() -> HierCcRow {
        HierCcRow::new(vec![
            Some("333640".to_string()),
            Some("333572".to_string()),
            None,
            Some("12".to_string()),
        ])
    }

    fn codes(slots: &[HierCcSlot]) -> Vec<Option<&str>> {
        slots.iter().map(|s| s.code.as_deref()).collect()
    }

    #[test]
    fn test_exact_match_reproduces_row() {
        let slots = infer_hiercc(0, &table(), Some(&row()));
        let labels: Vec<&str> = slots.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["d0", "d2", "d5", "d10"]);
        assert_eq!(codes(&slots), vec![Some("333640"), Some("333572"), None, Some("12")]);
    }

    #[test]
    fn test_levels_below_distance_are_null() {
        let slots = infer_hiercc(3, &table(), Some(&row()));
        assert_eq!(codes(&slots), vec![None, None, None, Some("12")]);

        let slots = infer_hiercc(2, &table(), Some(&row()));
        assert_eq!(codes(&slots), vec![None, Some("333572"), None, Some("12")]);

        let slots = infer_hiercc(11, &table(), Some(&row()));
        assert!(slots.iter().all(|s| s.code.is_none()));
    }

    #[test]
    fn test_missing_row() {
        let slots = infer_hiercc(0, &table(), None);
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|s| s.code.is_none()));
    }

    #[test]
    fn test_slot_serializes_as_pair() {
        let slots = infer_hiercc(1, &table(), Some(&row()));
        let json = serde_json::to_string(&slots[..2]).unwrap();
        assert_eq!(json, r#"[["d0",null],["d2","333572"]]"#);

        let parsed: Vec<HierCcSlot> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, slots[..2].to_vec());
    }
}
