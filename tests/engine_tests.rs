//! End-to-end assignment scenarios against synthetic databases.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hiercc_assign::database::{BuildConfig, DatabaseBuilder, ProfileDatabase};
use hiercc_assign::matching::{AssignConfig, SearchStrategy};
use hiercc_assign::parsing::alleles::AlleleChecksum;
use hiercc_assign::parsing::hiercc::HierCcData;
use hiercc_assign::parsing::query::QueryRecord;
use hiercc_assign::{
    AlleleProfile, AssignError, AssignmentEngine, HierCcRow, ReferenceProfile, SequenceType,
};

const LOCI: usize = 20;
const KNOWN_CHECKSUM: &str = "0123456789abcdef0123";
const UNKNOWN_CHECKSUM: &str = "deadbeefdeadbeefdead";

fn loci(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("STMMW_{i:05}")).collect()
}

fn codes(values: &[&str]) -> HierCcRow {
    HierCcRow::new(values.iter().map(|v| Some((*v).to_string())).collect())
}

fn code_string(alleles: &[u32]) -> String {
    alleles
        .iter()
        .map(|a| if *a == 0 { String::new() } else { a.to_string() })
        .collect::<Vec<_>>()
        .join("_")
}

fn base_alleles() -> Vec<u32> {
    vec![1; LOCI]
}

/// Three references: ST 333640 (all ones), ST 100 (ten loci differ) and ST 200 (all threes)
fn scenario_database() -> ProfileDatabase {
    let mut builder = DatabaseBuilder::new(loci(LOCI), BuildConfig::default());

    builder
        .add_reference(ReferenceProfile::new(SequenceType::new(333_640), base_alleles()))
        .unwrap();

    let mut st100 = base_alleles();
    st100[..10].fill(2);
    builder
        .add_reference(ReferenceProfile::new(SequenceType::new(100), st100))
        .unwrap();
    builder
        .add_reference(ReferenceProfile::new(SequenceType::new(200), vec![3; LOCI]))
        .unwrap();

    let mut rows = HashMap::new();
    rows.insert(
        SequenceType::new(333_640),
        codes(&["333640", "333640", "1200", "45", "2"]),
    );
    rows.insert(SequenceType::new(100), codes(&["100", "100", "100", "45", "2"]));
    rows.insert(SequenceType::new(200), codes(&["200", "200", "200", "200", "200"]));
    builder.set_hiercc(HierCcData {
        prefix: "d".to_string(),
        thresholds: vec![0, 2, 5, 10, 20],
        rows,
    });

    builder
        .add_checksum(&AlleleChecksum {
            locus: 7,
            checksum: KNOWN_CHECKSUM.to_string(),
            allele: 1,
        })
        .unwrap();

    builder.build().unwrap()
}

fn hiercc_codes(result: &hiercc_assign::MatchResult) -> Vec<(String, Option<String>)> {
    result
        .hiercc
        .iter()
        .map(|slot| (slot.label.clone(), slot.code.clone()))
        .collect()
}

#[test]
fn test_exact_match_reproduces_hiercc_row() {
    let database = scenario_database();
    let engine = AssignmentEngine::new(&database);

    let profile = AlleleProfile::from_code_string(&code_string(&base_alleles()));
    let result = engine.assign(&profile).unwrap();

    assert_eq!(result.st, SequenceType::new(333_640));
    assert_eq!(result.distance, 0);
    assert_eq!(result.hiercc_distance, 0);
    assert_eq!((result.gaps_a, result.gaps_b, result.gaps_both), (0, 0, 0));

    let expected: Vec<(String, Option<String>)> = [
        ("d0", "333640"),
        ("d2", "333640"),
        ("d5", "1200"),
        ("d10", "45"),
        ("d20", "2"),
    ]
    .iter()
    .map(|(l, c)| ((*l).to_string(), Some((*c).to_string())))
    .collect();
    assert_eq!(hiercc_codes(&result), expected);
}

#[test]
fn test_distance_three_nulls_tight_levels() {
    let database = scenario_database();
    let engine = AssignmentEngine::new(&database);

    let mut alleles = base_alleles();
    alleles[0] = 9;
    alleles[1] = 9;
    alleles[2] = 9;
    let result = engine
        .assign(&AlleleProfile::from_code_string(&code_string(&alleles)))
        .unwrap();

    assert_eq!(result.st, SequenceType::new(333_640));
    assert_eq!(result.distance, 3);
    assert_eq!(result.hiercc_distance, 3);

    let found = hiercc_codes(&result);
    assert_eq!(found[0], ("d0".to_string(), None));
    assert_eq!(found[1], ("d2".to_string(), None));
    assert_eq!(found[2], ("d5".to_string(), Some("1200".to_string())));
    assert_eq!(found[3], ("d10".to_string(), Some("45".to_string())));
    assert_eq!(found[4], ("d20".to_string(), Some("2".to_string())));
}

#[test]
fn test_unresolved_checksum_is_a_gap() {
    let database = scenario_database();
    let engine = AssignmentEngine::new(&database);

    let mut tokens: Vec<String> = base_alleles().iter().map(u32::to_string).collect();
    tokens[5] = UNKNOWN_CHECKSUM.to_string();
    let record = QueryRecord::new(Some("hashed".to_string()), tokens.join("_"));

    let outcome = engine.assign_record(&record);
    let result = outcome.result.as_ref().unwrap();

    assert_eq!(result.st, SequenceType::new(333_640));
    assert_eq!(result.distance, 0);
    assert_eq!(result.gaps_a, 1);
    assert_eq!(result.gaps_b, 0);
    assert_eq!(outcome.unresolved_checksums, 1);
}

#[test]
fn test_known_checksum_resolves_to_allele() {
    let database = scenario_database();
    let engine = AssignmentEngine::new(&database);

    let mut tokens: Vec<String> = base_alleles().iter().map(u32::to_string).collect();
    tokens[7] = KNOWN_CHECKSUM.to_uppercase();
    let outcome = engine.assign_record(&QueryRecord::new(None, tokens.join("_")));
    let result = outcome.result.as_ref().unwrap();

    assert_eq!(result.st, SequenceType::new(333_640));
    assert_eq!(result.distance, 0);
    assert_eq!(result.gaps_a, 0);
    assert_eq!(outcome.unresolved_checksums, 0);
}

#[test]
fn test_empty_database_reports_no_candidates() {
    let database = DatabaseBuilder::new(loci(LOCI), BuildConfig::default())
        .build()
        .unwrap();
    assert!(database.is_empty());
    let engine = AssignmentEngine::new(&database);

    let code = code_string(&base_alleles());
    let err = engine.assign(&AlleleProfile::from_code_string(&code)).unwrap_err();
    assert_eq!(err, AssignError::NoCandidates);

    // The engine keeps serving after a failure
    let outcomes = engine.assign_batch(&[
        QueryRecord::new(Some("a".to_string()), code.clone()),
        QueryRecord::new(Some("b".to_string()), code),
    ]);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| o.error_type.as_deref() == Some("no_candidates")));
}

#[test]
fn test_failed_query_does_not_affect_batch() {
    let database = scenario_database();
    let engine = AssignmentEngine::new(&database);

    let outcomes = engine.assign_batch(&[
        QueryRecord::new(Some("short".to_string()), "1_1_1"),
        QueryRecord::new(Some("exact".to_string()), code_string(&base_alleles())),
    ]);

    assert_eq!(outcomes[0].error_type.as_deref(), Some("schema_mismatch"));
    assert_eq!(outcomes[1].id.as_deref(), Some("exact"));
    assert_eq!(
        outcomes[1].result.as_ref().map(|r| r.st),
        Some(SequenceType::new(333_640))
    );
}

#[test]
fn test_save_load_preserves_assignments() {
    let database = scenario_database();
    let dir = tempfile::tempdir().unwrap();
    database.save(dir.path()).unwrap();
    let loaded = ProfileDatabase::load(dir.path()).unwrap();

    let mut alleles = base_alleles();
    alleles[0] = 9;
    alleles[4] = 0;
    let profile = AlleleProfile::from_code_string(&code_string(&alleles));

    let before = AssignmentEngine::new(&database).assign(&profile).unwrap();
    let after = AssignmentEngine::new(&loaded).assign(&profile).unwrap();
    assert_eq!(before, after);
    assert_eq!(loaded.metadata().hiercc_thresholds, vec![0, 2, 5, 10, 20]);
}

#[test]
fn test_sentinel_recorded_by_builder() {
    let database = scenario_database();
    assert_eq!(
        database.metadata().missing_allele,
        hiercc_assign::matching::encoding::MISSING_ALLELE
    );
    assert_eq!(
        database.index().missing_allele(),
        hiercc_assign::matching::encoding::MISSING_ALLELE
    );
}

#[test]
fn test_mismatched_sentinel_fails_to_load() {
    let database = scenario_database();
    let dir = tempfile::tempdir().unwrap();
    database.save(dir.path()).unwrap();

    let path = dir.path().join("metadata.json");
    let mut metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    metadata["missing_allele"] = serde_json::json!(u32::MAX);
    std::fs::write(&path, serde_json::to_string(&metadata).unwrap()).unwrap();

    assert!(ProfileDatabase::load(dir.path()).is_err());
}

/// Clustered references: each founder spawns close relatives
fn clustered_database(rng: &mut StdRng, loci_count: usize) -> ProfileDatabase {
    let mut builder = DatabaseBuilder::new(loci(loci_count), BuildConfig::default());
    let mut st = 1u64;

    for _ in 0..20 {
        let founder: Vec<u32> = (0..loci_count).map(|_| rng.random_range(1..=50)).collect();
        for _ in 0..20 {
            let mut alleles = founder.clone();
            for _ in 0..rng.random_range(0..4) {
                let locus = rng.random_range(0..loci_count);
                alleles[locus] = rng.random_range(1..=60);
            }
            if rng.random_bool(0.2) {
                let locus = rng.random_range(0..loci_count);
                alleles[locus] = 0;
            }
            builder
                .add_reference(ReferenceProfile::new(SequenceType::new(st), alleles))
                .unwrap();
            st += 1;
        }
    }

    builder.build().unwrap()
}

#[test]
fn test_indexed_agrees_with_exhaustive() {
    let mut rng = StdRng::seed_from_u64(42);
    let loci_count = 60;
    let database = clustered_database(&mut rng, loci_count);

    let indexed = AssignmentEngine::new(&database);
    let exhaustive = AssignmentEngine::with_config(
        &database,
        AssignConfig {
            strategy: SearchStrategy::Exhaustive,
            ..AssignConfig::default()
        },
    );

    for _ in 0..50 {
        let position = rng.random_range(0..database.len());
        let mut alleles = database.references()[position].alleles.clone();
        for _ in 0..rng.random_range(0..5) {
            let locus = rng.random_range(0..loci_count);
            alleles[locus] = rng.random_range(1..=70);
        }
        if rng.random_bool(0.3) {
            let locus = rng.random_range(0..loci_count);
            alleles[locus] = 0;
        }

        let profile = AlleleProfile::from_code_string(&code_string(&alleles));
        let expected = exhaustive.assign(&profile).unwrap();
        let found = indexed.assign(&profile).unwrap();
        assert_eq!(found, expected, "query derived from reference {position}");
    }
}

/// Founders spread into clusters of near-identical relatives, some loci uncalled
fn population_database(rng: &mut StdRng, clusters: usize, members: usize, loci_count: usize) -> ProfileDatabase {
    let mut builder = DatabaseBuilder::new(loci(loci_count), BuildConfig::default());
    let mut st = 1u64;

    for _ in 0..clusters {
        let founder: Vec<u32> = (0..loci_count).map(|_| rng.random_range(1..=200)).collect();
        for _ in 0..members {
            let mut alleles = founder.clone();
            for _ in 0..rng.random_range(0..loci_count / 20 + 2) {
                let locus = rng.random_range(0..loci_count);
                alleles[locus] = rng.random_range(1..=250);
            }
            if rng.random_bool(0.3) {
                let locus = rng.random_range(0..loci_count);
                alleles[locus] = 0;
            }
            builder
                .add_reference(ReferenceProfile::new(SequenceType::new(st), alleles))
                .unwrap();
            st += 1;
        }
    }

    builder.build().unwrap()
}

/// Share of gappy queries on which the indexed search returns the exhaustive
/// answer: (same distance, identical result)
fn agreement(
    rng: &mut StdRng,
    database: &ProfileDatabase,
    shortlist_size: usize,
    queries: usize,
    missing: std::ops::Range<usize>,
) -> (f64, f64) {
    let loci_count = database.locus_count();
    let indexed = AssignmentEngine::with_config(
        database,
        AssignConfig {
            shortlist_size,
            ..AssignConfig::default()
        },
    );
    let exhaustive = AssignmentEngine::with_config(
        database,
        AssignConfig {
            strategy: SearchStrategy::Exhaustive,
            ..AssignConfig::default()
        },
    );

    let mut same_distance = 0usize;
    let mut identical = 0usize;
    for _ in 0..queries {
        let position = rng.random_range(0..database.len());
        let mut alleles = database.references()[position].alleles.clone();
        for _ in 0..rng.random_range(0..loci_count / 15 + 1) {
            let locus = rng.random_range(0..loci_count);
            alleles[locus] = rng.random_range(1..=300);
        }
        for _ in 0..rng.random_range(missing.clone()) {
            let locus = rng.random_range(0..loci_count);
            alleles[locus] = 0;
        }

        let profile = AlleleProfile::from_code_string(&code_string(&alleles));
        let expected = exhaustive.assign(&profile).unwrap();
        if let Ok(found) = indexed.assign(&profile) {
            if found.distance == expected.distance {
                same_distance += 1;
            }
            if found == expected {
                identical += 1;
            }
        }
    }

    (
        same_distance as f64 / queries as f64,
        identical as f64 / queries as f64,
    )
}

#[test]
fn test_small_shortlist_agrees_with_exhaustive() {
    // 1,500 references, shortlist of 5
    let mut rng = StdRng::seed_from_u64(7);
    let database = population_database(&mut rng, 30, 50, 80);
    assert_eq!(database.metadata().max_reference_gaps, Some(9));

    let (same_distance, identical) = agreement(&mut rng, &database, 5, 200, 2..7);
    assert!(same_distance >= 0.99, "same distance on {same_distance}");
    assert!(identical >= 0.95, "identical result on {identical}");
}

#[test]
#[ignore = "builds a 20,000 reference database; run with --release -- --ignored"]
fn test_small_shortlist_agrees_with_exhaustive_at_scale() {
    // 20,000 references over 300 loci, shortlist of 50
    let mut rng = StdRng::seed_from_u64(8);
    let database = population_database(&mut rng, 400, 50, 300);

    let (same_distance, identical) = agreement(&mut rng, &database, 50, 500, 5..25);
    assert!(same_distance >= 0.99, "same distance on {same_distance}");
    assert!(identical >= 0.97, "identical result on {identical}");
}
